//! Eligibility of questions and answer options whose conditions point at
//! other answer options of the same instance (`INTERNAL_THIS`).
//!
//! This is a reachability problem on a graph with possibly missing targets
//! and no acyclicity guarantee. Eligibility is computed with a memoized
//! recursive walk over id maps; a node re-entered while still in progress is
//! part of a cycle and resolves to ineligible. Missing targets are ineligible
//! too: visibility fails closed, it never loops or panics.

use std::collections::HashMap;

use crate::models::{Condition, ConditionType, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eligibility {
    Yes,
    No,
    Pending,
}

pub struct QuestionCleaner {
    question_conditions: HashMap<i64, Option<Condition>>,
    option_conditions: HashMap<i64, Option<Condition>>,
    /// answer option id → owning question id
    option_owner: HashMap<i64, i64>,
    question_status: HashMap<i64, Eligibility>,
    option_status: HashMap<i64, Eligibility>,
}

impl QuestionCleaner {
    pub fn new(questions: &[Question]) -> Self {
        let mut question_conditions = HashMap::new();
        let mut option_conditions = HashMap::new();
        let mut option_owner = HashMap::new();

        for question in questions {
            question_conditions.insert(question.id, question.condition.clone());
            for option in &question.answer_options {
                option_conditions.insert(option.id, option.condition.clone());
                option_owner.insert(option.id, question.id);
            }
        }

        Self {
            question_conditions,
            option_conditions,
            option_owner,
            question_status: HashMap::new(),
            option_status: HashMap::new(),
        }
    }

    /// Prunes `questions` down to the eligible ones, removing ineligible
    /// answer options along the way. Questions that had no answer options to
    /// begin with are kept as informational questions.
    pub fn retain_eligible(mut self, questions: Vec<Question>) -> Vec<Question> {
        questions
            .into_iter()
            .filter_map(|mut question| {
                if self.question_eligible(question.id) != Eligibility::Yes {
                    return None;
                }
                if question.answer_options.is_empty() {
                    return Some(question);
                }
                question
                    .answer_options
                    .retain(|option| self.option_eligible(option.id) == Eligibility::Yes);
                (!question.answer_options.is_empty()).then_some(question)
            })
            .collect()
    }

    fn question_eligible(&mut self, question_id: i64) -> Eligibility {
        if let Some(&status) = self.question_status.get(&question_id) {
            return status;
        }

        let target = match self.internal_target(self.question_conditions.get(&question_id)) {
            InternalTarget::Unconditional => {
                self.question_status.insert(question_id, Eligibility::Yes);
                return Eligibility::Yes;
            }
            InternalTarget::Missing => {
                self.question_status.insert(question_id, Eligibility::No);
                return Eligibility::No;
            }
            InternalTarget::Option(id) => id,
        };

        self.question_status.insert(question_id, Eligibility::Pending);
        let status = self.target_eligible(target, question_id, "question");
        self.question_status.insert(question_id, status);
        status
    }

    fn option_eligible(&mut self, option_id: i64) -> Eligibility {
        if let Some(&status) = self.option_status.get(&option_id) {
            return status;
        }

        let target = match self.internal_target(self.option_conditions.get(&option_id)) {
            InternalTarget::Unconditional => {
                self.option_status.insert(option_id, Eligibility::Yes);
                return Eligibility::Yes;
            }
            InternalTarget::Missing => {
                self.option_status.insert(option_id, Eligibility::No);
                return Eligibility::No;
            }
            InternalTarget::Option(id) => id,
        };

        self.option_status.insert(option_id, Eligibility::Pending);
        let status = self.target_eligible(target, option_id, "answer option");
        self.option_status.insert(option_id, status);
        status
    }

    /// An element is eligible iff its target answer option and that target's
    /// owning question are both eligible. `Pending` on either means the walk
    /// re-entered an unresolved node: a cycle, which can never be displayed.
    fn target_eligible(&mut self, target_option: i64, from_id: i64, kind: &str) -> Eligibility {
        let Some(&owner) = self.option_owner.get(&target_option) else {
            return Eligibility::No;
        };

        match self.question_eligible(owner) {
            Eligibility::Pending => {
                log::warn!(
                    "circular condition reference in questionnaire, {kind} {from_id} can never be displayed"
                );
                return Eligibility::No;
            }
            Eligibility::No => return Eligibility::No,
            Eligibility::Yes => {}
        }

        match self.option_eligible(target_option) {
            Eligibility::Pending => {
                log::warn!(
                    "circular condition reference in questionnaire, {kind} {from_id} can never be displayed"
                );
                Eligibility::No
            }
            status => status,
        }
    }

    fn internal_target(&self, condition: Option<&Option<Condition>>) -> InternalTarget {
        match condition {
            Some(Some(c)) if c.condition_type == ConditionType::InternalThis => {
                match c.target_answer_option {
                    Some(id) if self.option_owner.contains_key(&id) => InternalTarget::Option(id),
                    _ => InternalTarget::Missing,
                }
            }
            // no condition, or one already handled by the answer-based filter
            _ => InternalTarget::Unconditional,
        }
    }
}

enum InternalTarget {
    Unconditional,
    Missing,
    Option(i64),
}
