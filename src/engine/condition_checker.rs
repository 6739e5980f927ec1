//! Pure condition evaluation over stored answer values.
//!
//! Both the stored answer and the condition literal are flat strings holding
//! one or more `;`-separated tokens. Tokens are parsed according to the
//! target answer option's type and compared as a cross product: a condition
//! token is "matched" when some answer token satisfies the comparator.
//!
//! The link combines per-token match results. Empty condition tokens are
//! placeholders left behind by study authoring: `AND` treats them as
//! vacuously true while `OR`/`XOR` never count them. This asymmetry is load
//! bearing for deployed questionnaires and must not be normalized.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::{AnswerType, Condition, ConditionLink, ConditionOperand};

/// One parsed comparison token.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Number(f64),
    /// `None` marks an unparseable date; it never satisfies any comparison.
    Date(Option<DateTime<Utc>>),
}

impl Token {
    /// An empty placeholder token. Numeric parse failures become NaN and date
    /// parse failures become `Date(None)`; both already fail every
    /// comparison, so only text needs an explicit emptiness notion.
    fn is_empty(&self) -> bool {
        matches!(self, Token::Text(s) if s.is_empty())
    }
}

/// Returns true if the answer's value meets the condition, false otherwise.
/// An absent answer never meets any condition.
pub fn is_condition_met(
    answer_value: Option<&str>,
    condition: &Condition,
    answer_type: AnswerType,
) -> bool {
    let Some(answer_value) = answer_value else {
        return false;
    };
    let Some(operand) = condition.operand else {
        return false;
    };

    let answer_tokens = parse_values(answer_value, answer_type);
    let condition_tokens = parse_values(&condition.value, answer_type);
    let link = condition.link.unwrap_or(ConditionLink::Or);

    let matched = |condition_token: &Token| {
        answer_tokens
            .iter()
            .any(|answer_token| token_matches(operand, answer_token, condition_token))
    };

    match link {
        ConditionLink::And => condition_tokens
            .iter()
            .all(|token| token.is_empty() || matched(token)),
        ConditionLink::Or => condition_tokens
            .iter()
            .any(|token| !token.is_empty() && matched(token)),
        ConditionLink::Xor => {
            condition_tokens
                .iter()
                .filter(|token| !token.is_empty() && matched(token))
                .count()
                == 1
        }
    }
}

fn parse_values(raw: &str, answer_type: AnswerType) -> Vec<Token> {
    raw.split(';')
        .map(|token| match answer_type {
            AnswerType::Number => Token::Number(token.parse::<f64>().unwrap_or(f64::NAN)),
            AnswerType::Date => Token::Date(parse_date(token)),
            _ => Token::Text(token.to_string()),
        })
        .collect()
}

/// Accepts full RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS` without an offset,
/// and plain dates (midnight UTC).
fn parse_date(token: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(token) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc())
}

/// Cross-product comparison of one answer token against one condition token.
/// Empty or unparseable answer tokens never match; `!=` is the per-pair
/// negation of `==`, not of the whole link result.
fn token_matches(operand: ConditionOperand, answer: &Token, condition: &Token) -> bool {
    use ConditionOperand::*;

    match (answer, condition) {
        (Token::Text(a), Token::Text(c)) => {
            if a.is_empty() {
                return false;
            }
            match operand {
                Less => a < c,
                Greater => a > c,
                LessOrEqual => a <= c,
                GreaterOrEqual => a >= c,
                Equal => a == c,
                NotEqual => a != c,
            }
        }
        (Token::Number(a), Token::Number(c)) => match operand {
            // NaN fails every comparison, including NotEqual
            Less => a < c,
            Greater => a > c,
            LessOrEqual => a <= c,
            GreaterOrEqual => a >= c,
            Equal => a == c,
            NotEqual => !a.is_nan() && !c.is_nan() && a != c,
        },
        (Token::Date(Some(a)), Token::Date(Some(c))) => match operand {
            Less => a < c,
            Greater => a > c,
            LessOrEqual => a <= c,
            GreaterOrEqual => a >= c,
            // date equality means the same instant
            Equal => a == c,
            NotEqual => a != c,
        },
        (Token::Date(None), _) | (_, Token::Date(None)) => false,
        // mixed token kinds cannot happen: both sides are parsed with the
        // same answer type
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConditionType;

    fn condition(
        value: &str,
        operand: ConditionOperand,
        link: ConditionLink,
    ) -> Condition {
        Condition {
            condition_type: ConditionType::External,
            operand: Some(operand),
            link: Some(link),
            value: value.to_string(),
            target_answer_option: Some(1),
        }
    }

    #[test]
    fn absent_answer_never_matches() {
        let c = condition("ans1", ConditionOperand::Equal, ConditionLink::Or);
        assert!(!is_condition_met(None, &c, AnswerType::Text));
    }

    #[test]
    fn missing_operand_never_matches() {
        let mut c = condition("ans1", ConditionOperand::Equal, ConditionLink::Or);
        c.operand = None;
        assert!(!is_condition_met(Some("ans1"), &c, AnswerType::Text));
    }

    #[test]
    fn numeric_comparison_is_numeric_not_lexical() {
        let c = condition("1.5", ConditionOperand::Equal, ConditionLink::Or);
        assert!(is_condition_met(Some("2;3;1.5"), &c, AnswerType::Number));

        let c = condition("1", ConditionOperand::Equal, ConditionLink::Or);
        assert!(!is_condition_met(Some("2;3;1.5"), &c, AnswerType::Number));

        // "10" < "9" lexically but not numerically
        let c = condition("9", ConditionOperand::Less, ConditionLink::Or);
        assert!(is_condition_met(Some("10"), &c, AnswerType::Text));
        assert!(!is_condition_met(Some("10"), &c, AnswerType::Number));
    }

    #[test]
    fn xor_requires_exactly_one_match() {
        let c = condition("ans1;ans2;ans3", ConditionOperand::Equal, ConditionLink::Xor);
        assert!(is_condition_met(Some("ans0;ans2;ans5"), &c, AnswerType::Text));
        assert!(!is_condition_met(Some("ans1;ans2;ans4"), &c, AnswerType::Text));
        assert!(!is_condition_met(Some("ans4;ans5;ans6"), &c, AnswerType::Text));
    }

    #[test]
    fn empty_condition_tokens_are_vacuous_for_and_only() {
        let c = condition("", ConditionOperand::Equal, ConditionLink::And);
        assert!(is_condition_met(Some("ans1"), &c, AnswerType::Text));

        let c = condition("", ConditionOperand::Equal, ConditionLink::Or);
        assert!(!is_condition_met(Some("ans1"), &c, AnswerType::Text));

        let c = condition("", ConditionOperand::Equal, ConditionLink::Xor);
        assert!(!is_condition_met(Some("ans1"), &c, AnswerType::Text));
    }

    #[test]
    fn empty_answer_tokens_never_satisfy() {
        let c = condition("ans1", ConditionOperand::NotEqual, ConditionLink::Or);
        assert!(!is_condition_met(Some(""), &c, AnswerType::Text));
    }

    #[test]
    fn date_equality_is_same_instant() {
        let c = condition("2024-03-01", ConditionOperand::Equal, ConditionLink::Or);
        assert!(is_condition_met(Some("2024-03-01"), &c, AnswerType::Date));
        assert!(!is_condition_met(Some("2024-03-02"), &c, AnswerType::Date));

        let c = condition(
            "2024-03-01T00:00:00Z",
            ConditionOperand::Equal,
            ConditionLink::Or,
        );
        assert!(is_condition_met(Some("2024-03-01"), &c, AnswerType::Date));
    }

    #[test]
    fn date_ordering() {
        let c = condition("2024-03-15", ConditionOperand::Less, ConditionLink::Or);
        assert!(is_condition_met(Some("2024-03-01"), &c, AnswerType::Date));
        assert!(!is_condition_met(Some("2024-03-16"), &c, AnswerType::Date));
    }

    #[test]
    fn unparseable_dates_fail_closed() {
        let c = condition("2024-03-15", ConditionOperand::NotEqual, ConditionLink::Or);
        assert!(!is_condition_met(Some("not a date"), &c, AnswerType::Date));
    }

    #[test]
    fn and_link_needs_every_condition_token_matched() {
        let c = condition("ans1;ans2", ConditionOperand::Equal, ConditionLink::And);
        assert!(is_condition_met(Some("ans2;ans1;ans9"), &c, AnswerType::Text));
        assert!(!is_condition_met(Some("ans1;ans9"), &c, AnswerType::Text));
    }

    #[test]
    fn not_equal_is_negated_per_pair_not_per_link() {
        // "ans1" equals the first condition token, so AND fails on that pair
        let c = condition("ans1;ans2", ConditionOperand::NotEqual, ConditionLink::And);
        assert!(!is_condition_met(Some("ans1"), &c, AnswerType::Text));
        assert!(is_condition_met(Some("ans3"), &c, AnswerType::Text));

        // under OR a single differing pair suffices
        let c = condition("ans1;ans2", ConditionOperand::NotEqual, ConditionLink::Or);
        assert!(is_condition_met(Some("ans1"), &c, AnswerType::Text));
    }

    #[test]
    fn link_defaults_to_or() {
        let mut c = condition("ans1;ans9", ConditionOperand::Equal, ConditionLink::Or);
        c.link = None;
        assert!(is_condition_met(Some("ans1"), &c, AnswerType::Text));
    }
}
