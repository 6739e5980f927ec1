use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Questionnaire;

/// Lifecycle state of a questionnaire instance.
///
/// Probands move `inactive → active → in_progress → released_once →
/// released_twice`; the research team uses `active → in_progress → released`
/// with repeatable releases. Legality of a transition is decided by
/// [`crate::engine::versioning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Inactive,
    Active,
    InProgress,
    ReleasedOnce,
    ReleasedTwice,
    Released,
    Expired,
    Deleted,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::InProgress => "in_progress",
            Self::ReleasedOnce => "released_once",
            Self::ReleasedTwice => "released_twice",
            Self::Released => "released",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(Self::Inactive),
            "active" => Some(Self::Active),
            "in_progress" => Some(Self::InProgress),
            "released_once" => Some(Self::ReleasedOnce),
            "released_twice" => Some(Self::ReleasedTwice),
            "released" => Some(Self::Released),
            "expired" => Some(Self::Expired),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// True for every state that locked in answers at some point.
    pub fn is_released(self) -> bool {
        matches!(self, Self::Released | Self::ReleasedOnce | Self::ReleasedTwice)
    }
}

/// One instantiation of a questionnaire version for one participant.
///
/// The embedded `questionnaire` is a per-load working copy of the template
/// tree; the filter prunes it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionnaireInstance {
    pub id: i64,
    pub study_id: String,
    pub pseudonym: String,
    pub status: InstanceStatus,
    /// Recurrence counter, 1 = first occurrence.
    pub cycle: i32,
    /// Number of completed releases, starts at 0.
    pub release_version: i32,
    pub progress: i32,
    pub date_of_issue: DateTime<Utc>,
    pub date_of_release_v1: Option<DateTime<Utc>>,
    pub date_of_release_v2: Option<DateTime<Utc>>,
    pub questionnaire: Questionnaire,
}

impl QuestionnaireInstance {
    /// The point in time against which external condition targets must have
    /// been released: the latest own release date, or the (end-of-day) date
    /// of issue for unreleased instances. Spontaneous questionnaires get
    /// their date of issue stamped on first release, so before that only
    /// "now" is meaningful.
    pub fn evaluation_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.status {
            InstanceStatus::Released | InstanceStatus::ReleasedTwice => {
                if let Some(date) = self.date_of_release_v2 {
                    return date;
                }
                self.date_of_release_v1
                    .unwrap_or_else(|| end_of_day(self.date_of_issue))
            }
            InstanceStatus::ReleasedOnce => self
                .date_of_release_v1
                .unwrap_or_else(|| end_of_day(self.date_of_issue)),
            _ => {
                if self.questionnaire.cycle_unit == super::CycleUnit::Spontan {
                    now
                } else {
                    // end of day: an instance issued in the morning must still
                    // see answers of a target released later the same day
                    end_of_day(self.date_of_issue)
                }
            }
        }
    }
}

fn end_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    date.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|naive| naive.and_utc())
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            InstanceStatus::Inactive,
            InstanceStatus::Active,
            InstanceStatus::InProgress,
            InstanceStatus::ReleasedOnce,
            InstanceStatus::ReleasedTwice,
            InstanceStatus::Released,
            InstanceStatus::Expired,
            InstanceStatus::Deleted,
        ] {
            assert_eq!(InstanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InstanceStatus::parse("unknown"), None);
    }

    #[test]
    fn end_of_day_extends_to_last_millisecond() {
        let issued = "2024-05-03T08:15:00Z".parse::<DateTime<Utc>>().unwrap();
        let eod = end_of_day(issued);
        assert_eq!(eod.to_rfc3339(), "2024-05-03T23:59:59.999+00:00");
    }
}
