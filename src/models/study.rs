use serde::{Deserialize, Serialize};

/// Per-study policies needed when validating submitted answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySettings {
    pub name: String,
    pub sample_prefix: Option<String>,
    pub sample_suffix_length: Option<usize>,
    pub has_rna_samples: bool,
}

impl StudySettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sample_prefix: None,
            sample_suffix_length: None,
            has_rna_samples: false,
        }
    }
}
