use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    InProgress,
    Approved,
    Rejected,
    Other(String),
}

impl ReviewStatus {
    /// Maps the pipeline's raw action-execution status.
    pub fn from_pipeline(raw: &str) -> Self {
        match raw {
            "InProgress" => Self::InProgress,
            "Succeeded" => Self::Approved,
            "Failed" => Self::Rejected,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "InProgress",
            Self::Approved => "Succeeded",
            Self::Rejected => "Failed",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-use credential for one pending approval instance.
///
/// Not `Clone`: submitting an approval takes the token by value, so the gate
/// can spend a given token at most once.
#[derive(Debug)]
pub struct ApprovalToken(SecretString);

impl ApprovalToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Latest execution of the first action in the review stage.
#[derive(Debug)]
pub struct PipelineReviewState {
    pub stage_name: String,
    pub action_name: String,
    pub status: ReviewStatus,
    pub token: Option<ApprovalToken>,
}
