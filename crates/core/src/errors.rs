use thiserror::Error;

/// An inbound record the gate cannot evaluate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("event batch contains no records")]
    EmptyBatch,
    #[error("message attribute `{name}` is missing or has no string value")]
    MissingAttribute { name: &'static str },
    #[error("message attribute `{name}` is not a finite number: `{value}`")]
    InvalidAmount { name: &'static str, value: String },
    #[error("event payload could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("notification publish to `{topic}` failed: {message}")]
    Publish { topic: String, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("could not read review state of pipeline `{pipeline}`: {message}")]
    StateQuery { pipeline: String, message: String },
    #[error("approval token for pipeline `{pipeline}` was rejected: {message}")]
    StaleToken { pipeline: String, message: String },
    #[error("approval submission for pipeline `{pipeline}` failed: {message}")]
    Submit { pipeline: String, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] EventError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

impl GateError {
    /// Stable label for structured logs and CLI payloads.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::MalformedEvent(_) => "malformed_event",
            Self::Dispatch(_) => "dispatch",
            Self::Approval(ApprovalError::StaleToken { .. }) => "stale_token",
            Self::Approval(_) => "approval",
        }
    }
}
