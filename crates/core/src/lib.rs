pub mod approval;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fakes;
pub mod gate;
pub mod notify;
pub mod policy;

pub use approval::{
    ApprovalController, ApprovalOutcome, ApprovalSubmission, NotApprovableReason,
    PipelineController,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, GateConfig, LoadOptions};
pub use domain::decision::{ApprovalDecision, DecisionRecord, ThresholdBreach, ThresholdDecision};
pub use domain::event::{CostChangeEvent, CostFigures, InboundBatch, InboundRecord};
pub use domain::review::{ApprovalToken, PipelineReviewState, ReviewStatus};
pub use domain::thresholds::Thresholds;
pub use errors::{ApprovalError, DispatchError, EventError, GateError};
pub use gate::ApprovalGate;
pub use notify::{DispatchReceipt, NotificationDispatcher, Notifier, PublishAck};
pub use policy::{DeterministicThresholdPolicy, ThresholdPolicy};
