use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::approval::{approval_summary, ApprovalController, ApprovalOutcome, PipelineController};
use crate::config::AppConfig;
use crate::domain::decision::{ApprovalDecision, DecisionRecord, ThresholdDecision};
use crate::domain::event::{CostChangeEvent, CostFigures, InboundBatch, InboundRecord};
use crate::errors::{EventError, GateError};
use crate::notify::{approval_subject, NotificationDispatcher, Notifier};
use crate::policy::{DeterministicThresholdPolicy, ThresholdPolicy};

/// Turns one cost-change event into exactly one action: a review request or
/// an auto-approval attempt.
pub struct ApprovalGate {
    config: Arc<AppConfig>,
    policy: Box<dyn ThresholdPolicy>,
    dispatcher: NotificationDispatcher,
    controller: ApprovalController,
}

impl ApprovalGate {
    pub fn new(
        config: Arc<AppConfig>,
        notifier: Arc<dyn Notifier>,
        pipeline: Arc<dyn PipelineController>,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(notifier, config.gate.clone());
        let controller = ApprovalController::new(pipeline, config.gate.clone());
        Self { config, policy: Box::new(DeterministicThresholdPolicy), dispatcher, controller }
    }

    pub fn with_policy(mut self, policy: impl ThresholdPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Decision and intended action for `event`, without calling any
    /// collaborator.
    pub fn plan(&self, event: &CostChangeEvent) -> (ThresholdDecision, ApprovalDecision) {
        let decision = self.policy.evaluate(&event.figures, &self.config.thresholds);
        (decision, planned_action(&self.config, decision, &event.figures))
    }

    pub async fn handle_record(
        &self,
        record: &InboundRecord,
        correlation_id: &str,
    ) -> Result<DecisionRecord, GateError> {
        debug!(event_name = "gate.event.received", correlation_id, record = ?record);

        let event = CostChangeEvent::from_record(record).inspect_err(|error| {
            warn!(
                event_name = "gate.event.malformed",
                correlation_id,
                message_id = %record.message_id,
                error = %error,
                "rejecting malformed cost-change event"
            );
        })?;

        let (decision, planned) = self.plan(&event);
        info!(
            event_name = "gate.decision.evaluated",
            correlation_id,
            message_id = %event.message_id,
            total = %event.figures.total,
            past = %event.figures.past,
            diff = %event.figures.diff,
            decision = ?decision,
            "cost change evaluated"
        );

        let action = if let ApprovalDecision::NotifyForApproval { subject } = planned {
            self.dispatcher.notify(&subject, &event.detail_text).await?;
            ApprovalDecision::NotifyForApproval { subject }
        } else {
            match self.controller.auto_approve(&event.figures, &self.config.thresholds).await? {
                ApprovalOutcome::Approved { summary } => ApprovalDecision::AutoApprove { summary },
                ApprovalOutcome::NotApprovable { reason } => {
                    ApprovalDecision::Skip { reason: reason.to_string() }
                }
            }
        };

        Ok(DecisionRecord {
            correlation_id: correlation_id.to_string(),
            message_id: event.message_id,
            decision,
            action,
            evaluated_at: Utc::now(),
        })
    }

    /// Handles records in delivery order and stops at the first failure so the
    /// event source redelivers the batch.
    pub async fn handle_batch(
        &self,
        batch: &InboundBatch,
        correlation_id: &str,
    ) -> Result<Vec<DecisionRecord>, GateError> {
        if batch.records.is_empty() {
            return Err(EventError::EmptyBatch.into());
        }

        let mut records = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            records.push(self.handle_record(record, correlation_id).await?);
        }
        Ok(records)
    }
}

/// Subject or summary the gate would use for `decision`.
pub fn planned_action(
    config: &AppConfig,
    decision: ThresholdDecision,
    figures: &CostFigures,
) -> ApprovalDecision {
    let thresholds = &config.thresholds;
    match decision {
        ThresholdDecision::Notify(breach) => ApprovalDecision::NotifyForApproval {
            subject: approval_subject(&config.gate.pipeline_name, breach, thresholds),
        },
        ThresholdDecision::AutoApprove => {
            ApprovalDecision::AutoApprove { summary: approval_summary(figures, thresholds) }
        }
    }
}
