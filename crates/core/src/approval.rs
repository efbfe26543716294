//! Auto-approval of the pipeline's pending review action.
//!
//! The controller reads the review stage once and submits at most one
//! approval. Status can change between the read and the submit; the pipeline
//! rejects a stale token in that case and the error is surfaced unchanged.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GateConfig;
use crate::domain::event::CostFigures;
use crate::domain::review::{ApprovalToken, PipelineReviewState, ReviewStatus};
use crate::domain::thresholds::Thresholds;
use crate::errors::ApprovalError;

#[derive(Debug)]
pub struct ApprovalSubmission {
    pub pipeline_name: String,
    pub stage_name: String,
    pub action_name: String,
    pub token: ApprovalToken,
    pub summary: String,
}

#[async_trait]
pub trait PipelineController: Send + Sync {
    /// Latest execution of the first action in `stage_name`, or `None` when the
    /// pipeline has no such stage.
    async fn review_state(
        &self,
        pipeline_name: &str,
        stage_name: &str,
    ) -> Result<Option<PipelineReviewState>, ApprovalError>;

    async fn submit_approval(&self, submission: ApprovalSubmission) -> Result<(), ApprovalError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotApprovableReason {
    StageMissing { stage: String },
    NotInProgress { action: String, status: ReviewStatus },
    TokenMissing { action: String },
}

impl fmt::Display for NotApprovableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageMissing { stage } => write!(f, "review stage `{stage}` was not found"),
            Self::NotInProgress { action, status } => {
                write!(f, "{action} step is in {status} status")
            }
            Self::TokenMissing { action } => write!(f, "{action} step has no approval token"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    Approved { summary: String },
    NotApprovable { reason: NotApprovableReason },
}

pub fn approval_summary(figures: &CostFigures, thresholds: &Thresholds) -> String {
    format!(
        "Current deployment costs changes: before {}$, after {}$, diff {}$. \
         This is less than thresholds - {}$ or {}%. The pipeline is auto-approved",
        figures.past, figures.total, figures.diff, thresholds.absolute, thresholds.percent
    )
}

pub struct ApprovalController {
    pipeline: Arc<dyn PipelineController>,
    gate: GateConfig,
}

impl ApprovalController {
    pub fn new(pipeline: Arc<dyn PipelineController>, gate: GateConfig) -> Self {
        Self { pipeline, gate }
    }

    pub async fn auto_approve(
        &self,
        figures: &CostFigures,
        thresholds: &Thresholds,
    ) -> Result<ApprovalOutcome, ApprovalError> {
        info!(
            event_name = "gate.approval.checking",
            pipeline = %self.gate.pipeline_name,
            stage = %self.gate.review_stage,
            "auto-approving the changes"
        );

        let state =
            self.pipeline.review_state(&self.gate.pipeline_name, &self.gate.review_stage).await?;

        let token = match approvable_token(state, &self.gate) {
            Ok(token) => token,
            Err(reason) => {
                info!(
                    event_name = "gate.approval.not_approvable",
                    pipeline = %self.gate.pipeline_name,
                    reason = %reason,
                    "cannot auto-approve"
                );
                return Ok(ApprovalOutcome::NotApprovable { reason });
            }
        };

        let summary = approval_summary(figures, thresholds);
        info!(event_name = "gate.approval.submitting", pipeline = %self.gate.pipeline_name, "{summary}");

        self.pipeline
            .submit_approval(ApprovalSubmission {
                pipeline_name: self.gate.pipeline_name.clone(),
                stage_name: self.gate.review_stage.clone(),
                action_name: self.gate.review_action.clone(),
                token,
                summary: summary.clone(),
            })
            .await?;

        info!(
            event_name = "gate.approval.approved",
            pipeline = %self.gate.pipeline_name,
            "pipeline review approved"
        );
        Ok(ApprovalOutcome::Approved { summary })
    }
}

fn approvable_token(
    state: Option<PipelineReviewState>,
    gate: &GateConfig,
) -> Result<ApprovalToken, NotApprovableReason> {
    let Some(state) = state else {
        return Err(NotApprovableReason::StageMissing { stage: gate.review_stage.clone() });
    };

    let action = gate.review_action.clone();
    if state.status != ReviewStatus::InProgress {
        return Err(NotApprovableReason::NotInProgress { action, status: state.status });
    }

    state.token.ok_or(NotApprovableReason::TokenMissing { action })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::{approval_summary, ApprovalController, ApprovalOutcome, NotApprovableReason};
    use crate::config::{AppConfig, GateConfig};
    use crate::domain::event::CostFigures;
    use crate::domain::review::ReviewStatus;
    use crate::domain::thresholds::Thresholds;
    use crate::errors::ApprovalError;
    use crate::fakes::FakePipelineController;

    fn gate_fixture() -> GateConfig {
        let mut config = AppConfig::default();
        config.gate.sns_topic_arn = "arn:aws:sns:eu-west-1:123456789012:approvals".to_string();
        config.gate.pipeline_name = "infra-pipeline".to_string();
        config.gate.region = "eu-west-1".to_string();
        config.gate
    }

    fn figures() -> CostFigures {
        CostFigures {
            total: Decimal::new(1005, 0),
            past: Decimal::new(1000, 0),
            diff: Decimal::new(5, 0),
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds::new(Decimal::new(100, 0), Decimal::new(10, 0))
    }

    #[test]
    fn summary_embeds_costs_and_limits() {
        assert_eq!(
            approval_summary(&figures(), &thresholds()),
            "Current deployment costs changes: before 1000$, after 1005$, diff 5$. \
             This is less than thresholds - 100$ or 10%. The pipeline is auto-approved"
        );
    }

    #[tokio::test]
    async fn in_progress_review_with_token_is_approved() {
        let pipeline = Arc::new(FakePipelineController::in_progress("token-1"));
        let controller = ApprovalController::new(pipeline.clone(), gate_fixture());

        let outcome = controller.auto_approve(&figures(), &thresholds()).await.expect("approve");

        assert!(matches!(outcome, ApprovalOutcome::Approved { .. }));
        let submissions = pipeline.submissions().await;
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].pipeline_name, "infra-pipeline");
        assert_eq!(submissions[0].stage_name, "ReviewPlan");
        assert_eq!(submissions[0].action_name, "review-plan");
        assert_eq!(submissions[0].token, "token-1");
        assert!(submissions[0].summary.contains("before 1000$, after 1005$, diff 5$"));
    }

    #[tokio::test]
    async fn already_approved_review_is_not_touched() {
        let pipeline = Arc::new(FakePipelineController::with_status("Succeeded", None));
        let controller = ApprovalController::new(pipeline.clone(), gate_fixture());

        let outcome = controller.auto_approve(&figures(), &thresholds()).await.expect("outcome");

        let ApprovalOutcome::NotApprovable { reason } = outcome else {
            panic!("expected not approvable outcome");
        };
        assert_eq!(
            reason,
            NotApprovableReason::NotInProgress {
                action: "review-plan".to_string(),
                status: ReviewStatus::Approved
            }
        );
        assert_eq!(reason.to_string(), "review-plan step is in Succeeded status");
        assert!(pipeline.submissions().await.is_empty());
    }

    #[tokio::test]
    async fn in_progress_without_token_is_not_approvable() {
        let pipeline = Arc::new(FakePipelineController::with_status("InProgress", None));
        let controller = ApprovalController::new(pipeline.clone(), gate_fixture());

        let outcome = controller.auto_approve(&figures(), &thresholds()).await.expect("outcome");

        assert_eq!(
            outcome,
            ApprovalOutcome::NotApprovable {
                reason: NotApprovableReason::TokenMissing { action: "review-plan".to_string() }
            }
        );
        assert!(pipeline.submissions().await.is_empty());
    }

    #[tokio::test]
    async fn reasons_name_the_configured_review_action() {
        let mut gate = gate_fixture();
        gate.review_action = "cost-signoff".to_string();

        let finished = ApprovalController::new(
            Arc::new(FakePipelineController::with_status("Failed", None)),
            gate.clone(),
        );
        let outcome = finished.auto_approve(&figures(), &thresholds()).await.expect("outcome");
        let ApprovalOutcome::NotApprovable { reason } = outcome else {
            panic!("expected not approvable outcome");
        };
        assert_eq!(reason.to_string(), "cost-signoff step is in Failed status");

        let tokenless = ApprovalController::new(
            Arc::new(FakePipelineController::with_status("InProgress", None)),
            gate,
        );
        let outcome = tokenless.auto_approve(&figures(), &thresholds()).await.expect("outcome");
        let ApprovalOutcome::NotApprovable { reason } = outcome else {
            panic!("expected not approvable outcome");
        };
        assert_eq!(reason.to_string(), "cost-signoff step has no approval token");
    }

    #[tokio::test]
    async fn missing_review_stage_is_not_approvable() {
        let pipeline = Arc::new(FakePipelineController::without_review_stage());
        let controller = ApprovalController::new(pipeline.clone(), gate_fixture());

        let outcome = controller.auto_approve(&figures(), &thresholds()).await.expect("outcome");

        assert_eq!(
            outcome,
            ApprovalOutcome::NotApprovable {
                reason: NotApprovableReason::StageMissing { stage: "ReviewPlan".to_string() }
            }
        );
    }

    #[tokio::test]
    async fn token_is_spent_once_and_second_run_sees_terminal_state() {
        let pipeline = Arc::new(FakePipelineController::in_progress("token-1"));
        let controller = ApprovalController::new(pipeline.clone(), gate_fixture());

        let first = controller.auto_approve(&figures(), &thresholds()).await.expect("first");
        let second = controller.auto_approve(&figures(), &thresholds()).await.expect("second");

        assert!(matches!(first, ApprovalOutcome::Approved { .. }));
        assert!(matches!(
            second,
            ApprovalOutcome::NotApprovable {
                reason: NotApprovableReason::NotInProgress { status: ReviewStatus::Approved, .. }
            }
        ));
        assert_eq!(pipeline.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn rejected_token_surfaces_as_stale_token() {
        let pipeline = Arc::new(FakePipelineController::in_progress("token-1").rejecting_tokens());
        let controller = ApprovalController::new(pipeline.clone(), gate_fixture());

        let error = controller.auto_approve(&figures(), &thresholds()).await.expect_err("stale");

        assert!(matches!(error, ApprovalError::StaleToken { ref pipeline, .. } if pipeline == "infra-pipeline"));
        assert_eq!(pipeline.state_queries().await, 1, "no re-query after a stale token");
    }
}
