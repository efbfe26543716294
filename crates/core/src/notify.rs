use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GateConfig;
use crate::domain::decision::ThresholdBreach;
use crate::domain::thresholds::Thresholds;
use crate::errors::DispatchError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAck {
    pub message_id: Option<String>,
}

/// Publishes one message to a notification topic.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        message: &str,
    ) -> Result<PublishAck, DispatchError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub topic: String,
    pub subject: String,
    pub message_id: Option<String>,
}

pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    gate: GateConfig,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, gate: GateConfig) -> Self {
        Self { notifier, gate }
    }

    /// Sends exactly one approval request. Publish failures are returned as-is
    /// and never retried here.
    pub async fn notify(
        &self,
        subject: &str,
        body_text: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        let message = approval_message(subject, &review_console_url(&self.gate), body_text);
        info!(
            event_name = "gate.notify.sending",
            topic = %self.gate.sns_topic_arn,
            subject,
            "sending approval notification"
        );
        info!(event_name = "gate.notify.body", "{message}");

        let ack = self.notifier.publish(&self.gate.sns_topic_arn, subject, &message).await?;
        info!(
            event_name = "gate.notify.published",
            topic = %self.gate.sns_topic_arn,
            message_id = ack.message_id.as_deref().unwrap_or("unknown"),
            "approval notification published"
        );

        Ok(DispatchReceipt {
            topic: self.gate.sns_topic_arn.clone(),
            subject: subject.to_string(),
            message_id: ack.message_id,
        })
    }
}

pub fn approval_subject(
    pipeline_name: &str,
    breach: ThresholdBreach,
    thresholds: &Thresholds,
) -> String {
    match breach {
        ThresholdBreach::Absolute => format!(
            "Pipeline {pipeline_name} needs approval - change absolute threshold {}$ exceeded",
            thresholds.absolute
        ),
        ThresholdBreach::Percent => format!(
            "Pipeline {pipeline_name} needs approval - change percentage threshold {}% exceeded",
            thresholds.percent
        ),
    }
}

/// Deep link to the pending approval in the pipeline console.
pub fn review_console_url(gate: &GateConfig) -> String {
    format!(
        "{}/codesuite/codepipeline/pipelines/{}/view?region={}#/{}/{}/approve/",
        gate.console_base_url.trim_end_matches('/'),
        gate.pipeline_name,
        gate.region,
        gate.review_stage,
        gate.review_action
    )
}

pub fn approval_message(subject: &str, console_url: &str, body_text: &str) -> String {
    format!("{subject}\nPipeline: {console_url}\nDetails:\n{body_text}\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::{approval_subject, review_console_url, NotificationDispatcher};
    use crate::config::AppConfig;
    use crate::domain::decision::ThresholdBreach;
    use crate::domain::thresholds::Thresholds;
    use crate::errors::DispatchError;
    use crate::fakes::RecordingNotifier;

    fn gate_fixture() -> crate::config::GateConfig {
        let mut config = AppConfig::default();
        config.gate.sns_topic_arn = "arn:aws:sns:eu-west-1:123456789012:approvals".to_string();
        config.gate.pipeline_name = "infra-pipeline".to_string();
        config.gate.region = "eu-west-1".to_string();
        config.gate
    }

    #[test]
    fn subjects_quote_the_configured_limit() {
        let thresholds = Thresholds::new(Decimal::new(100, 0), Decimal::new(25, 1));

        assert_eq!(
            approval_subject("infra-pipeline", ThresholdBreach::Absolute, &thresholds),
            "Pipeline infra-pipeline needs approval - change absolute threshold 100$ exceeded"
        );
        assert_eq!(
            approval_subject("infra-pipeline", ThresholdBreach::Percent, &thresholds),
            "Pipeline infra-pipeline needs approval - change percentage threshold 2.5% exceeded"
        );
    }

    #[test]
    fn console_url_points_at_review_action() {
        let mut gate = gate_fixture();
        gate.console_base_url = "https://console.aws.amazon.com/".to_string();

        assert_eq!(
            review_console_url(&gate),
            "https://console.aws.amazon.com/codesuite/codepipeline/pipelines/infra-pipeline/view?region=eu-west-1#/ReviewPlan/review-plan/approve/"
        );
    }

    #[tokio::test]
    async fn notify_publishes_one_message_with_link_and_verbatim_details() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new(notifier.clone(), gate_fixture());
        let details = "~ aws_db_instance.main\n  + $120.00 monthly";

        let receipt = dispatcher.notify("Pipeline needs approval", details).await.expect("publish");

        let published = notifier.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "arn:aws:sns:eu-west-1:123456789012:approvals");
        assert_eq!(published[0].subject, "Pipeline needs approval");
        assert!(published[0].message.starts_with("Pipeline needs approval\nPipeline: https://"));
        assert!(published[0].message.contains("#/ReviewPlan/review-plan/approve/"));
        assert!(published[0].message.contains(&format!("Details:\n{details}\n")));
        assert_eq!(receipt.message_id, published[0].message_id);
    }

    #[tokio::test]
    async fn publish_failure_is_returned_without_retry() {
        let notifier = Arc::new(RecordingNotifier::failing("AuthorizationError"));
        let dispatcher = NotificationDispatcher::new(notifier.clone(), gate_fixture());

        let error = dispatcher.notify("subject", "details").await.expect_err("should fail");

        assert!(matches!(error, DispatchError::Publish { ref message, .. } if message == "AuthorizationError"));
        assert_eq!(notifier.attempts().await, 1);
    }
}
