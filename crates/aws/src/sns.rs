use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::Client;
use costgate_core::errors::DispatchError;
use costgate_core::notify::{Notifier, PublishAck};
use tracing::debug;

/// SNS rejects subjects longer than this.
pub const SUBJECT_MAX_CHARS: usize = 100;

#[derive(Clone, Debug)]
pub struct SnsNotifier {
    client: Client,
}

impl SnsNotifier {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self { client: Client::new(sdk_config) }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        message: &str,
    ) -> Result<PublishAck, DispatchError> {
        let output = self
            .client
            .publish()
            .topic_arn(topic)
            .subject(email_subject(subject))
            .message(message)
            .send()
            .await
            .map_err(|error| DispatchError::Publish {
                topic: topic.to_string(),
                message: DisplayErrorContext(&error).to_string(),
            })?;

        debug!(
            event_name = "aws.sns.published",
            topic,
            message_id = ?output.message_id(),
            "sns publish acknowledged"
        );
        Ok(PublishAck { message_id: output.message_id().map(str::to_string) })
    }
}

/// Email subjects must be printable ASCII on a single line.
pub fn email_subject(subject: &str) -> String {
    subject
        .chars()
        .map(|ch| match ch {
            ch if ch.is_ascii_control() => ' ',
            ch if ch.is_ascii() => ch,
            _ => '?',
        })
        .take(SUBJECT_MAX_CHARS)
        .collect()
}
