//! In-memory collaborators for tests and dry runs.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::approval::{ApprovalSubmission, PipelineController};
use crate::domain::review::{ApprovalToken, PipelineReviewState, ReviewStatus};
use crate::errors::{ApprovalError, DispatchError};
use crate::notify::{Notifier, PublishAck};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub subject: String,
    pub message: String,
    pub message_id: Option<String>,
}

#[derive(Default)]
pub struct RecordingNotifier {
    published: RwLock<Vec<PublishedMessage>>,
    attempts: RwLock<usize>,
    failure: Option<String>,
}

impl RecordingNotifier {
    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Self::default() }
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().await.clone()
    }

    pub async fn attempts(&self) -> usize {
        *self.attempts.read().await
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        message: &str,
    ) -> Result<PublishAck, DispatchError> {
        *self.attempts.write().await += 1;

        if let Some(failure) = &self.failure {
            return Err(DispatchError::Publish {
                topic: topic.to_string(),
                message: failure.clone(),
            });
        }

        let mut published = self.published.write().await;
        let message_id = Some(format!("fake-message-{}", published.len() + 1));
        published.push(PublishedMessage {
            topic: topic.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
            message_id: message_id.clone(),
        });
        Ok(PublishAck { message_id })
    }
}

/// Submission as seen by the fake pipeline, with the token exposed for
/// assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub pipeline_name: String,
    pub stage_name: String,
    pub action_name: String,
    pub token: String,
    pub summary: String,
}

#[derive(Clone, Debug)]
struct FakeReviewAction {
    status: String,
    token: Option<String>,
}

/// Single review action that behaves like the real pipeline: a successful
/// approval moves it to `Succeeded` and retires the token.
#[derive(Default)]
pub struct FakePipelineController {
    action: RwLock<Option<FakeReviewAction>>,
    submissions: RwLock<Vec<RecordedSubmission>>,
    state_queries: RwLock<usize>,
    reject_tokens: bool,
}

impl FakePipelineController {
    pub fn in_progress(token: impl Into<String>) -> Self {
        Self::with_status("InProgress", Some(token.into()))
    }

    pub fn with_status(status: impl Into<String>, token: Option<String>) -> Self {
        Self {
            action: RwLock::new(Some(FakeReviewAction { status: status.into(), token })),
            ..Self::default()
        }
    }

    pub fn without_review_stage() -> Self {
        Self::default()
    }

    /// Every submission fails as if the token had already been used.
    pub fn rejecting_tokens(mut self) -> Self {
        self.reject_tokens = true;
        self
    }

    pub async fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    pub async fn state_queries(&self) -> usize {
        *self.state_queries.read().await
    }
}

#[async_trait]
impl PipelineController for FakePipelineController {
    async fn review_state(
        &self,
        _pipeline_name: &str,
        stage_name: &str,
    ) -> Result<Option<PipelineReviewState>, ApprovalError> {
        *self.state_queries.write().await += 1;

        let action = self.action.read().await;
        Ok(action.as_ref().map(|action| PipelineReviewState {
            stage_name: stage_name.to_string(),
            action_name: "review-plan".to_string(),
            status: ReviewStatus::from_pipeline(&action.status),
            token: action.token.as_deref().map(ApprovalToken::new),
        }))
    }

    async fn submit_approval(&self, submission: ApprovalSubmission) -> Result<(), ApprovalError> {
        let mut action = self.action.write().await;
        let current_token = action.as_ref().and_then(|action| action.token.as_deref());

        if self.reject_tokens || current_token != Some(submission.token.expose()) {
            return Err(ApprovalError::StaleToken {
                pipeline: submission.pipeline_name,
                message: "InvalidApprovalTokenException: the approval token is not valid"
                    .to_string(),
            });
        }

        *action = Some(FakeReviewAction { status: "Succeeded".to_string(), token: None });
        self.submissions.write().await.push(RecordedSubmission {
            pipeline_name: submission.pipeline_name,
            stage_name: submission.stage_name,
            action_name: submission.action_name,
            token: submission.token.expose().to_string(),
            summary: submission.summary,
        });
        Ok(())
    }
}
