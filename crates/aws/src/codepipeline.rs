use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_codepipeline::error::DisplayErrorContext;
use aws_sdk_codepipeline::operation::get_pipeline_state::GetPipelineStateOutput;
use aws_sdk_codepipeline::operation::put_approval_result::PutApprovalResultError;
use aws_sdk_codepipeline::types::{ApprovalResult, ApprovalStatus};
use aws_sdk_codepipeline::Client;
use costgate_core::approval::{ApprovalSubmission, PipelineController};
use costgate_core::domain::review::{ApprovalToken, PipelineReviewState, ReviewStatus};
use costgate_core::errors::ApprovalError;
use tracing::debug;

/// Status reported for a review action that has never executed.
pub const NOT_STARTED: &str = "NotStarted";

#[derive(Clone, Debug)]
pub struct CodePipelineController {
    client: Client,
}

impl CodePipelineController {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self { client: Client::new(sdk_config) }
    }
}

#[async_trait]
impl PipelineController for CodePipelineController {
    async fn review_state(
        &self,
        pipeline_name: &str,
        stage_name: &str,
    ) -> Result<Option<PipelineReviewState>, ApprovalError> {
        let output = self.client.get_pipeline_state().name(pipeline_name).send().await.map_err(
            |error| ApprovalError::StateQuery {
                pipeline: pipeline_name.to_string(),
                message: DisplayErrorContext(&error).to_string(),
            },
        )?;

        let state = review_state_from_output(&output, stage_name);
        debug!(
            event_name = "aws.codepipeline.review_state",
            pipeline = pipeline_name,
            stage = stage_name,
            status = ?state.as_ref().map(|state| state.status.to_string()),
            has_token = state.as_ref().is_some_and(|state| state.token.is_some()),
            "review state loaded"
        );
        Ok(state)
    }

    async fn submit_approval(&self, submission: ApprovalSubmission) -> Result<(), ApprovalError> {
        let result = ApprovalResult::builder()
            .summary(submission.summary)
            .status(ApprovalStatus::Approved)
            .build()
            .map_err(|error| ApprovalError::Submit {
                pipeline: submission.pipeline_name.clone(),
                message: error.to_string(),
            })?;

        self.client
            .put_approval_result()
            .pipeline_name(&submission.pipeline_name)
            .stage_name(&submission.stage_name)
            .action_name(&submission.action_name)
            .token(submission.token.expose())
            .result(result)
            .send()
            .await
            .map_err(|error| {
                let message = DisplayErrorContext(&error).to_string();
                submit_error(&submission.pipeline_name, &error.into_service_error(), message)
            })?;

        Ok(())
    }
}

/// A rejected token means the approval was already decided or superseded.
pub fn submit_error(
    pipeline_name: &str,
    error: &PutApprovalResultError,
    message: String,
) -> ApprovalError {
    let pipeline = pipeline_name.to_string();
    if error.is_invalid_approval_token_exception() {
        ApprovalError::StaleToken { pipeline, message }
    } else {
        ApprovalError::Submit { pipeline, message }
    }
}

/// Latest execution of the first action in `stage_name`.
pub fn review_state_from_output(
    output: &GetPipelineStateOutput,
    stage_name: &str,
) -> Option<PipelineReviewState> {
    let stage = output.stage_states().iter().find(|stage| stage.stage_name() == Some(stage_name))?;
    let action = stage.action_states().first();
    let execution = action.and_then(|action| action.latest_execution());

    let status = execution
        .and_then(|execution| execution.status())
        .map(|status| ReviewStatus::from_pipeline(status.as_str()))
        .unwrap_or_else(|| ReviewStatus::Other(NOT_STARTED.to_string()));

    Some(PipelineReviewState {
        stage_name: stage_name.to_string(),
        action_name: action
            .and_then(|action| action.action_name())
            .unwrap_or_default()
            .to_string(),
        status,
        token: execution.and_then(|execution| execution.token()).map(ApprovalToken::new),
    })
}
