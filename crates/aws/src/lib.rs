//! AWS-backed collaborators for the approval gate.
//!
//! - `SnsNotifier` publishes review requests to an SNS topic.
//! - `CodePipelineController` reads and approves the pipeline's manual
//!   review action.
//!
//! Both share one `SdkConfig`, loaded once at cold start from the ambient
//! credential chain. `aws.endpoint_url` points the clients at a local
//! emulator instead of the public endpoints.

pub mod codepipeline;
pub mod sns;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use costgate_core::config::AppConfig;
use tracing::info;

pub use codepipeline::CodePipelineController;
pub use sns::SnsNotifier;

pub async fn load_sdk_config(config: &AppConfig) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.gate.region.clone()));

    if let Some(endpoint_url) = &config.aws.endpoint_url {
        info!(
            event_name = "system.aws.endpoint_override",
            endpoint_url = %endpoint_url,
            "using custom AWS endpoint"
        );
        loader = loader.endpoint_url(endpoint_url.as_str());
    }

    loader.load().await
}
