use std::sync::Arc;

use costgate_aws::{load_sdk_config, CodePipelineController, SnsNotifier};
use costgate_core::config::AppConfig;
use costgate_core::gate::ApprovalGate;
use tracing::info;

pub struct Application {
    pub config: Arc<AppConfig>,
    pub gate: ApprovalGate,
}

pub async fn bootstrap_with_config(config: AppConfig) -> Application {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        region = %config.gate.region,
        "starting approval gate bootstrap"
    );

    let sdk_config = load_sdk_config(&config).await;
    let notifier = Arc::new(SnsNotifier::new(&sdk_config));
    let pipeline = Arc::new(CodePipelineController::new(&sdk_config));
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        "sns and codepipeline clients initialized"
    );

    let config = Arc::new(config);
    let gate = ApprovalGate::new(config.clone(), notifier, pipeline);
    Application { config, gate }
}
