mod bootstrap;
mod handler;

use costgate_core::config::{AppConfig, LoadOptions};
use lambda_runtime::{service_fn, Error, LambdaEvent};

fn init_logging(config: &AppConfig) {
    use costgate_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    // CloudWatch renders raw escape codes, so colours stay off.
    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_target(false)
                .with_max_level(log_level)
                .compact()
                .init();
        }
        Pretty => {
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_target(false)
                .with_max_level(log_level)
                .pretty()
                .init();
        }
        Json => {
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_target(false)
                .with_max_level(log_level)
                .json()
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    run().await
}

async fn run() -> Result<(), Error> {
    // Config is loaded once per cold start and shared read-only by every invocation.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await;
    tracing::info!(
        event_name = "system.lambda.started",
        correlation_id = "bootstrap",
        pipeline = %app.config.gate.pipeline_name,
        absolute_threshold = %app.config.thresholds.absolute,
        percent_threshold = %app.config.thresholds.percent,
        "approval gate ready"
    );

    let gate = &app.gate;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<_>| async move {
        handler::handle(gate, event).await
    }))
    .await
}
