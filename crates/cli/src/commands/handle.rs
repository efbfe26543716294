use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use costgate_aws::{load_sdk_config, CodePipelineController, SnsNotifier};
use costgate_core::config::{AppConfig, LoadOptions};
use costgate_core::domain::decision::{ApprovalDecision, DecisionRecord, ThresholdDecision};
use costgate_core::domain::event::{CostChangeEvent, InboundBatch};
use costgate_core::errors::{EventError, GateError};
use costgate_core::gate::{planned_action, ApprovalGate};
use costgate_core::policy::{DeterministicThresholdPolicy, ThresholdPolicy};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::commands::{init_logging, CommandResult, EXIT_INVALID_INPUT, EXIT_RUNTIME_FAILURE};

const COMMAND: &str = "handle";

#[derive(Debug, Serialize)]
struct PlannedRecord {
    message_id: String,
    decision: ThresholdDecision,
    action: ApprovalDecision,
}

pub fn run(event_path: &Path, dry_run: bool) -> CommandResult {
    let raw = match fs::read_to_string(event_path)
        .with_context(|| format!("failed to read event file {}", event_path.display()))
    {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "event_unreadable",
                format!("{error:#}"),
                EXIT_RUNTIME_FAILURE,
            )
        }
    };

    let batch = match InboundBatch::from_json(&raw) {
        Ok(batch) => batch,
        Err(error) => {
            let error = GateError::from(error);
            return CommandResult::failure(
                COMMAND,
                error.error_class(),
                format!("event file {} is not a queue batch: {error}", event_path.display()),
                EXIT_INVALID_INPUT,
            );
        }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_INVALID_INPUT,
            )
        }
    };
    init_logging(&config);

    let correlation_id = Uuid::new_v4().to_string();

    if dry_run {
        return match plan_batch(&config, &batch) {
            Ok(planned) => CommandResult::success_with_details(
                COMMAND,
                format!("planned {} record(s); nothing was sent", planned.len()),
                Some(json!({ "correlation_id": correlation_id, "dry_run": true, "records": planned })),
            ),
            Err(error) => {
                let error = GateError::from(error);
                CommandResult::failure(
                    COMMAND,
                    error.error_class(),
                    error.to_string(),
                    EXIT_INVALID_INPUT,
                )
            }
        };
    }

    match execute(config, &batch, &correlation_id) {
        Ok(decisions) => CommandResult::success_with_details(
            COMMAND,
            format!("handled {} record(s)", decisions.len()),
            Some(json!({ "correlation_id": correlation_id, "dry_run": false, "records": decisions })),
        ),
        Err(error) => {
            let error_class =
                error.downcast_ref::<GateError>().map(GateError::error_class).unwrap_or("runtime");
            let exit_code = if error_class == "malformed_event" {
                EXIT_INVALID_INPUT
            } else {
                EXIT_RUNTIME_FAILURE
            };
            CommandResult::failure(COMMAND, error_class, format!("{error:#}"), exit_code)
        }
    }
}

fn plan_batch(config: &AppConfig, batch: &InboundBatch) -> Result<Vec<PlannedRecord>, EventError> {
    if batch.records.is_empty() {
        return Err(EventError::EmptyBatch);
    }

    let policy = DeterministicThresholdPolicy;
    batch
        .records
        .iter()
        .map(|record| {
            let event = CostChangeEvent::from_record(record)?;
            let decision = policy.evaluate(&event.figures, &config.thresholds);
            Ok(PlannedRecord {
                action: planned_action(config, decision, &event.figures),
                message_id: event.message_id,
                decision,
            })
        })
        .collect()
}

fn execute(
    config: AppConfig,
    batch: &InboundBatch,
    correlation_id: &str,
) -> Result<Vec<DecisionRecord>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    runtime.block_on(async {
        let sdk_config = load_sdk_config(&config).await;
        let gate = ApprovalGate::new(
            Arc::new(config),
            Arc::new(SnsNotifier::new(&sdk_config)),
            Arc::new(CodePipelineController::new(&sdk_config)),
        );

        info!(
            event_name = "cli.handle.start",
            correlation_id,
            record_count = batch.records.len(),
            "replaying cost-change batch"
        );
        let decisions = gate
            .handle_batch(batch, correlation_id)
            .await
            .context("cost-change batch was not fully handled")?;
        Ok(decisions)
    })
}
