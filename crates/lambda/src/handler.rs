use costgate_core::domain::decision::DecisionRecord;
use costgate_core::domain::event::InboundBatch;
use costgate_core::errors::GateError;
use costgate_core::gate::ApprovalGate;
use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct InvocationReport {
    pub correlation_id: String,
    pub decisions: Vec<DecisionRecord>,
}

pub async fn handle(
    gate: &ApprovalGate,
    event: LambdaEvent<InboundBatch>,
) -> Result<InvocationReport, Error> {
    let correlation_id = event.context.request_id;
    Ok(process(gate, &event.payload, &correlation_id).await?)
}

/// Failures are returned to the runtime unchanged so the event source
/// redelivers the batch.
pub async fn process(
    gate: &ApprovalGate,
    batch: &InboundBatch,
    correlation_id: &str,
) -> Result<InvocationReport, GateError> {
    info!(
        event_name = "gate.invocation.start",
        correlation_id,
        record_count = batch.records.len(),
        "processing cost-change batch"
    );

    match gate.handle_batch(batch, correlation_id).await {
        Ok(decisions) => {
            info!(
                event_name = "gate.invocation.completed",
                correlation_id,
                decisions = %serde_json::to_string(&decisions).unwrap_or_default(),
                "cost-change batch processed"
            );
            Ok(InvocationReport { correlation_id: correlation_id.to_string(), decisions })
        }
        Err(gate_error) => {
            error!(
                event_name = "gate.invocation.failed",
                correlation_id,
                error_class = gate_error.error_class(),
                error = %gate_error,
                "cost-change batch failed"
            );
            Err(gate_error)
        }
    }
}
