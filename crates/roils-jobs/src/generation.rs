//! One generation attempt with the shared failure policy.

use tracing::{error, warn};

use roils_core::{GenerationOutcome, GenerationRequest, Result};

use crate::report::RecordOutcome;
use crate::StageContext;

pub(crate) enum Attempt {
    /// Normalized, non-empty completion ready to be written.
    Completed(String),
    Failed(RecordOutcome),
}

/// Call the backend once and classify the result.
///
/// A timeout triggers exactly one backend restart and the record is left for
/// a later pass or run. Nothing is retried here. Only fatal errors propagate.
pub(crate) async fn attempt(
    ctx: &StageContext,
    request: &GenerationRequest,
    normalize: fn(&str) -> String,
) -> Result<Attempt> {
    let key = request.key.as_str();
    match ctx.backend.generate(request).await {
        Ok(GenerationOutcome::Completed { text }) => {
            let text = normalize(&text);
            if text.is_empty() {
                warn!(record_key = key, model = %request.model, "Empty completion; nothing written");
                Ok(Attempt::Failed(RecordOutcome::SoftFailure))
            } else {
                Ok(Attempt::Completed(text))
            }
        }
        Ok(GenerationOutcome::Timeout { elapsed_ms }) => {
            warn!(
                record_key = key,
                model = %request.model,
                duration_ms = elapsed_ms,
                "Generation timed out; restarting backend"
            );
            let restarted = match ctx.lifecycle.restart().await {
                Ok(()) => true,
                Err(e) => {
                    error!(record_key = key, error = %e, "Backend restart failed; continuing");
                    false
                }
            };
            Ok(Attempt::Failed(RecordOutcome::TimedOut { restarted }))
        }
        Ok(GenerationOutcome::RequestFailed { status, body }) => {
            warn!(
                record_key = key,
                model = %request.model,
                status,
                body = %body,
                "Generation request failed"
            );
            Ok(Attempt::Failed(RecordOutcome::SoftFailure))
        }
        Ok(GenerationOutcome::InvalidFormat { body }) => {
            warn!(
                record_key = key,
                model = %request.model,
                body = %body,
                "Invalid response format"
            );
            Ok(Attempt::Failed(RecordOutcome::SoftFailure))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(record_key = key, model = %request.model, error = %e, "Generation request error");
            Ok(Attempt::Failed(RecordOutcome::SoftFailure))
        }
    }
}
