//! Execution wrapper around a single phase.
//!
//! Everything a phase does (reading context, extracting, updating context) is
//! caught here. Errors and panics become a failed [`PhaseResult`]; nothing
//! escapes to the wave or the run.

use super::types::RunRequest;
use crate::context::SharedContext;
use crate::phase::{ExtractionRequest, Phase, PhaseResult};
use crate::sink::ArtifactSink;
use futures::FutureExt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::Instrument;

/// Run one phase against `context`: extract, save, then `on_success`
pub(crate) async fn execute_phase(
    phase: &dyn Phase,
    request: &RunRequest,
    context: &mut SharedContext,
    sink: &dyn ArtifactSink,
) -> PhaseResult {
    let span = tracing::info_span!("phase", name = %phase.name());
    run_phase(phase, request, context, sink).instrument(span).await
}

async fn run_phase(
    phase: &dyn Phase,
    request: &RunRequest,
    context: &mut SharedContext,
    sink: &dyn ArtifactSink,
) -> PhaseResult {
    let name = phase.name();
    let config = phase.config();
    let started = Instant::now();

    if config.requires_upstream_artifact && request.upstream_artifact().is_none() {
        tracing::warn!("upstream artifact required but not provided");
        return PhaseResult::failure(name, "upstream artifact required but not provided", 0);
    }

    let hints = match catch_unwind(AssertUnwindSafe(|| phase.context_requirements(context))) {
        Ok(hints) => hints,
        Err(panic) => {
            let message = format!("panicked reading context: {}", panic_message(panic.as_ref()));
            tracing::warn!(error = %message, "phase failed");
            return PhaseResult::failure(name, message, elapsed_ms(started));
        }
    };

    let extraction = ExtractionRequest {
        document: &request.document,
        model: &request.model,
        hints,
        upstream_artifact: request.upstream_artifact(),
    };
    tracing::debug!(hints = ?extraction.hints.keys().collect::<Vec<_>>(), "extracting");

    let outcome = AssertUnwindSafe(phase.extract(&extraction))
        .catch_unwind()
        .await;
    let duration_ms = elapsed_ms(started);

    let result = match outcome {
        Ok(Ok(output)) => PhaseResult::success(name, output, duration_ms),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "phase failed");
            return PhaseResult::failure(name, e.to_string(), duration_ms);
        }
        Err(panic) => {
            let message = format!("extraction panicked: {}", panic_message(panic.as_ref()));
            tracing::warn!(error = %message, "phase failed");
            return PhaseResult::failure(name, message, duration_ms);
        }
    };

    match sink.save(config, &result).await {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "saved artifact"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "failed to save artifact"),
    }

    // A panicking update must leave no partial writes behind
    let mut staged = context.snapshot();
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| phase.on_success(&mut staged, &result))) {
        let message = format!("context update panicked: {}", panic_message(panic.as_ref()));
        tracing::warn!(error = %message, "phase failed");
        return PhaseResult::failure(name, message, duration_ms);
    }
    *context = staged;

    tracing::info!(duration_ms, summary = %result.summarize(), "phase succeeded");
    result
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Text of a panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
