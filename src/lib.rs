//! Protoflow: dependency-aware, wave-parallel protocol extraction
//!
//! Extracts a structured record from a clinical protocol document in named
//! phases. Phases declare what they depend on and which fields of the shared
//! context they own; the orchestrator runs them in dependency waves, either
//! one at a time or concurrently against isolated snapshots.
//!
//! # Core Concepts
//!
//! - **Phase**: one independently schedulable unit of extraction work
//! - **Wave**: phases with no dependency on one another
//! - **Shared context**: the accumulated record passed across phases
//! - **Ownership**: which context fields each phase may write on merge-back
//!
//! # Example
//!
//! ```no_run
//! use protoflow::{builtin, PhaseOrchestrator, PipelineConfig, ReplayClient, RunRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(ReplayClient::new("replay/"));
//! let orchestrator = PhaseOrchestrator::new(builtin::registry(client), &PipelineConfig::builtin())?;
//!
//! let request = RunRequest::new("protocol.pdf", "default").with_phases(["interventions"]);
//! let outcome = orchestrator.run_parallel(&request, None, 4).await?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod phase;
pub mod sink;

pub use client::{
    ClientError, ClientRequest, CommandClient, ExtractionClient, ExtractionOutcome, MockClient,
    ReplayClient,
};
pub use config::{ConfigError, PipelineConfig};
pub use context::{ContextField, Record, RecordSet, SharedContext};
pub use orchestrator::{
    ExecutionMode, OrchestratorError, PhaseOrchestrator, RunOutcome, RunPlan, RunRequest,
};
pub use phase::builtin;
pub use phase::{
    AssembledRecord, Phase, PhaseConfig, PhaseError, PhasePayload, PhaseRegistry, PhaseResult,
};
pub use sink::{ArtifactSink, JsonFileSink, MemorySink, NullSink, SinkError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
