//! Dependency-aware phase orchestration
//!
//! A run goes through four steps:
//!
//! 1. **Closure**: requested phases plus everything they transitively depend on
//! 2. **Waves**: groups of phases with no dependencies on each other
//! 3. **Execution**: waves in order; in parallel mode the phases of a wave run
//!    concurrently, each against a private snapshot of the shared context
//! 4. **Merge-back**: each successful snapshot is copied into the live context,
//!    restricted to the fields the phase owns, in registry order
//!
//! Phase failures stay inside their [`PhaseResult`](crate::phase::PhaseResult).
//! Only configuration problems and empty requests fail a run.

mod dependency;
mod execute;
mod ownership;
mod runner;
mod types;

pub use dependency::{build_waves, DependencyMap};
pub use ownership::OwnershipMap;
pub use runner::PhaseOrchestrator;
pub use types::{ExecutionMode, OrchestratorError, RunOutcome, RunPlan, RunRequest};
