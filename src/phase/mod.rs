//! Extraction phases
//!
//! A phase is one named, independently schedulable unit of extraction work:
//!
//! - **Phase trait**: extract, write owned context fields, combine into the assembled record
//! - **PhaseRegistry**: all known phases in registry order (by ordering hint)
//! - **PhaseResult**: the immutable per-run outcome of one phase
//!
//! # Built-in Phases
//!
//! See [`builtin`] for the protocol phases (metadata, eligibility, objectives,
//! design, interventions, scheduling, narrative).

pub mod builtin;
mod traits;
mod types;

pub use traits::{Phase, PhaseRegistry};
pub use types::{
    AssembledRecord, ContextHints, DocumentRef, ExtractionRequest, PhaseConfig, PhaseError,
    PhaseOutput, PhasePayload, PhaseResult,
};
