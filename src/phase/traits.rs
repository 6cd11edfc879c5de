//! Phase trait defining the extraction step interface

use super::types::{
    AssembledRecord, ContextHints, ExtractionRequest, PhaseConfig, PhaseError, PhaseOutput,
    PhaseResult,
};
use crate::context::SharedContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for extraction phases
///
/// A phase extracts one slice of the document, optionally folds it into the
/// shared context, and contributes a section to the assembled record.
///
/// # Example
///
/// ```ignore
/// struct TitlePhase { config: PhaseConfig }
///
/// #[async_trait]
/// impl Phase for TitlePhase {
///     fn config(&self) -> &PhaseConfig { &self.config }
///
///     async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError> {
///         let payload = PhasePayload::new().with("title", "A Study");
///         Ok(PhaseOutput::new(payload))
///     }
///
///     fn on_success(&self, context: &mut SharedContext, result: &PhaseResult) {
///         if let Some(payload) = &result.payload {
///             context.facts.study_title = payload.text("title");
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Phase: Send + Sync {
    /// Identity and flags
    fn config(&self) -> &PhaseConfig;

    /// Unique name
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Whether the extraction logic can run at all
    fn is_available(&self) -> bool {
        true
    }

    /// Context slices to pass into this phase's own extraction.
    ///
    /// Phases declare what they read here instead of reading the context ad hoc.
    fn context_requirements(&self, _context: &SharedContext) -> ContextHints {
        ContextHints::new()
    }

    /// Run the extraction.
    ///
    /// Errors are converted into a failed [`PhaseResult`] by the execution
    /// wrapper and never abort the run.
    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError>;

    /// Write a successful result into the shared context.
    ///
    /// Every field written here must be listed under this phase in the
    /// ownership table.
    fn on_success(&self, _context: &mut SharedContext, _result: &PhaseResult) {}

    /// Fold a successful result into the assembled record
    fn combine(&self, result: &PhaseResult, record: &mut AssembledRecord) {
        if let Some(payload) = &result.payload {
            record.insert_section(self.name(), payload.as_value());
        }
    }
}

/// Registry of available phases
#[derive(Clone, Default)]
pub struct PhaseRegistry {
    phases: Vec<Arc<dyn Phase>>,
}

impl PhaseRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    /// Register a phase
    pub fn register<P: Phase + 'static>(&mut self, phase: P) {
        self.register_arc(Arc::new(phase));
    }

    /// Register a shared phase.
    ///
    /// A phase with an already registered name replaces the earlier one.
    pub fn register_arc(&mut self, phase: Arc<dyn Phase>) {
        if let Some(existing) = self.phases.iter_mut().find(|p| p.name() == phase.name()) {
            tracing::warn!(phase = %phase.name(), "replacing already registered phase");
            *existing = phase;
        } else {
            self.phases.push(phase);
        }
        // Stable: equal order hints keep registration order
        self.phases.sort_by_key(|p| p.config().order);
    }

    /// All phases in registry order
    pub fn phases(&self) -> &[Arc<dyn Phase>] {
        &self.phases
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Phase>> {
        self.phases.iter().find(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registry position of a phase
    pub fn position(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name() == name)
    }

    /// Phase names in registry order
    pub fn names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    /// Sort names into registry order; unknown names go last in input order
    pub fn sort_names(&self, names: &mut [String]) {
        names.sort_by_key(|n| self.position(n).unwrap_or(usize::MAX));
    }

    /// Number of registered phases
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

impl std::fmt::Debug for PhaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
