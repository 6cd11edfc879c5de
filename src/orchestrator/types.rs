//! Request, plan and outcome types for orchestrated runs

use crate::context::SharedContext;
use crate::phase::{DocumentRef, PhaseResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// What a caller asks the orchestrator to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub document: DocumentRef,
    /// Model or config identifier passed through to every phase
    pub model: String,
    /// Phase name -> include this phase
    pub phases: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_artifact: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(document: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            document: DocumentRef::new(document),
            model: model.into(),
            phases: BTreeMap::new(),
            upstream_artifact: None,
        }
    }

    pub fn with_phase(mut self, name: impl Into<String>, include: bool) -> Self {
        self.phases.insert(name.into(), include);
        self
    }

    /// Include every named phase
    pub fn with_phases<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.phases.insert(name.into(), true);
        }
        self
    }

    pub fn with_upstream_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.upstream_artifact = Some(path.into());
        self
    }

    /// Names flagged for inclusion
    pub fn requested(&self) -> Vec<String> {
        self.phases
            .iter()
            .filter(|(_, include)| **include)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn upstream_artifact(&self) -> Option<&Path> {
        self.upstream_artifact.as_deref()
    }
}

/// How a run executed its waves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Resolved phases and the waves they run in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Dependency closure of the request, in registry order
    pub resolved: Vec<String>,
    pub waves: Vec<Vec<String>>,
}

impl RunPlan {
    pub fn phase_count(&self) -> usize {
        self.resolved.len()
    }

    /// Index of the wave a phase runs in
    pub fn wave_of(&self, phase: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|p| p == phase))
    }
}

/// Results of one run plus the final context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub mode: ExecutionMode,
    /// Waves that were executed
    pub waves: Vec<Vec<String>>,
    /// One entry per resolved phase
    pub results: BTreeMap<String, PhaseResult>,
    pub context: SharedContext,
}

impl RunOutcome {
    pub fn succeeded(&self) -> Vec<&str> {
        self.results
            .values()
            .filter(|r| r.success)
            .map(|r| r.phase.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.results
            .values()
            .filter(|r| !r.success)
            .map(|r| r.phase.as_str())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.values().all(|r| r.success)
    }

    /// One line per phase: `name: ok (summary)` or `name: failed: error`
    pub fn summary(&self) -> String {
        self.results
            .values()
            .map(|r| {
                if r.success {
                    format!("{}: ok ({}, {} ms)", r.phase, r.summarize(), r.duration_ms)
                } else {
                    format!("{}: {}", r.phase, r.summarize())
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run-level errors. Phase-local failures never show up here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no known phases requested")]
    NoPhasesRequested,

    #[error("capability unavailable for required phase '{phase}'")]
    CapabilityUnavailable { phase: String },

    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_skips_excluded_phases() {
        let request = RunRequest::new("protocol.pdf", "m")
            .with_phases(["design", "metadata"])
            .with_phase("narrative", false);

        assert_eq!(request.requested(), vec!["design", "metadata"]);
    }

    #[test]
    fn test_plan_wave_lookup() {
        let plan = RunPlan {
            resolved: vec!["metadata".into(), "design".into(), "interventions".into()],
            waves: vec![
                vec!["metadata".into(), "design".into()],
                vec!["interventions".into()],
            ],
        };
        assert_eq!(plan.wave_of("design"), Some(0));
        assert_eq!(plan.wave_of("interventions"), Some(1));
        assert_eq!(plan.wave_of("ghost"), None);
    }

    #[test]
    fn test_cycle_error_message() {
        let err = OrchestratorError::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }
}
