//! Pipeline configuration: dependency and ownership tables
//!
//! Loaded from YAML:
//!
//! ```yaml
//! max_workers: 4
//! output_dir: output
//! dependencies:
//!   interventions: [metadata, design]
//! ownership:
//!   design: [arms, epochs, study_cells]
//! ```
//!
//! Both tables are immutable once an orchestrator is built from them.

use crate::context::ContextField;
use crate::phase::builtin::{
    DESIGN, ELIGIBILITY, INTERVENTIONS, METADATA, NARRATIVE, OBJECTIVES, SCHEDULING,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default bound on concurrently running phases within a wave
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Errors from loading pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration has neither a dependency nor an ownership table")]
    Missing,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

/// Dependency table, ownership table and execution defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Upper bound on workers per parallel wave
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Where artifacts are written when no output dir is given explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Phase name -> phases whose output it reads
    #[serde(default)]
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Phase name -> context fields it is authoritative for
    #[serde(default)]
    pub ownership: BTreeMap<String, BTreeSet<ContextField>>,
}

impl PipelineConfig {
    /// Tables for the built-in protocol phases
    pub fn builtin() -> Self {
        use ContextField as F;

        let dependencies = [
            (ELIGIBILITY, vec![METADATA]),
            (OBJECTIVES, vec![METADATA]),
            (INTERVENTIONS, vec![METADATA, DESIGN]),
            (SCHEDULING, vec![DESIGN]),
        ]
        .into_iter()
        .map(|(phase, deps)| {
            (
                phase.to_string(),
                deps.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

        let ownership = [
            (
                METADATA,
                vec![
                    F::StudyTitle,
                    F::StudyId,
                    F::Sponsor,
                    F::Indication,
                    F::StudyPhase,
                    F::StudyIdentifiers,
                ],
            ),
            (ELIGIBILITY, vec![F::EligibilityCriteria]),
            (OBJECTIVES, vec![F::Objectives, F::Endpoints]),
            (DESIGN, vec![F::Arms, F::Epochs, F::StudyCells]),
            (INTERVENTIONS, vec![F::Interventions, F::Products]),
            (SCHEDULING, vec![F::Encounters, F::Activities, F::Timings]),
            (NARRATIVE, vec![F::NarrativeSections, F::Abbreviations]),
        ]
        .into_iter()
        .map(|(phase, fields)| (phase.to_string(), fields.into_iter().collect()))
        .collect();

        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            output_dir: None,
            dependencies,
            ownership,
        }
    }

    /// Parse and validate YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Load `path` if given, else the default location if it exists, else the built-in tables
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.is_file() => {
                tracing::debug!(path = %default.display(), "loading pipeline config");
                Self::load(&default)
            }
            _ => Ok(Self::builtin()),
        }
    }

    /// `<config_dir>/protoflow/pipeline.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("protoflow").join("pipeline.yaml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dependencies.is_empty() && self.ownership.is_empty() {
            return Err(ConfigError::Missing);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".to_string()));
        }
        for (phase, deps) in &self.dependencies {
            if deps.contains(phase) {
                return Err(ConfigError::Invalid(format!("phase '{}' depends on itself", phase)));
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builtin()
    }
}
