//! Artifact sinks: where successful phase results are persisted
//!
//! Saving is best-effort. The orchestrator logs a failed save and carries on;
//! it never turns into a phase or run failure.

use crate::phase::{PhaseConfig, PhaseResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur while saving an artifact
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence target for phase results
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Save one result. Returns where it was written, if anywhere.
    async fn save(&self, phase: &PhaseConfig, result: &PhaseResult)
        -> Result<Option<PathBuf>, SinkError>;
}

/// Writes each result as pretty JSON to `<output_dir>/<output_file>`
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl ArtifactSink for JsonFileSink {
    async fn save(
        &self,
        phase: &PhaseConfig,
        result: &PhaseResult,
    ) -> Result<Option<PathBuf>, SinkError> {
        let json = serde_json::to_string_pretty(result)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&phase.output_file);
        tokio::fs::write(&path, json).await?;
        Ok(Some(path))
    }
}

/// Keeps saved results in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<PhaseResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results saved so far, in save order
    pub fn saved(&self) -> Vec<PhaseResult> {
        self.saved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn saved_phases(&self) -> Vec<String> {
        self.saved().into_iter().map(|r| r.phase).collect()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn save(
        &self,
        _phase: &PhaseConfig,
        result: &PhaseResult,
    ) -> Result<Option<PathBuf>, SinkError> {
        self.saved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(result.clone());
        Ok(None)
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl ArtifactSink for NullSink {
    async fn save(
        &self,
        _phase: &PhaseConfig,
        _result: &PhaseResult,
    ) -> Result<Option<PathBuf>, SinkError> {
        Ok(None)
    }
}
