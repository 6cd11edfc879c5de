//! Extraction client: the external service that performs one phase's extraction
//!
//! Defines the client trait and outcome types. Three implementations:
//! - `CommandClient`: spawns an external program per phase, JSON over stdio (production)
//! - `ReplayClient`: replays recorded outcomes from a directory (offline runs)
//! - `MockClient`: returns preconfigured outcomes (testing)

use crate::phase::ContextHints;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Everything a client needs to run one phase's extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Phase name
    pub phase: String,
    /// Source document
    pub document: PathBuf,
    /// Model or configuration identifier
    pub model: String,
    /// Context slices the phase asked to be passed along
    #[serde(default)]
    pub hints: ContextHints,
    /// Precomputed upstream artifact, when the phase needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_artifact: Option<PathBuf>,
}

/// Opaque success/failure/payload triple returned by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub success: bool,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ExtractionOutcome {
    pub fn succeeded(payload: Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
            confidence: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Errors from extraction client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("extraction service not available: {0}")]
    Unavailable(String),
    #[error("no extraction configured for phase: {0}")]
    PhaseNotSupported(String),
    #[error("invocation failed: {0}")]
    InvocationFailed(String),
    #[error("response parse error: {0}")]
    ParseError(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client trait for running a phase's extraction.
///
/// Abstracts over transport (subprocess, recorded files, mock) so phases
/// don't depend on how the extraction service is reached. From the
/// orchestrator's side `extract` is one blocking round-trip; any timeout is
/// the client's responsibility.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Whether this client can run the given phase at all.
    fn supports(&self, phase: &str) -> bool;

    /// Run one extraction.
    async fn extract(&self, request: &ClientRequest) -> Result<ExtractionOutcome, ClientError>;
}

/// Runs an external program once per extraction.
///
/// The request is written to the program's stdin as JSON; its stdout must be
/// a JSON [`ExtractionOutcome`]. The phase name is passed as the last argument.
pub struct CommandClient {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn invoke(&self, request: &ClientRequest) -> Result<ExtractionOutcome, ClientError> {
        let input = serde_json::to_vec(request)
            .map_err(|e| ClientError::InvocationFailed(format!("cannot encode request: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&request.phase)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClientError::Unavailable(format!("{}: {}", self.program, e)))?;

        // Feed stdin while draining stdout/stderr so neither side blocks on a full pipe
        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            return Err(ClientError::InvocationFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        match written {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
            _ => {}
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ClientError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ExtractionClient for CommandClient {
    fn supports(&self, _phase: &str) -> bool {
        true
    }

    async fn extract(&self, request: &ClientRequest) -> Result<ExtractionOutcome, ClientError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.invoke(request))
                .await
                .map_err(|_| {
                    ClientError::InvocationFailed(format!(
                        "timed out after {} seconds",
                        limit.as_secs()
                    ))
                })?,
            None => self.invoke(request).await,
        }
    }
}

/// Replays recorded outcomes stored as `<dir>/<phase>.json`.
///
/// A phase without a recording is reported as unsupported.
pub struct ReplayClient {
    dir: PathBuf,
}

impl ReplayClient {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn recording(&self, phase: &str) -> PathBuf {
        self.dir.join(format!("{}.json", phase))
    }
}

#[async_trait]
impl ExtractionClient for ReplayClient {
    fn supports(&self, phase: &str) -> bool {
        self.recording(phase).is_file()
    }

    async fn extract(&self, request: &ClientRequest) -> Result<ExtractionOutcome, ClientError> {
        let path = self.recording(&request.phase);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClientError::PhaseNotSupported(request.phase.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map_err(|e| ClientError::ParseError(format!("{}: {}", path.display(), e)))
    }
}

/// Mock client for testing; returns preconfigured outcomes.
pub struct MockClient {
    available: bool,
    outcomes: HashMap<String, Result<ExtractionOutcome, String>>,
    delays: HashMap<String, Duration>,
    panics: HashSet<String>,
    calls: Mutex<Vec<ClientRequest>>,
}

impl MockClient {
    /// Create a mock client that supports every configured phase.
    pub fn available() -> Self {
        Self {
            available: true,
            outcomes: HashMap::new(),
            delays: HashMap::new(),
            panics: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client that supports nothing.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Register a successful outcome for a phase.
    pub fn with_outcome(mut self, phase: impl Into<String>, outcome: ExtractionOutcome) -> Self {
        self.outcomes.insert(phase.into(), Ok(outcome));
        self
    }

    /// Register a payload that extracts successfully.
    pub fn with_payload(self, phase: impl Into<String>, payload: Value) -> Self {
        self.with_outcome(phase, ExtractionOutcome::succeeded(payload))
    }

    /// Register a client-level failure for a phase.
    pub fn with_failure(mut self, phase: impl Into<String>, error: impl Into<String>) -> Self {
        self.outcomes.insert(phase.into(), Err(error.into()));
        self
    }

    /// Delay the phase's response, simulating a slow round-trip.
    pub fn with_delay(mut self, phase: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(phase.into(), delay);
        self
    }

    /// Make the phase's extraction panic.
    pub fn with_panic(mut self, phase: impl Into<String>) -> Self {
        let phase = phase.into();
        self.outcomes
            .entry(phase.clone())
            .or_insert_with(|| Ok(ExtractionOutcome::succeeded(Value::Null)));
        self.panics.insert(phase);
        self
    }

    /// Requests received so far, in call order.
    pub fn calls(&self) -> Vec<ClientRequest> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// The last request received for a phase.
    pub fn last_call(&self, phase: &str) -> Option<ClientRequest> {
        self.calls().into_iter().rev().find(|c| c.phase == phase)
    }
}

#[async_trait]
impl ExtractionClient for MockClient {
    fn supports(&self, phase: &str) -> bool {
        self.available && self.outcomes.contains_key(phase)
    }

    async fn extract(&self, request: &ClientRequest) -> Result<ExtractionOutcome, ClientError> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        if !self.available {
            return Err(ClientError::Unavailable(
                "mock client configured as unavailable".to_string(),
            ));
        }

        if let Some(delay) = self.delays.get(&request.phase) {
            tokio::time::sleep(*delay).await;
        }

        if self.panics.contains(&request.phase) {
            panic!("mock extraction panicked for phase '{}'", request.phase);
        }

        match self.outcomes.get(&request.phase) {
            Some(Ok(outcome)) => Ok(outcome.clone()),
            Some(Err(message)) => Err(ClientError::InvocationFailed(message.clone())),
            None => Err(ClientError::PhaseNotSupported(request.phase.clone())),
        }
    }
}
