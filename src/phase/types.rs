//! Core types for the phase contract

use crate::client::ClientError;
use crate::context::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Identity and flags of a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Short unique name (e.g. "design")
    pub name: String,
    /// Human-readable label
    pub display_name: String,
    /// Ordering hint; registry order sorts on it
    pub order: u32,
    /// File name used when the result is saved as an artifact
    pub output_file: String,
    /// A missing capability is tolerated rather than fatal
    pub optional: bool,
    /// Needs a precomputed upstream artifact to run
    pub requires_upstream_artifact: bool,
}

impl PhaseConfig {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, order: u32) -> Self {
        let name = name.into();
        Self {
            output_file: format!("{}.json", name),
            name,
            display_name: display_name.into(),
            order,
            optional: false,
            requires_upstream_artifact: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn requires_upstream_artifact(mut self) -> Self {
        self.requires_upstream_artifact = true;
        self
    }

    pub fn with_output_file(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = output_file.into();
        self
    }
}

/// Reference to the document being extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub path: PathBuf,
}

impl DocumentRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem, for logs
    pub fn label(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Context slices a phase asks to have passed into its extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextHints(BTreeMap<String, Value>);

impl ContextHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert only when the value carries something
    pub fn insert_non_empty(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        let empty = match &value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        };
        if !empty {
            self.0.insert(key.into(), value);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Inputs handed to a phase's extraction step
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest<'a> {
    pub document: &'a DocumentRef,
    pub model: &'a str,
    pub hints: ContextHints,
    pub upstream_artifact: Option<&'a Path>,
}

/// Successful output of a phase's extraction step
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutput {
    pub payload: PhasePayload,
    pub confidence: Option<f64>,
}

impl PhaseOutput {
    pub fn new(payload: PhasePayload) -> Self {
        Self {
            payload,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence;
        self
    }
}

/// A phase's result payload.
///
/// The shape is owned by the phase; the orchestrator only uses the narrow
/// accessors below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhasePayload(Map<String, Value>);

impl PhasePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; non-object values are rejected
    pub fn from_value(value: Value) -> Result<Self, PhaseError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(PhaseError::EmptyPayload),
            other => Err(PhaseError::MalformedPayload(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Top-level keys, in order
    pub fn field_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// One-line description: list sizes and which scalars are present
    pub fn summarize(&self) -> String {
        if self.0.is_empty() {
            return "empty".to_string();
        }
        self.0
            .iter()
            .map(|(k, v)| match v {
                Value::Array(items) => format!("{}: {}", k, items.len()),
                Value::Null => format!("{}: -", k),
                _ => k.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-blank string value under `key`
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First non-blank string among several candidate keys
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }

    /// Parse the list under `key` into records of `kind`
    pub fn records(&self, key: &str, kind: &str) -> Vec<Record> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| Record::from_json(kind, i + 1, item))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Outcome of one phase in one run.
///
/// Built by the execution wrapper and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<PhasePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl PhaseResult {
    pub fn success(phase: impl Into<String>, output: PhaseOutput, duration_ms: u64) -> Self {
        Self {
            phase: phase.into(),
            success: true,
            payload: Some(output.payload),
            error: None,
            confidence: output.confidence,
            duration_ms,
            finished_at: Utc::now(),
        }
    }

    pub fn failure(phase: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            phase: phase.into(),
            success: false,
            payload: None,
            error: Some(error.into()),
            confidence: None,
            duration_ms,
            finished_at: Utc::now(),
        }
    }

    pub fn summarize(&self) -> String {
        match (&self.payload, &self.error) {
            (Some(payload), _) if self.success => payload.summarize(),
            (_, Some(error)) => format!("failed: {}", error),
            _ => "failed".to_string(),
        }
    }
}

/// The externally visible record assembled from successful phase results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssembledRecord(Map<String, Value>);

impl AssembledRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a top-level section
    pub fn insert_section(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Merge keys into an object section, creating it if needed
    pub fn extend_section(&mut self, name: &str, values: Map<String, Value>) {
        let entry = self
            .0
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(existing) => existing.extend(values),
            other => *other = Value::Object(values),
        }
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}

/// Error types for a phase's extraction step
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("extraction returned no payload")]
    EmptyPayload,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),
}
