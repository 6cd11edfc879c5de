//! Common test utilities for orchestrator integration tests
//!
//! Provides recorded payloads for the built-in phases, mock-client builders,
//! and a scripted phase whose writes, delays and failures are configurable.

pub mod payloads;
pub mod scripted;

pub use scripted::{ConcurrencyProbe, ScriptedPhase};

use protoflow::{builtin, MockClient, PhaseOrchestrator, PipelineConfig};
use std::sync::Arc;
use std::time::Duration;

/// Every built-in phase name, in registry order
pub const ALL_PHASES: [&str; 7] = [
    builtin::METADATA,
    builtin::ELIGIBILITY,
    builtin::OBJECTIVES,
    builtin::DESIGN,
    builtin::INTERVENTIONS,
    builtin::SCHEDULING,
    builtin::NARRATIVE,
];

/// Mock client with a recorded payload for each named phase
pub fn client_for(phases: &[&str]) -> MockClient {
    phases.iter().fold(MockClient::available(), |client, name| {
        client.with_payload(*name, payloads::for_phase(name))
    })
}

/// Mock client covering every built-in phase
pub fn full_client() -> MockClient {
    client_for(&ALL_PHASES)
}

/// Mock client covering every built-in phase, each answering after its own delay
pub fn delayed_client(delays: &[(&str, Duration)]) -> MockClient {
    delays
        .iter()
        .fold(full_client(), |client, (name, delay)| client.with_delay(*name, *delay))
}

/// Orchestrator over the built-in phases and tables
pub fn builtin_orchestrator(client: MockClient) -> PhaseOrchestrator {
    PhaseOrchestrator::new(builtin::registry(Arc::new(client)), &PipelineConfig::builtin())
        .expect("built-in tables are valid")
}

/// Names as owned strings
pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
