//! Study metadata: title, identifiers, sponsor, indication, phase

use super::{set_records, set_text, ClientBinding, METADATA};
use crate::client::ExtractionClient;
use crate::context::SharedContext;
use crate::phase::{
    AssembledRecord, ExtractionRequest, Phase, PhaseConfig, PhaseError, PhaseOutput, PhaseResult,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct MetadataPhase {
    binding: ClientBinding,
}

impl MetadataPhase {
    pub fn new(client: Arc<dyn ExtractionClient>) -> Self {
        let config = PhaseConfig::new(METADATA, "Study Metadata", 1)
            .with_output_file("02_study_metadata.json");
        Self {
            binding: ClientBinding::new(config, client),
        }
    }
}

#[async_trait]
impl Phase for MetadataPhase {
    fn config(&self) -> &PhaseConfig {
        self.binding.config()
    }

    fn is_available(&self) -> bool {
        self.binding.is_available()
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError> {
        self.binding.extract(request).await
    }

    fn on_success(&self, context: &mut SharedContext, result: &PhaseResult) {
        let Some(payload) = &result.payload else {
            return;
        };
        let facts = &mut context.facts;
        set_text(&mut facts.study_title, payload.text_any(&["study_title", "title"]));
        set_text(&mut facts.study_id, payload.text_any(&["study_id", "protocol_id"]));
        set_text(&mut facts.sponsor, payload.text("sponsor"));
        set_text(&mut facts.indication, payload.text("indication"));
        set_text(&mut facts.study_phase, payload.text_any(&["study_phase", "phase"]));
        set_records(
            &mut facts.study_identifiers,
            payload.records("identifiers", "identifier"),
        );
    }

    fn combine(&self, result: &PhaseResult, record: &mut AssembledRecord) {
        let Some(payload) = &result.payload else {
            return;
        };
        let mut study = Map::new();
        for (key, candidates) in [
            ("name", &["study_title", "title"][..]),
            ("id", &["study_id", "protocol_id"][..]),
            ("sponsor", &["sponsor"][..]),
            ("indication", &["indication"][..]),
            ("phase", &["study_phase", "phase"][..]),
        ] {
            if let Some(value) = payload.text_any(candidates) {
                study.insert(key.to_string(), Value::String(value));
            }
        }
        if let Some(identifiers) = payload.get("identifiers") {
            study.insert("identifiers".to_string(), identifiers.clone());
        }
        record.extend_section("study", study);
    }
}
