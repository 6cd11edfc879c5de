//! Schedule of activities: encounters, activities, timings
//!
//! Runs on top of a bulk table extraction produced upstream, so it needs the
//! upstream artifact.

use super::{name_hint, set_records, ClientBinding, SCHEDULING};
use crate::client::ExtractionClient;
use crate::context::SharedContext;
use crate::phase::{
    AssembledRecord, ContextHints, ExtractionRequest, Phase, PhaseConfig, PhaseError, PhaseOutput,
    PhaseResult,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct SchedulingPhase {
    binding: ClientBinding,
}

impl SchedulingPhase {
    pub fn new(client: Arc<dyn ExtractionClient>) -> Self {
        let config = PhaseConfig::new(SCHEDULING, "Schedule of Activities", 6)
            .optional()
            .requires_upstream_artifact()
            .with_output_file("07_schedule_of_activities.json");
        Self {
            binding: ClientBinding::new(config, client),
        }
    }
}

#[async_trait]
impl Phase for SchedulingPhase {
    fn config(&self) -> &PhaseConfig {
        self.binding.config()
    }

    fn is_available(&self) -> bool {
        self.binding.is_available()
    }

    fn context_requirements(&self, context: &SharedContext) -> ContextHints {
        let mut hints = ContextHints::new();
        name_hint(&mut hints, "epochs", &context.design.epochs);
        name_hint(&mut hints, "arms", &context.design.arms);
        hints
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError> {
        self.binding.extract(request).await
    }

    fn on_success(&self, context: &mut SharedContext, result: &PhaseResult) {
        let Some(payload) = &result.payload else {
            return;
        };
        let schedule = &mut context.schedule;
        set_records(&mut schedule.encounters, payload.records("encounters", "encounter"));
        set_records(&mut schedule.activities, payload.records("activities", "activity"));
        set_records(&mut schedule.timings, payload.records("timings", "timing"));
    }

    fn combine(&self, result: &PhaseResult, record: &mut AssembledRecord) {
        if let Some(payload) = &result.payload {
            record.insert_section("schedule_of_activities", payload.as_value());
        }
    }
}
