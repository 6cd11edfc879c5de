//! Study design: arms, epochs and the arm x epoch cells

use super::{set_records, ClientBinding, DESIGN};
use crate::client::ExtractionClient;
use crate::context::SharedContext;
use crate::phase::{ExtractionRequest, Phase, PhaseConfig, PhaseError, PhaseOutput, PhaseResult};
use async_trait::async_trait;
use std::sync::Arc;

pub struct DesignPhase {
    binding: ClientBinding,
}

impl DesignPhase {
    pub fn new(client: Arc<dyn ExtractionClient>) -> Self {
        let config = PhaseConfig::new(DESIGN, "Study Design", 4)
            .with_output_file("05_study_design.json");
        Self {
            binding: ClientBinding::new(config, client),
        }
    }
}

#[async_trait]
impl Phase for DesignPhase {
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
        let design = &mut context.design;
        set_records(&mut design.arms, payload.records("arms", "arm"));
        set_records(&mut design.epochs, payload.records("epochs", "epoch"));

        let cells = match payload.records("study_cells", "study_cell") {
            cells if cells.is_empty() => payload.records("cells", "study_cell"),
            cells => cells,
        };
        set_records(&mut design.study_cells, cells);
    }
}
