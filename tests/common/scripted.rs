//! A phase whose behavior is scripted by the test

use async_trait::async_trait;
use protoflow::context::Record;
use protoflow::phase::{ExtractionRequest, PhaseOutput};
use protoflow::{Phase, PhaseConfig, PhaseError, PhasePayload, PhaseResult, SharedContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Writer = Arc<dyn Fn(&mut SharedContext) + Send + Sync>;

/// Tracks how many phases are inside `extract` at once
#[derive(Debug, Default, Clone)]
pub struct ConcurrencyProbe {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of concurrent extractions seen
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct ScriptedPhase {
    config: PhaseConfig,
    writer: Option<Writer>,
    delay: Duration,
    failure: Option<String>,
    available: bool,
    probe: Option<ConcurrencyProbe>,
}

impl ScriptedPhase {
    pub fn new(name: &str, order: u32) -> Self {
        Self {
            config: PhaseConfig::new(name, name, order),
            writer: None,
            delay: Duration::ZERO,
            failure: None,
            available: true,
            probe: None,
        }
    }

    /// Run `writer` against the context on success
    pub fn writes(mut self, writer: impl Fn(&mut SharedContext) + Send + Sync + 'static) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    /// Push one arm named `arm` on success
    pub fn writes_arm(self, arm: &'static str) -> Self {
        self.writes(move |context| {
            context
                .design
                .arms
                .push(Record::new(format!("arm_{}", arm), arm, "arm"));
        })
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, error: &str) -> Self {
        self.failure = Some(error.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.config = self.config.optional();
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn probed(mut self, probe: &ConcurrencyProbe) -> Self {
        self.probe = Some(probe.clone());
        self
    }
}

#[async_trait]
impl Phase for ScriptedPhase {
    fn config(&self) -> &PhaseConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn extract(&self, _request: &ExtractionRequest<'_>) -> Result<PhaseOutput, PhaseError> {
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        tokio::time::sleep(self.delay).await;
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        match &self.failure {
            Some(error) => Err(PhaseError::Extraction(error.clone())),
            None => Ok(PhaseOutput::new(
                PhasePayload::new().with("phase", self.config.name.clone()),
            )),
        }
    }

    fn on_success(&self, context: &mut SharedContext, _result: &PhaseResult) {
        if let Some(writer) = &self.writer {
            writer(context);
        }
    }
}
