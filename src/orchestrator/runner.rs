//! Phase orchestrator: sequential and wave-parallel execution

use super::dependency::{build_waves, DependencyMap};
use super::execute::execute_phase;
use super::ownership::OwnershipMap;
use super::types::{ExecutionMode, OrchestratorError, RunOutcome, RunPlan, RunRequest};
use crate::config::PipelineConfig;
use crate::context::SharedContext;
use crate::phase::{AssembledRecord, Phase, PhaseError, PhaseRegistry, PhaseResult};
use crate::sink::{ArtifactSink, NullSink};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::Instrument;
use uuid::Uuid;

/// Runs requested phases in dependency order against a shared context
pub struct PhaseOrchestrator {
    registry: PhaseRegistry,
    dependencies: Arc<DependencyMap>,
    ownership: Arc<OwnershipMap>,
    sink: Arc<dyn ArtifactSink>,
}

/// Executable waves plus results already decided before execution
struct Prepared {
    waves: Vec<Vec<String>>,
    results: BTreeMap<String, PhaseResult>,
}

impl PhaseOrchestrator {
    /// Build an orchestrator from a registry and the pipeline tables.
    ///
    /// Fails when both tables are empty or the dependency table has a cycle.
    pub fn new(registry: PhaseRegistry, config: &PipelineConfig) -> Result<Self, OrchestratorError> {
        if config.dependencies.is_empty() && config.ownership.is_empty() {
            return Err(OrchestratorError::MissingConfiguration(
                "neither a dependency nor an ownership table was given".to_string(),
            ));
        }

        let dependencies = DependencyMap::new(config.dependencies.clone());
        dependencies.validate()?;

        Ok(Self {
            registry,
            dependencies: Arc::new(dependencies),
            ownership: Arc::new(OwnershipMap::new(config.ownership.clone())),
            sink: Arc::new(NullSink),
        })
    }

    /// Persist successful results through `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    pub fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }

    pub fn ownership(&self) -> &OwnershipMap {
        &self.ownership
    }

    /// Resolve the request's dependency closure and split it into waves
    pub fn plan(&self, request: &RunRequest) -> Result<RunPlan, OrchestratorError> {
        let resolved = self
            .dependencies
            .resolve_closure(&request.requested(), &self.registry);
        if resolved.is_empty() {
            return Err(OrchestratorError::NoPhasesRequested);
        }
        let waves = build_waves(&resolved, &self.dependencies);
        Ok(RunPlan { resolved, waves })
    }

    /// Check capabilities before any wave starts.
    ///
    /// A required phase that can't run aborts the run. An optional one gets a
    /// failed result and is taken out of the waves.
    fn prepare(&self, plan: RunPlan) -> Result<Prepared, OrchestratorError> {
        let mut results = BTreeMap::new();
        let mut skipped = BTreeSet::new();

        for name in &plan.resolved {
            let Some(phase) = self.registry.get(name) else {
                continue;
            };
            if phase.is_available() {
                continue;
            }
            if !phase.config().optional {
                return Err(OrchestratorError::CapabilityUnavailable {
                    phase: name.clone(),
                });
            }
            tracing::warn!(phase = %name, "capability unavailable, skipping optional phase");
            let error = PhaseError::Unavailable(name.clone());
            results.insert(name.clone(), PhaseResult::failure(name, error.to_string(), 0));
            skipped.insert(name.clone());
        }

        let waves = plan
            .waves
            .into_iter()
            .map(|wave| {
                wave.into_iter()
                    .filter(|name| !skipped.contains(name))
                    .collect::<Vec<_>>()
            })
            .filter(|wave| !wave.is_empty())
            .collect();

        Ok(Prepared { waves, results })
    }

    /// Run every wave one phase at a time against the live context.
    ///
    /// This is the reference behavior parallel runs must match.
    pub async fn run(
        &self,
        request: &RunRequest,
        context: Option<SharedContext>,
    ) -> Result<RunOutcome, OrchestratorError> {
        let plan = self.plan(request)?;
        let Prepared { waves, mut results } = self.prepare(plan)?;
        let mut context = context.unwrap_or_default();
        let run_id = Uuid::new_v4();

        let span = tracing::info_span!("run", %run_id, mode = %ExecutionMode::Sequential);
        async {
            tracing::info!(
                document = %request.document.label(),
                waves = waves.len(),
                "starting run"
            );
            for (index, wave) in waves.iter().enumerate() {
                tracing::info!(wave = index + 1, phases = ?wave, "running wave");
                for name in wave {
                    let Some(phase) = self.registry.get(name) else {
                        continue;
                    };
                    let result =
                        execute_phase(phase.as_ref(), request, &mut context, self.sink.as_ref())
                            .await;
                    results.insert(name.clone(), result);
                }
            }
        }
        .instrument(span)
        .await;

        Ok(self.finish(run_id, ExecutionMode::Sequential, waves, results, context))
    }

    /// Run waves concurrently, each phase of a multi-phase wave against its own
    /// snapshot, then merge snapshots back by ownership in registry order.
    ///
    /// At most `max_workers` phases of one wave run at the same time.
    pub async fn run_parallel(
        &self,
        request: &RunRequest,
        context: Option<SharedContext>,
        max_workers: usize,
    ) -> Result<RunOutcome, OrchestratorError> {
        if self.ownership.is_empty() {
            return Err(OrchestratorError::MissingConfiguration(
                "parallel runs need an ownership table".to_string(),
            ));
        }

        let plan = self.plan(request)?;
        let Prepared { waves, mut results } = self.prepare(plan)?;
        let live = Mutex::new(context.unwrap_or_default());
        let shared_request = Arc::new(request.clone());
        let run_id = Uuid::new_v4();

        let span = tracing::info_span!("run", %run_id, mode = %ExecutionMode::Parallel);
        async {
            tracing::info!(
                document = %request.document.label(),
                waves = waves.len(),
                max_workers,
                "starting run"
            );
            for (index, wave) in waves.iter().enumerate() {
                tracing::info!(wave = index + 1, phases = ?wave, "running wave");
                let wave_results = if wave.len() == 1 {
                    self.run_single(&wave[0], request, &live).await
                } else {
                    self.run_wave(wave, &shared_request, &live, max_workers).await
                };
                results.extend(wave_results);
            }
        }
        .instrument(span)
        .await;

        let context = live.into_inner();
        Ok(self.finish(run_id, ExecutionMode::Parallel, waves, results, context))
    }

    /// A lone phase runs directly against the live context
    async fn run_single(
        &self,
        name: &str,
        request: &RunRequest,
        live: &Mutex<SharedContext>,
    ) -> Vec<(String, PhaseResult)> {
        let Some(phase) = self.registry.get(name) else {
            return Vec::new();
        };
        let mut context = live.lock().await;
        let result = execute_phase(phase.as_ref(), request, &mut context, self.sink.as_ref()).await;
        vec![(name.to_string(), result)]
    }

    async fn run_wave(
        &self,
        wave: &[String],
        request: &Arc<RunRequest>,
        live: &Mutex<SharedContext>,
        max_workers: usize,
    ) -> Vec<(String, PhaseResult)> {
        let phases: Vec<Arc<dyn Phase>> = wave
            .iter()
            .filter_map(|name| self.registry.get(name).cloned())
            .collect();
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1).min(phases.len())));

        let snapshots: Vec<SharedContext> = {
            let context = live.lock().await;
            phases.iter().map(|_| context.snapshot()).collect()
        };

        let mut handles = Vec::with_capacity(phases.len());
        for (phase, mut snapshot) in phases.into_iter().zip(snapshots) {
            let name = phase.name().to_string();
            let semaphore = semaphore.clone();
            let request = request.clone();
            let sink = self.sink.clone();

            let handle = tokio::spawn(
                async move {
                    // Held until the phase finishes
                    let _permit = semaphore.acquire_owned().await.ok();
                    let result =
                        execute_phase(phase.as_ref(), &request, &mut snapshot, sink.as_ref()).await;
                    (result, snapshot)
                }
                .in_current_span(),
            );
            handles.push((name, handle));
        }

        let mut finished = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok((result, snapshot)) => finished.push((name, result, Some(snapshot))),
                Err(e) => {
                    tracing::error!(phase = %name, error = %e, "worker failed");
                    let result = PhaseResult::failure(&name, format!("worker failed: {}", e), 0);
                    finished.push((name, result, None));
                }
            }
        }

        finished.sort_by_key(|(name, _, _)| self.registry.position(name).unwrap_or(usize::MAX));
        {
            let mut context = live.lock().await;
            for (name, result, snapshot) in &finished {
                if let (true, Some(snapshot)) = (result.success, snapshot) {
                    self.ownership.merge_owned(&mut context, snapshot, name);
                }
            }
        }

        finished
            .into_iter()
            .map(|(name, result, _)| (name, result))
            .collect()
    }

    fn finish(
        &self,
        run_id: Uuid,
        mode: ExecutionMode,
        waves: Vec<Vec<String>>,
        results: BTreeMap<String, PhaseResult>,
        context: SharedContext,
    ) -> RunOutcome {
        let outcome = RunOutcome {
            run_id,
            mode,
            waves,
            results,
            context,
        };
        tracing::info!(
            %run_id,
            %mode,
            succeeded = outcome.succeeded().len(),
            failed = outcome.failed().len(),
            "run finished"
        );
        outcome
    }

    /// Fold every successful result into one record, in registry order
    pub fn assemble(&self, outcome: &RunOutcome) -> AssembledRecord {
        let mut record = AssembledRecord::new();
        for phase in self.registry.phases() {
            if let Some(result) = outcome.results.get(phase.name()) {
                if result.success {
                    phase.combine(result, &mut record);
                }
            }
        }
        record
    }
}

impl std::fmt::Debug for PhaseOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseOrchestrator")
            .field("registry", &self.registry)
            .field("dependencies", &self.dependencies)
            .field("ownership", &self.ownership)
            .finish_non_exhaustive()
    }
}
