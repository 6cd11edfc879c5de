//! End-to-end orchestrator behavior: closure, waves, merge-back and failure isolation

mod common;

use common::{
    builtin_orchestrator, client_for, delayed_client, full_client, names, ConcurrencyProbe,
    ScriptedPhase, ALL_PHASES,
};
use protoflow::context::Record;
use protoflow::{
    ContextField, ExecutionMode, JsonFileSink, OrchestratorError, PhaseOrchestrator,
    PhaseRegistry, PipelineConfig, RunRequest, SharedContext,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn request(phases: &[&str]) -> RunRequest {
    RunRequest::new("protocol.pdf", "test-model")
        .with_phases(phases.iter().copied())
        .with_upstream_artifact("soa.json")
}

/// Pipeline tables from `(phase, deps)` and `(phase, owned fields)` lists
fn config(
    deps: &[(&str, &[&str])],
    owned: &[(&str, &[ContextField])],
) -> PipelineConfig {
    PipelineConfig {
        dependencies: deps
            .iter()
            .map(|(p, d)| (p.to_string(), d.iter().map(|s| s.to_string()).collect()))
            .collect(),
        ownership: owned
            .iter()
            .map(|(p, f)| (p.to_string(), f.iter().copied().collect()))
            .collect(),
        ..PipelineConfig::builtin()
    }
}

fn scripted(phases: Vec<ScriptedPhase>, config: &PipelineConfig) -> PhaseOrchestrator {
    let mut registry = PhaseRegistry::new();
    for phase in phases {
        registry.register(phase);
    }
    PhaseOrchestrator::new(registry, config).unwrap()
}

/// Every subset of the built-in phases
fn all_requests() -> Vec<Vec<&'static str>> {
    (1u32..(1 << ALL_PHASES.len()))
        .map(|mask| {
            ALL_PHASES
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, name)| *name)
                .collect()
        })
        .collect()
}

// === Scenarios ===

#[tokio::test]
async fn single_independent_phase_runs_alone_in_either_mode() {
    let orchestrator = builtin_orchestrator(full_client());
    let request = request(&["design"]);

    let plan = orchestrator.plan(&request).unwrap();
    assert_eq!(plan.resolved, names(&["design"]));
    assert_eq!(plan.waves, vec![names(&["design"])]);

    let sequential = orchestrator.run(&request, None).await.unwrap();
    let parallel = orchestrator.run_parallel(&request, None, 4).await.unwrap();

    assert_eq!(sequential.mode, ExecutionMode::Sequential);
    assert_eq!(parallel.mode, ExecutionMode::Parallel);
    assert_eq!(sequential.context, parallel.context);
    assert_eq!(parallel.context.design.arms.len(), 3);
    assert_eq!(parallel.context.design.epochs.len(), 4);
}

#[tokio::test]
async fn dependencies_are_pulled_in_and_run_first() {
    let orchestrator = builtin_orchestrator(full_client());
    let outcome = orchestrator
        .run_parallel(&request(&["interventions"]), None, 4)
        .await
        .unwrap();

    assert_eq!(
        outcome.waves,
        vec![names(&["metadata", "design"]), names(&["interventions"])]
    );
    assert_eq!(
        outcome.results.keys().cloned().collect::<Vec<_>>(),
        names(&["design", "interventions", "metadata"])
    );
    assert!(outcome.all_succeeded());
}

#[tokio::test]
async fn interventions_see_upstream_context() {
    let client = Arc::new(full_client());
    let orchestrator = PhaseOrchestrator::new(
        protoflow::builtin::registry(client.clone()),
        &PipelineConfig::builtin(),
    )
    .unwrap();

    orchestrator
        .run_parallel(&request(&["interventions"]), None, 4)
        .await
        .unwrap();

    let call = client.last_call("interventions").unwrap();
    assert_eq!(
        call.hints.get("arms"),
        Some(&serde_json::json!(["Drug X 10 mg", "Drug X 20 mg", "Placebo"]))
    );
    assert_eq!(
        call.hints.get("indication"),
        Some(&serde_json::json!("Essential Hypertension"))
    );
}

#[tokio::test]
async fn unowned_snapshot_fields_are_not_merged() {
    let config = config(
        &[],
        &[
            ("x", &[ContextField::Arms]),
            ("y", &[ContextField::Epochs]),
        ],
    );
    let orchestrator = scripted(
        vec![
            ScriptedPhase::new("x", 1).writes(|context| {
                context.design.arms.push(Record::new("arm_1", "Active", "arm"));
                context.facts.sponsor = Some("Written by x".into());
            }),
            ScriptedPhase::new("y", 2).writes(|context| {
                context.design.epochs.push(Record::new("epoch_1", "Treatment", "epoch"));
            }),
        ],
        &config,
    );

    let mut start = SharedContext::new();
    start.facts.sponsor = Some("Acme Pharma".into());

    let outcome = orchestrator
        .run_parallel(&request(&["x", "y"]), Some(start), 2)
        .await
        .unwrap();

    assert_eq!(outcome.waves, vec![names(&["x", "y"])]);
    assert_eq!(outcome.context.facts.sponsor.as_deref(), Some("Acme Pharma"));
    assert_eq!(outcome.context.design.arms.names(), vec!["Active"]);
    assert_eq!(outcome.context.design.epochs.names(), vec!["Treatment"]);
}

#[tokio::test]
async fn panicking_phase_fails_alone() {
    let client = full_client().with_panic("design");
    let orchestrator = builtin_orchestrator(client);

    let outcome = orchestrator
        .run_parallel(&request(&["metadata", "design", "narrative"]), None, 3)
        .await
        .unwrap();

    assert_eq!(outcome.waves, vec![names(&["metadata", "design", "narrative"])]);
    let design = &outcome.results["design"];
    assert!(!design.success);
    assert!(design
        .error
        .as_deref()
        .unwrap()
        .contains("mock extraction panicked for phase 'design'"));

    assert_eq!(outcome.succeeded(), vec!["metadata", "narrative"]);
    assert!(outcome.context.design.arms.is_empty());
    assert_eq!(outcome.context.facts.sponsor.as_deref(), Some("Acme Pharma"));
    assert_eq!(outcome.context.narrative.abbreviations.len(), 2);
}

#[tokio::test]
async fn unknown_phase_is_dropped() {
    let orchestrator = builtin_orchestrator(full_client());
    let request = request(&["ghost", "metadata"]);

    assert_eq!(orchestrator.plan(&request).unwrap().resolved, names(&["metadata"]));

    let outcome = orchestrator.run(&request, None).await.unwrap();
    assert_eq!(outcome.results.keys().cloned().collect::<Vec<_>>(), names(&["metadata"]));
}

#[tokio::test]
async fn only_unknown_phases_is_an_error() {
    let orchestrator = builtin_orchestrator(full_client());
    let err = orchestrator.run(&request(&["ghost"]), None).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NoPhasesRequested));
}

// === Properties ===

#[test]
fn closure_is_complete_for_every_request() {
    let orchestrator = builtin_orchestrator(full_client());
    let deps = PipelineConfig::builtin().dependencies;

    for requested in all_requests() {
        let plan = orchestrator.plan(&request(&requested)).unwrap();
        let resolved: BTreeSet<&str> = plan.resolved.iter().map(String::as_str).collect();

        for phase in &resolved {
            for dep in deps.get(*phase).into_iter().flatten() {
                assert!(
                    resolved.contains(dep.as_str()),
                    "{:?}: {} needs {}",
                    requested,
                    phase,
                    dep
                );
            }
        }
        for phase in &requested {
            assert!(resolved.contains(phase));
        }
    }
}

#[test]
fn dependencies_always_land_in_earlier_waves() {
    let orchestrator = builtin_orchestrator(full_client());

    for requested in all_requests() {
        let plan = orchestrator.plan(&request(&requested)).unwrap();

        for (index, wave) in plan.waves.iter().enumerate() {
            for phase in wave {
                for dep in orchestrator.dependencies().deps_of(phase) {
                    if let Some(dep_wave) = plan.wave_of(dep) {
                        assert!(dep_wave < index, "{} runs with or before {}", phase, dep);
                    }
                }
            }
        }
        let planned: usize = plan.waves.iter().map(Vec::len).sum();
        assert_eq!(planned, plan.resolved.len());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merge_result_does_not_depend_on_finish_order() {
    let reference = builtin_orchestrator(full_client())
        .run(&request(&ALL_PHASES), None)
        .await
        .unwrap();
    assert!(reference.all_succeeded());

    let mut rng = rand::thread_rng();
    for _ in 0..8 {
        let mut order = ALL_PHASES.to_vec();
        order.shuffle(&mut rng);
        let delays: Vec<(&str, Duration)> = order
            .iter()
            .map(|name| (*name, Duration::from_millis(rng.gen_range(0..25))))
            .collect();

        let outcome = builtin_orchestrator(delayed_client(&delays))
            .run_parallel(&request(&ALL_PHASES), None, 4)
            .await
            .unwrap();

        assert_eq!(outcome.context, reference.context, "delays: {:?}", delays);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_writes_merge_in_registry_order() {
    // Both phases claim arms; the later one in registry order wins regardless of timing
    let config = config(
        &[],
        &[
            ("early", &[ContextField::Arms]),
            ("late", &[ContextField::Arms]),
        ],
    );

    for (early_delay, late_delay) in [(30, 0), (0, 30)] {
        let orchestrator = scripted(
            vec![
                ScriptedPhase::new("late", 2)
                    .delayed(Duration::from_millis(late_delay))
                    .writes_arm("Late"),
                ScriptedPhase::new("early", 1)
                    .delayed(Duration::from_millis(early_delay))
                    .writes_arm("Early"),
            ],
            &config,
        );
        let outcome = orchestrator
            .run_parallel(&request(&["early", "late"]), None, 2)
            .await
            .unwrap();

        assert_eq!(outcome.context.design.arms.names(), vec!["Late"]);
    }
}

#[tokio::test]
async fn failure_in_wave_leaves_siblings_untouched() {
    let orchestrator = builtin_orchestrator(full_client().with_failure("metadata", "no title page"));

    let outcome = orchestrator
        .run_parallel(&request(&["metadata", "design", "narrative"]), None, 4)
        .await
        .unwrap();

    let metadata = &outcome.results["metadata"];
    assert!(!metadata.success);
    assert!(metadata.payload.is_none());
    assert!(metadata.error.as_deref().unwrap().contains("no title page"));

    assert!(outcome.results["design"].success);
    assert!(outcome.results["narrative"].success);
    assert_eq!(outcome.context.design.arms.len(), 3);
    assert!(outcome.context.facts.study_title.is_none());
}

#[tokio::test]
async fn dependents_of_failed_phase_still_run() {
    let orchestrator = builtin_orchestrator(full_client().with_failure("design", "unreadable"));

    let outcome = orchestrator
        .run_parallel(&request(&["interventions"]), None, 4)
        .await
        .unwrap();

    assert_eq!(outcome.failed(), vec!["design"]);
    assert!(outcome.results["interventions"].success);
    assert_eq!(outcome.context.interventions.interventions.len(), 2);
}

#[tokio::test]
async fn extraction_error_in_scripted_wave_fails_alone() {
    let config = config(
        &[],
        &[
            ("x", &[ContextField::Arms]),
            ("y", &[ContextField::Epochs]),
        ],
    );
    let orchestrator = scripted(
        vec![
            ScriptedPhase::new("x", 1)
                .writes_arm("Active")
                .failing("no arms section"),
            ScriptedPhase::new("y", 2).writes(|context| {
                context.design.epochs.push(Record::new("epoch_1", "Treatment", "epoch"));
            }),
        ],
        &config,
    );
    let request = request(&["x", "y"]);

    let sequential = orchestrator.run(&request, None).await.unwrap();
    let parallel = orchestrator.run_parallel(&request, None, 2).await.unwrap();

    assert_eq!(parallel.waves, vec![names(&["x", "y"])]);
    assert_eq!(parallel.failed(), vec!["x"]);
    assert!(parallel.results["x"]
        .error
        .as_deref()
        .unwrap()
        .contains("no arms section"));
    assert!(parallel.context.design.arms.is_empty());
    assert_eq!(parallel.context.design.epochs.names(), vec!["Treatment"]);
    assert_eq!(sequential.context, parallel.context);
}

#[tokio::test]
async fn panicking_context_update_leaves_no_partial_writes() {
    let config = config(
        &[],
        &[
            ("x", &[ContextField::Arms]),
            ("y", &[ContextField::Epochs]),
        ],
    );
    let orchestrator = scripted(
        vec![
            ScriptedPhase::new("x", 1).writes(|context| {
                context.design.arms.push(Record::new("arm_1", "Half written", "arm"));
                panic!("update gave up midway");
            }),
            ScriptedPhase::new("y", 2).writes(|context| {
                context.design.epochs.push(Record::new("epoch_1", "Treatment", "epoch"));
            }),
        ],
        &config,
    );

    let both = request(&["x", "y"]);
    let sequential = orchestrator.run(&both, None).await.unwrap();
    let parallel = orchestrator.run_parallel(&both, None, 2).await.unwrap();

    for outcome in [&sequential, &parallel] {
        assert!(!outcome.results["x"].success);
        assert!(outcome.context.design.arms.is_empty());
        assert_eq!(outcome.context.design.epochs.names(), vec!["Treatment"]);
    }
    assert_eq!(sequential.context, parallel.context);

    // A single-phase wave runs against the live context
    let alone = orchestrator
        .run_parallel(&request(&["x"]), None, 2)
        .await
        .unwrap();
    assert!(!alone.results["x"].success);
    assert!(alone.context.design.arms.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_matches_sequential_for_every_request() {
    let orchestrator = builtin_orchestrator(full_client());

    for requested in all_requests() {
        let request = request(&requested);
        let sequential = orchestrator.run(&request, None).await.unwrap();
        let parallel = orchestrator.run_parallel(&request, None, 3).await.unwrap();

        assert_eq!(sequential.context, parallel.context, "{:?}", requested);
        assert_eq!(sequential.waves, parallel.waves);
        assert_eq!(
            sequential.succeeded(),
            parallel.succeeded(),
            "{:?}",
            requested
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn workers_are_bounded_per_wave() {
    let probe = ConcurrencyProbe::new();
    let phases: Vec<ScriptedPhase> = (0..6)
        .map(|i| {
            ScriptedPhase::new(&format!("p{}", i), i)
                .delayed(Duration::from_millis(20))
                .probed(&probe)
        })
        .collect();
    let owned: Vec<(String, &[ContextField])> =
        (0..6).map(|i| (format!("p{}", i), &[][..])).collect();
    let owned: Vec<(&str, &[ContextField])> =
        owned.iter().map(|(p, f)| (p.as_str(), *f)).collect();
    let orchestrator = scripted(phases, &config(&[], &owned));

    let all = ["p0", "p1", "p2", "p3", "p4", "p5"];
    let outcome = orchestrator.run_parallel(&request(&all), None, 2).await.unwrap();

    assert_eq!(outcome.waves.len(), 1);
    assert!(outcome.all_succeeded());
    assert!(probe.peak() <= 2, "peak was {}", probe.peak());
    assert!(probe.peak() >= 1);
}

// === Configuration and capability errors ===

#[tokio::test]
async fn unavailable_required_phase_aborts_before_any_wave() {
    let probe = ConcurrencyProbe::new();
    let config = config(&[("b", &["a"])], &[("a", &[]), ("b", &[])]);
    let orchestrator = scripted(
        vec![
            ScriptedPhase::new("a", 1).probed(&probe),
            ScriptedPhase::new("b", 2).unavailable(),
        ],
        &config,
    );

    let err = orchestrator.run_parallel(&request(&["b"]), None, 2).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::CapabilityUnavailable { ref phase } if phase == "b"));
    assert_eq!(probe.peak(), 0);
}

#[tokio::test]
async fn unavailable_optional_phase_is_reported_and_skipped() {
    let config = config(&[("b", &["a"])], &[("a", &[]), ("b", &[])]);
    let orchestrator = scripted(
        vec![
            ScriptedPhase::new("a", 1).unavailable().optional(),
            ScriptedPhase::new("b", 2).writes_arm("B"),
        ],
        &config,
    );

    let outcome = orchestrator.run(&request(&["b"]), None).await.unwrap();

    assert_eq!(outcome.waves, vec![names(&["b"])]);
    assert_eq!(outcome.failed(), vec!["a"]);
    assert!(outcome.results["a"]
        .error
        .as_deref()
        .unwrap()
        .starts_with("capability unavailable"));
    assert!(outcome.results["b"].success);
}

#[tokio::test]
async fn scheduling_needs_upstream_artifact() {
    let orchestrator = builtin_orchestrator(full_client());
    let without = RunRequest::new("protocol.pdf", "m").with_phases(["scheduling"]);

    let outcome = orchestrator.run(&without, None).await.unwrap();
    assert!(outcome.results["design"].success);
    let scheduling = &outcome.results["scheduling"];
    assert!(!scheduling.success);
    assert!(scheduling.error.as_deref().unwrap().contains("upstream artifact"));

    let outcome = orchestrator.run(&request(&["scheduling"]), None).await.unwrap();
    assert!(outcome.results["scheduling"].success);
    assert_eq!(outcome.context.schedule.encounters.len(), 3);
}

#[test]
fn cyclic_dependency_table_is_rejected() {
    let config = config(&[("a", &["b"]), ("b", &["a"])], &[("a", &[])]);
    let err = PhaseOrchestrator::new(PhaseRegistry::new(), &config).unwrap_err();
    assert!(matches!(err, OrchestratorError::DependencyCycle(_)));
}

// === Persistence and resumption ===

#[tokio::test]
async fn artifacts_are_written_for_successful_phases() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = builtin_orchestrator(client_for(&["metadata", "design"]).with_failure("design", "x"))
        .with_sink(Arc::new(JsonFileSink::new(dir.path())));

    orchestrator
        .run_parallel(&request(&["metadata", "design"]), None, 2)
        .await
        .unwrap();

    assert!(dir.path().join("02_study_metadata.json").is_file());
    assert!(!dir.path().join("05_study_design.json").exists());
}

#[tokio::test]
async fn context_round_trips_between_runs() {
    let orchestrator = builtin_orchestrator(full_client());
    let first = orchestrator.run(&request(&["design"]), None).await.unwrap();

    let saved = first.context.to_json().unwrap();
    let resumed = SharedContext::from_json(&saved).unwrap();

    let second = orchestrator
        .run_parallel(&request(&["narrative"]), Some(resumed), 2)
        .await
        .unwrap();

    assert_eq!(second.context.design, first.context.design);
    assert_eq!(second.context.narrative.narrative_sections.len(), 2);
}

#[tokio::test]
async fn assembled_record_has_a_section_per_successful_phase() {
    let orchestrator = builtin_orchestrator(full_client().with_failure("objectives", "x"));
    let outcome = orchestrator.run(&request(&ALL_PHASES), None).await.unwrap();
    let record = orchestrator.assemble(&outcome);

    let sections: BTreeSet<&str> = record.section_names().into_iter().collect();
    assert!(sections.contains("study"));
    assert!(sections.contains("schedule_of_activities"));
    assert!(!sections.contains("objectives"));
    assert_eq!(sections.len(), 6);
}
