//! End-to-end build scenarios.

use super::*;
use crate::actions::ActionOutcome;
use crate::core::StepStatus;
use crate::errors::RetriggerError;
use crate::events::CollectingEventSink;
use crate::pipeline::PipelineBuilder;
use crate::state::RetryConfig;
use crate::testing::{
    assert_all_pending, assert_step_status, wait_for_status, wait_for_trigger,
    FlakyBuildStateStore, GatedAction, MockAction, PanickingAction,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn path(s: &str) -> StepPath {
    s.parse().unwrap()
}

fn no_parameters() -> std::iter::Empty<(&'static str, &'static str)> {
    std::iter::empty()
}

#[tokio::test]
async fn test_release_pipeline_runs_to_manual_deploy() {
    let build_step = Arc::new(GatedAction::new());
    let unit = Arc::new(MockAction::succeeding("unit ok"));
    let integration = Arc::new(MockAction::succeeding("integration ok"));
    let deploy = Arc::new(MockAction::succeeding("deployed"));
    let events = Arc::new(CollectingEventSink::new());

    let tree = PipelineBuilder::new("root")
        .action("build", build_step.clone())
        .parallel("tests", |p| {
            p.action("unit", unit.clone())
                .action("integration", integration.clone())
        })
        .manual("deploy", no_parameters(), deploy.clone())
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree).with_event_sink(events.clone()));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();

    let seeded = engine.state(&id).await.unwrap();
    let keys: Vec<String> = seeded.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["(1)", "(2)", "(2 1)", "(2 2)", "(3)"]);
    assert_all_pending(&seeded, &["(2)", "(2 1)", "(2 2)", "(3)"]);

    build_step.wait_started(1, WAIT).await;
    assert_step_status(&engine.state(&id).await.unwrap(), "(1)", StepStatus::Running);
    build_step.release(1);

    let trigger_id = wait_for_trigger(&engine, &id, "(3)", WAIT).await;
    let snapshot = engine.state(&id).await.unwrap();
    for done in ["(1)", "(2)", "(2 1)", "(2 2)"] {
        assert_step_status(&snapshot, done, StepStatus::Success);
    }
    assert_eq!(snapshot[&path("(2 2)")].output, "integration ok");

    let rendered = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(rendered["(3)"]["status"], json!("awaiting_trigger"));
    assert_eq!(rendered["(3)"]["trigger-id"], json!(trigger_id.as_str()));
    assert_eq!(deploy.call_count(), 0);

    engine.fire_trigger(&trigger_id, Parameters::new()).unwrap();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Success);

    let finished = engine.step_state(&id, &path("(3)")).await.unwrap();
    assert_eq!(finished.status, StepStatus::Success);
    assert_eq!(finished.output, "deployed");
    assert_eq!(finished.trigger_id, None);

    let types = events.event_types();
    assert_eq!(types.first().map(String::as_str), Some(names::BUILD_STARTED));
    assert_eq!(types.last().map(String::as_str), Some(names::BUILD_COMPLETED));
    assert_eq!(events.events_of_type(names::STEP_AWAITING_TRIGGER).len(), 1);
    assert_eq!(events.events_of_type(names::STEP_TRIGGERED).len(), 1);
}

#[tokio::test]
async fn test_sequence_failure_leaves_later_siblings_pending() {
    let a = Arc::new(MockAction::failing("compile error"));
    let b = Arc::new(MockAction::succeeding("never"));

    let tree = PipelineBuilder::new("root")
        .sequence("stage", |s| s.action("a", a.clone()).action("b", b.clone()))
        .action("after", b.clone())
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Failure);

    let snapshot = engine.state(&id).await.unwrap();
    assert_step_status(&snapshot, "(1)", StepStatus::Failure);
    assert_step_status(&snapshot, "(1 1)", StepStatus::Failure);
    assert_eq!(snapshot[&path("(1 1)")].output, "compile error");
    assert_all_pending(&snapshot, &["(1 2)", "(2)"]);
    assert_eq!(b.call_count(), 0);
}

#[tokio::test]
async fn test_parallel_failure_does_not_abort_siblings() {
    let a = Arc::new(MockAction::failing("boom"));
    let b = Arc::new(GatedAction::new());

    let tree = PipelineBuilder::new("root")
        .parallel("tests", |p| p.action("a", a.clone()).action("b", b.clone()))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();

    b.wait_started(1, WAIT).await;
    wait_for_status(&engine, &id, "(1)", StepStatus::Failure, WAIT).await;
    assert_step_status(&engine.state(&id).await.unwrap(), "(1 2)", StepStatus::Running);

    b.release(1);
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Failure);

    let snapshot = engine.state(&id).await.unwrap();
    assert_step_status(&snapshot, "(1)", StepStatus::Failure);
    assert_step_status(&snapshot, "(1 1)", StepStatus::Failure);
    assert_step_status(&snapshot, "(1 2)", StepStatus::Success);
}

#[tokio::test]
async fn test_manual_step_waits_for_valid_fire() {
    let deploy = Arc::new(MockAction::succeeding("ok"));
    let tree = PipelineBuilder::new("root")
        .manual("deploy", [("env", "target environment")], deploy.clone())
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    let trigger_id = wait_for_trigger(&engine, &id, "(1)", WAIT).await;

    let waiting = engine.step_state(&id, &path("(1)")).await.unwrap();
    let schema = waiting.parameters.unwrap();
    assert_eq!(schema["env"].description, "target environment");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_step_status(&engine.state(&id).await.unwrap(), "(1)", StepStatus::AwaitingTrigger);

    let err = engine.fire_trigger(&trigger_id, Parameters::new()).unwrap_err();
    assert!(matches!(err, TriggerError::ParameterMismatch { .. }));
    assert_step_status(&engine.state(&id).await.unwrap(), "(1)", StepStatus::AwaitingTrigger);
    assert_eq!(deploy.call_count(), 0);

    let mut parameters = Parameters::new();
    parameters.insert("env".to_string(), json!("prod"));
    let registration = engine.fire_trigger(&trigger_id, parameters).unwrap();
    assert_eq!(registration.path, path("(1)"));
    assert_eq!(registration.build_id, id);

    assert_eq!(handle.wait().await.unwrap(), StepStatus::Success);
    assert_eq!(deploy.recorded_parameters()[0]["env"], json!("prod"));

    assert_eq!(
        engine.fire_trigger(&trigger_id, Parameters::new()),
        Err(TriggerError::UnknownTrigger(trigger_id.clone()))
    );
}

fn retrigger_engine(build: Arc<MockAction>) -> Arc<Engine> {
    let other = Arc::new(MockAction::succeeding("fine"));
    let tree = PipelineBuilder::new("root")
        .action("build", build)
        .parallel("tests", |p| p.action("unit", other.clone()).action("lint", other.clone()))
        .action("package", other.clone())
        .build()
        .unwrap();
    Arc::new(Engine::in_memory(tree))
}

#[tokio::test]
async fn test_retrigger_build_42_overwrites_only_that_step() {
    let build = Arc::new(MockAction::succeeding("first"));
    let engine = retrigger_engine(build.clone());
    let id = BuildId::from("42");

    let handle = engine.start_build_with_id(id.clone()).await.unwrap();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Success);
    let before = engine.state(&id).await.unwrap();

    build.set_outcome(ActionOutcome::success("second"));
    let retrigger = engine.retrigger(&id, "1").await.unwrap();
    assert_eq!(retrigger.path(), &path("(1)"));
    assert_eq!(retrigger.wait().await.unwrap(), StepStatus::Success);

    let after = engine.state(&id).await.unwrap();
    assert_eq!(after[&path("(1)")].output, "second");
    for (step, result) in &before {
        if step != &path("(1)") {
            assert_eq!(&after[step], result, "step {step} changed");
        }
    }
    assert_eq!(build.call_count(), 2);
}

#[tokio::test]
async fn test_retrigger_rejects_nested_and_container_steps() {
    let engine = retrigger_engine(Arc::new(MockAction::succeeding("ok")));

    assert!(matches!(
        engine.retrigger(&BuildId::from("missing"), "(2 1)").await,
        Err(RetriggerError::UnsupportedNesting(_))
    ));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    handle.wait().await.unwrap();
    let before = engine.state(&id).await.unwrap();

    assert!(matches!(
        engine.retrigger(&id, "(2 1)").await,
        Err(RetriggerError::UnsupportedNesting(_))
    ));
    assert!(matches!(
        engine.retrigger(&id, "2").await,
        Err(RetriggerError::UnsupportedNesting(_))
    ));
    assert!(matches!(
        engine.retrigger(&id, "9").await,
        Err(RetriggerError::InvalidPath(_))
    ));
    assert!(matches!(
        engine.retrigger(&BuildId::from("missing"), "1").await,
        Err(RetriggerError::UnknownBuild(_))
    ));

    assert_eq!(engine.state(&id).await.unwrap(), before);
}

#[tokio::test]
async fn test_retrigger_refused_while_build_waits() {
    let build = Arc::new(MockAction::succeeding("built"));
    let tree = PipelineBuilder::new("root")
        .action("build", build.clone())
        .manual("approve", no_parameters(), Arc::new(MockAction::succeeding("approved")))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    let trigger_id = wait_for_trigger(&engine, &id, "(2)", WAIT).await;
    let before = engine.state(&id).await.unwrap();

    assert!(matches!(
        engine.retrigger(&id, "1").await,
        Err(RetriggerError::BuildNotFinished(_))
    ));
    assert_eq!(engine.state(&id).await.unwrap(), before);
    assert_eq!(engine.activity(&id), Some(Activity::Walk));

    engine.fire_trigger(&trigger_id, Parameters::new()).unwrap();
    handle.wait().await.unwrap();

    engine.retrigger(&id, "1").await.unwrap().wait().await.unwrap();
    assert_eq!(build.call_count(), 2);
}

#[tokio::test]
async fn test_overlapping_retriggers_are_refused() {
    let gate = Arc::new(GatedAction::new());
    let tree = PipelineBuilder::new("root")
        .action("slow", gate.clone())
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    gate.release(1);
    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    handle.wait().await.unwrap();

    let first = engine.retrigger(&id, "1").await.unwrap();
    gate.wait_started(2, WAIT).await;
    assert_step_status(&engine.state(&id).await.unwrap(), "(1)", StepStatus::Running);
    assert!(matches!(
        engine.retrigger(&id, "1").await,
        Err(RetriggerError::BuildNotFinished(_))
    ));

    gate.release(1);
    assert_eq!(first.wait().await.unwrap(), StepStatus::Success);
}

#[tokio::test]
async fn test_retrigger_failed_step_after_sequence_abort() {
    let flaky = Arc::new(MockAction::failing("red"));
    let tree = PipelineBuilder::new("root")
        .action("build", flaky.clone())
        .action("publish", Arc::new(MockAction::succeeding("published")))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Failure);

    flaky.set_outcome(ActionOutcome::success("green"));
    engine.retrigger(&id, "1").await.unwrap().wait().await.unwrap();

    let snapshot = engine.state(&id).await.unwrap();
    assert_step_status(&snapshot, "(1)", StepStatus::Success);
    assert_step_status(&snapshot, "(2)", StepStatus::Pending);
}

#[tokio::test]
async fn test_trigger_expiry_fails_step() {
    let events = Arc::new(CollectingEventSink::new());
    let tree = PipelineBuilder::new("root")
        .manual("approve", no_parameters(), Arc::new(MockAction::succeeding("approved")))
        .action("after", Arc::new(MockAction::succeeding("never")))
        .build()
        .unwrap();
    let engine = Arc::new(
        Engine::in_memory(tree)
            .with_config(EngineConfig::new().with_trigger_timeout(0.05))
            .with_event_sink(events.clone()),
    );

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Failure);

    let snapshot = engine.state(&id).await.unwrap();
    assert_step_status(&snapshot, "(1)", StepStatus::Failure);
    assert_eq!(snapshot[&path("(1)")].output, TRIGGER_EXPIRED_OUTPUT);
    assert_step_status(&snapshot, "(2)", StepStatus::Pending);
    assert!(engine.triggers().is_empty());
    assert_eq!(events.events_of_type(names::TRIGGER_EXPIRED).len(), 1);
}

#[tokio::test]
async fn test_unrepresentable_trigger_timeout_waits_for_fire() {
    let tree = PipelineBuilder::new("root")
        .manual("approve", no_parameters(), Arc::new(MockAction::succeeding("approved")))
        .build()
        .unwrap();
    let engine = Arc::new(
        Engine::in_memory(tree).with_config(EngineConfig::new().with_trigger_timeout(1e30)),
    );

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    let trigger_id = wait_for_trigger(&engine, &id, "(1)", WAIT).await;

    engine.fire_trigger(&trigger_id, Parameters::new()).unwrap();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Success);
    assert_step_status(&engine.state(&id).await.unwrap(), "(1)", StepStatus::Success);
}

#[tokio::test]
async fn test_panicking_action_is_recorded_as_failure() {
    let tree = PipelineBuilder::new("root")
        .action("boom", Arc::new(PanickingAction))
        .action("after", Arc::new(MockAction::succeeding("never")))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Failure);

    let failed = engine.step_state(&id, &path("(1)")).await.unwrap();
    assert_eq!(failed.status, StepStatus::Failure);
    assert_eq!(failed.output, "action panicked: boom blew up");
}

#[tokio::test]
async fn test_action_concurrency_limit() {
    let gate = Arc::new(GatedAction::new());
    gate.release(3);
    let tree = PipelineBuilder::new("root")
        .parallel("fan", |p| {
            p.action("a", gate.clone())
                .action("b", gate.clone())
                .action("c", gate.clone())
        })
        .build()
        .unwrap();
    let engine = Arc::new(
        Engine::in_memory(tree).with_config(EngineConfig::new().with_max_concurrent_actions(1)),
    );

    let handle = engine.start_build().await.unwrap();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Success);
    assert_eq!(gate.started(), 3);
    assert_eq!(gate.max_running(), 1);
}

#[tokio::test]
async fn test_transient_store_failures_are_retried() {
    let store = Arc::new(FlakyBuildStateStore::failing(2));
    let tree = PipelineBuilder::new("root")
        .action("build", Arc::new(MockAction::succeeding("ok")))
        .build()
        .unwrap();
    let engine = Arc::new(
        Engine::new(tree, store.clone())
            .with_config(EngineConfig::new().with_store_retry(RetryConfig::new().with_base_delay_ms(1))),
    );

    let handle = engine.start_build().await.unwrap();
    assert_eq!(handle.wait().await.unwrap(), StepStatus::Success);
    assert_eq!(store.failed_writes(), 2);
}

#[tokio::test]
async fn test_exhausted_store_retries_are_surfaced() {
    let store = Arc::new(FlakyBuildStateStore::failing(10));
    let tree = PipelineBuilder::new("root")
        .action("build", Arc::new(MockAction::succeeding("ok")))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::new(tree, store).with_config(
        EngineConfig::new().with_store_retry(
            RetryConfig::new().with_max_attempts(2).with_base_delay_ms(1),
        ),
    ));

    let err = engine.start_build().await.unwrap_err();
    assert!(matches!(err, StepwiseError::Store(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn test_discarded_build_abandons_its_triggers() {
    let tree = PipelineBuilder::new("root")
        .manual("approve", no_parameters(), Arc::new(MockAction::succeeding("approved")))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    let trigger_id = wait_for_trigger(&engine, &id, "(1)", WAIT).await;

    assert!(engine.discard_build(&id).await.unwrap());
    assert!(matches!(
        handle.wait().await,
        Err(StepwiseError::BuildAbandoned(_))
    ));
    assert!(matches!(
        engine.fire_trigger(&trigger_id, Parameters::new()),
        Err(TriggerError::UnknownTrigger(_))
    ));
    assert!(matches!(
        engine.state(&id).await,
        Err(StepwiseError::UnknownBuild(_))
    ));
    assert!(!engine.discard_build(&id).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_builds_are_independent() {
    let tree = PipelineBuilder::new("root")
        .manual("approve", no_parameters(), Arc::new(MockAction::succeeding("approved")))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::in_memory(tree));

    let first = engine.start_build().await.unwrap();
    let second = engine.start_build().await.unwrap();
    let first_id = first.build_id().clone();
    let second_id = second.build_id().clone();
    assert_ne!(first_id, second_id);

    wait_for_trigger(&engine, &first_id, "(1)", WAIT).await;
    let trigger_id = wait_for_trigger(&engine, &second_id, "(1)", WAIT).await;

    engine.fire_trigger(&trigger_id, Parameters::new()).unwrap();
    assert_eq!(second.wait().await.unwrap(), StepStatus::Success);

    assert_step_status(
        &engine.state(&first_id).await.unwrap(),
        "(1)",
        StepStatus::AwaitingTrigger,
    );
    assert!(!first.is_finished());
}

#[tokio::test]
async fn test_builds_list_most_recent_first() {
    let tree = PipelineBuilder::new("root")
        .action("build", Arc::new(MockAction::succeeding("ok")))
        .build()
        .unwrap();
    let engine = Arc::new(
        Engine::in_memory(tree).with_build_ids(BuildIdGenerator::starting_after(8)),
    );

    for _ in 0..2 {
        engine.start_build().await.unwrap().wait().await.unwrap();
    }

    assert_eq!(
        engine.list_builds().await.unwrap(),
        vec![BuildId::from("10"), BuildId::from("9")]
    );
    assert_eq!(engine.latest_build().await.unwrap(), Some(BuildId::from("10")));
    assert_eq!(engine.all_states().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_build_ids_resume_after_existing_builds() {
    let store = Arc::new(InMemoryBuildStateStore::new());
    store
        .create_build(&BuildId::from("5"), &[path("(1)")])
        .await
        .unwrap();

    let tree = PipelineBuilder::new("root")
        .action("build", Arc::new(MockAction::succeeding("ok")))
        .build()
        .unwrap();
    let engine = Arc::new(Engine::new(tree, store).resume_build_ids().await.unwrap());

    let handle = engine.start_build().await.unwrap();
    assert_eq!(handle.build_id(), &BuildId::from("6"));
}

#[tokio::test]
async fn test_illegal_transition_is_not_written() {
    let tree = PipelineBuilder::new("root")
        .action("build", Arc::new(MockAction::succeeding("ok")))
        .build()
        .unwrap();
    let store = Arc::new(InMemoryBuildStateStore::new());
    let id = BuildId::from("1");
    store.create_build(&id, &[path("(1)")]).await.unwrap();
    let engine = Engine::new(tree, store);

    let skipped = engine
        .transition(&id, &path("(1)"), StepStatus::Pending, StepResult::pending().succeeded("x"))
        .await;
    assert!(matches!(skipped, Err(StepwiseError::Internal(_))));
    assert_step_status(&engine.state(&id).await.unwrap(), "(1)", StepStatus::Pending);

    engine
        .transition(&id, &path("(1)"), StepStatus::Pending, StepResult::running())
        .await
        .unwrap();
    assert_step_status(&engine.state(&id).await.unwrap(), "(1)", StepStatus::Running);
}

/// Holds `remove_build` until released so a walk can move while a discard
/// is in progress.
#[derive(Debug)]
struct HeldRemovalStore {
    inner: InMemoryBuildStateStore,
    removing: AtomicBool,
    release: Semaphore,
}

impl HeldRemovalStore {
    fn new() -> Self {
        Self {
            inner: InMemoryBuildStateStore::new(),
            removing: AtomicBool::new(false),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl BuildStateStore for HeldRemovalStore {
    async fn create_build(&self, build_id: &BuildId, paths: &[StepPath]) -> Result<(), StoreError> {
        self.inner.create_build(build_id, paths).await
    }

    async fn get(&self, build_id: &BuildId) -> Result<BuildSnapshot, StoreError> {
        self.inner.get(build_id).await
    }

    async fn get_step(&self, build_id: &BuildId, path: &StepPath) -> Result<StepResult, StoreError> {
        self.inner.get_step(build_id, path).await
    }

    async fn update(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        result: StepResult,
    ) -> Result<(), StoreError> {
        self.inner.update(build_id, path, result).await
    }

    async fn compare_and_set(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        expected: StepStatus,
        result: StepResult,
    ) -> Result<(), StoreError> {
        self.inner.compare_and_set(build_id, path, expected, result).await
    }

    async fn list_builds(&self) -> Result<Vec<BuildId>, StoreError> {
        self.inner.list_builds().await
    }

    async fn remove_build(&self, build_id: &BuildId) -> Result<bool, StoreError> {
        self.removing.store(true, Ordering::SeqCst);
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
        self.inner.remove_build(build_id).await
    }
}

#[tokio::test]
async fn test_step_parked_during_discard_is_abandoned() {
    let build_step = Arc::new(GatedAction::new());
    let tree = PipelineBuilder::new("root")
        .action("build", build_step.clone())
        .manual("deploy", no_parameters(), Arc::new(MockAction::succeeding("deployed")))
        .build()
        .unwrap();
    let store = Arc::new(HeldRemovalStore::new());
    let engine = Arc::new(Engine::new(tree, store.clone()));

    let handle = engine.start_build().await.unwrap();
    let id = handle.build_id().clone();
    build_step.wait_started(1, WAIT).await;

    let discarding = tokio::spawn({
        let engine = Arc::clone(&engine);
        let id = id.clone();
        async move { engine.discard_build(&id).await }
    });
    while !store.removing.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The manual step parks while the discard is still in progress.
    build_step.release(1);
    wait_for_trigger(&engine, &id, "(2)", WAIT).await;

    store.release.add_permits(1);
    assert!(discarding.await.unwrap().unwrap());

    let ended = tokio::time::timeout(WAIT, handle.wait()).await.unwrap();
    assert!(matches!(ended, Err(StepwiseError::BuildAbandoned(_))));
    assert!(engine.triggers().is_empty());
    assert_eq!(engine.activity(&id), None);
}
