//! Test assertions for build state.

use std::time::Duration;

use crate::core::{BuildId, StepPath, StepResult, StepStatus, TriggerId};
use crate::engine::Engine;
use crate::state::BuildSnapshot;

fn parse(path: &str) -> StepPath {
    match path.parse() {
        Ok(parsed) => parsed,
        Err(e) => panic!("Invalid step path '{path}': {e}"),
    }
}

/// Asserts that the step at `path` has the expected status.
pub fn assert_step_status(snapshot: &BuildSnapshot, path: &str, expected: StepStatus) {
    let actual = snapshot.get(&parse(path)).map(|result| result.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected step {path} to be {expected}, got {actual:?}"
    );
}

/// Asserts that every listed step is still Pending.
pub fn assert_all_pending(snapshot: &BuildSnapshot, paths: &[&str]) {
    for path in paths {
        assert_step_status(snapshot, path, StepStatus::Pending);
    }
}

/// Polls the engine until the step reaches `expected`.
///
/// # Panics
///
/// Panics if the build is unknown or the status is not reached within
/// `timeout`.
pub async fn wait_for_status(
    engine: &Engine,
    build_id: &BuildId,
    path: &str,
    expected: StepStatus,
    timeout: Duration,
) -> StepResult {
    let step = parse(path);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let current = match engine.step_state(build_id, &step).await {
            Ok(current) => current,
            Err(e) => panic!("Could not read step {path} of build {build_id}: {e}"),
        };
        if current.status == expected {
            return current;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Step {path} of build {build_id} stayed {} instead of becoming {expected}",
            current.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Waits for a manual step to park and returns its trigger ID.
///
/// # Panics
///
/// Panics if the step does not reach AwaitingTrigger within `timeout`.
pub async fn wait_for_trigger(
    engine: &Engine,
    build_id: &BuildId,
    path: &str,
    timeout: Duration,
) -> TriggerId {
    let waiting =
        wait_for_status(engine, build_id, path, StepStatus::AwaitingTrigger, timeout).await;
    match waiting.trigger_id {
        Some(trigger_id) => trigger_id,
        None => panic!("Step {path} is awaiting a trigger but has no trigger ID"),
    }
}
