//! Mock actions and stores for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::actions::{ActionContext, ActionHandler, ActionOutcome};
use crate::core::{BuildId, Parameters, StepPath, StepResult, StepStatus};
use crate::errors::StoreError;
use crate::state::{BuildSnapshot, BuildStateStore, InMemoryBuildStateStore};

/// An action that records calls and returns a configurable outcome.
#[derive(Debug)]
pub struct MockAction {
    outcome: Mutex<ActionOutcome>,
    call_count: AtomicUsize,
    parameters: Mutex<Vec<Parameters>>,
}

impl MockAction {
    /// Creates a mock that succeeds with `output`.
    #[must_use]
    pub fn succeeding(output: impl Into<String>) -> Self {
        Self::with_outcome(ActionOutcome::success(output))
    }

    /// Creates a mock that fails with `output`.
    #[must_use]
    pub fn failing(output: impl Into<String>) -> Self {
        Self::with_outcome(ActionOutcome::failure(output))
    }

    fn with_outcome(outcome: ActionOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            call_count: AtomicUsize::new(0),
            parameters: Mutex::new(Vec::new()),
        }
    }

    /// Sets the outcome returned by later calls.
    pub fn set_outcome(&self, outcome: ActionOutcome) {
        *self.outcome.lock() = outcome;
    }

    /// Returns the number of times the action ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns the parameters of each call.
    #[must_use]
    pub fn recorded_parameters(&self) -> Vec<Parameters> {
        self.parameters.lock().clone()
    }
}

#[async_trait]
impl ActionHandler for MockAction {
    async fn run(&self, ctx: &ActionContext) -> ActionOutcome {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.parameters.lock().push(ctx.parameters.clone());
        self.outcome.lock().clone()
    }
}

/// An action that blocks until released, tracking how many run at once.
#[derive(Debug)]
pub struct GatedAction {
    gate: Semaphore,
    started: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Default for GatedAction {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedAction {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    /// Lets `count` blocked or future calls finish.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Number of calls that have started.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    #[must_use]
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` calls have started.
    ///
    /// # Panics
    ///
    /// Panics if that does not happen within `timeout`.
    pub async fn wait_started(&self, count: usize, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.started() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "Expected {count} started calls, saw {}",
                self.started()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl ActionHandler for GatedAction {
    async fn run(&self, ctx: &ActionContext) -> ActionOutcome {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let outcome = match self.gate.acquire().await {
            Ok(permit) => {
                permit.forget();
                ActionOutcome::success(format!("{} released", ctx.step_name))
            }
            Err(_) => ActionOutcome::failure("gate closed"),
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// An action that panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingAction;

#[async_trait]
impl ActionHandler for PanickingAction {
    async fn run(&self, ctx: &ActionContext) -> ActionOutcome {
        panic!("{} blew up", ctx.step_name);
    }
}

/// A store whose first few writes fail as unavailable.
#[derive(Debug, Default)]
pub struct FlakyBuildStateStore {
    inner: InMemoryBuildStateStore,
    failures_left: AtomicUsize,
    failed_writes: AtomicUsize,
}

impl FlakyBuildStateStore {
    /// Creates a store that fails the next `failures` writes.
    #[must_use]
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: InMemoryBuildStateStore::new(),
            failures_left: AtomicUsize::new(failures),
            failed_writes: AtomicUsize::new(0),
        }
    }

    /// Number of writes that were rejected so far.
    #[must_use]
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        let took = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if took {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BuildStateStore for FlakyBuildStateStore {
    async fn create_build(&self, build_id: &BuildId, paths: &[StepPath]) -> Result<(), StoreError> {
        self.maybe_fail()?;
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
        self.maybe_fail()?;
        self.inner.update(build_id, path, result).await
    }

    async fn compare_and_set(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        expected: StepStatus,
        result: StepResult,
    ) -> Result<(), StoreError> {
        self.maybe_fail()?;
        self.inner
            .compare_and_set(build_id, path, expected, result)
            .await
    }

    async fn list_builds(&self) -> Result<Vec<BuildId>, StoreError> {
        self.inner.list_builds().await
    }

    async fn remove_build(&self, build_id: &BuildId) -> Result<bool, StoreError> {
        self.inner.remove_build(build_id).await
    }
}
