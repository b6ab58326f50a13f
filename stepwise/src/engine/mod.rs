//! The execution engine.
//!
//! An [`Engine`] owns one compiled [`StepTree`] and runs any number of
//! builds of it concurrently. Each build walks the tree once: sequences run
//! their children in order and stop at the first failure, parallels run
//! every child to completion, and manual actions park their branch until
//! their trigger is fired. Every status change goes through the
//! [`BuildStateStore`] as a compare-and-set before the walk moves on.

mod in_flight;
mod retrigger;
mod walk;

#[cfg(test)]
mod scenario_tests;

pub use in_flight::Activity;
pub use retrigger::{parse_step_index, RetriggerHandle};
pub use walk::TRIGGER_EXPIRED_OUTPUT;

use crate::config::EngineConfig;
use crate::core::{BuildId, BuildIdGenerator, Parameters, StepPath, StepResult, StepStatus, TriggerId};
use crate::errors::{StepwiseError, StoreError, TriggerError};
use crate::events::{names, EventSink, NoOpEventSink};
use crate::pipeline::StepTree;
use crate::state::{with_retry, BuildSnapshot, BuildStateStore, InMemoryBuildStateStore};
use crate::triggers::{TriggerRegistration, TriggerRegistry};
use in_flight::InFlight;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runs builds of one step tree.
///
/// Methods that start work take `self: &Arc<Self>` because the walk runs on
/// spawned tasks that keep the engine alive.
pub struct Engine {
    tree: Arc<StepTree>,
    store: Arc<dyn BuildStateStore>,
    triggers: Arc<TriggerRegistry>,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
    build_ids: BuildIdGenerator,
    in_flight: Arc<InFlight>,
    permits: Option<Arc<Semaphore>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("pipeline", &self.tree.name())
            .field("steps", &self.tree.step_count())
            .field("pending_triggers", &self.triggers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine with default configuration and no event sink.
    #[must_use]
    pub fn new(tree: StepTree, store: Arc<dyn BuildStateStore>) -> Self {
        Self {
            tree: Arc::new(tree),
            store,
            triggers: Arc::new(TriggerRegistry::new()),
            events: Arc::new(NoOpEventSink),
            config: EngineConfig::default(),
            build_ids: BuildIdGenerator::new(),
            in_flight: Arc::new(InFlight::default()),
            permits: None,
        }
    }

    /// Creates an engine backed by an [`InMemoryBuildStateStore`].
    #[must_use]
    pub fn in_memory(tree: StepTree) -> Self {
        Self::new(tree, Arc::new(InMemoryBuildStateStore::new()))
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.permits = config
            .max_concurrent_actions
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Shares a trigger registry with other components.
    #[must_use]
    pub fn with_trigger_registry(mut self, triggers: Arc<TriggerRegistry>) -> Self {
        self.triggers = triggers;
        self
    }

    /// Replaces the build ID generator.
    #[must_use]
    pub fn with_build_ids(mut self, build_ids: BuildIdGenerator) -> Self {
        self.build_ids = build_ids;
        self
    }

    /// Continues numbering after the highest build ID already in the store.
    pub async fn resume_build_ids(self) -> Result<Self, StoreError> {
        let existing = self.store.list_builds().await?;
        Ok(self.with_build_ids(BuildIdGenerator::resuming(&existing)))
    }

    /// Returns the step tree.
    #[must_use]
    pub fn tree(&self) -> &StepTree {
        &self.tree
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the trigger registry.
    #[must_use]
    pub fn triggers(&self) -> &Arc<TriggerRegistry> {
        &self.triggers
    }

    /// Starts a new build under the next generated ID.
    ///
    /// Every path of the tree is recorded as Pending before this returns, so
    /// a poller never sees a partially seeded build.
    pub async fn start_build(self: &Arc<Self>) -> Result<BuildHandle, StepwiseError> {
        let build_id = self.build_ids.next_id();
        self.start_build_with_id(build_id).await
    }

    /// Starts a new build under a caller-chosen ID.
    pub async fn start_build_with_id(
        self: &Arc<Self>,
        build_id: BuildId,
    ) -> Result<BuildHandle, StepwiseError> {
        let guard = self
            .in_flight
            .claim(&build_id, Activity::Walk)
            .ok_or_else(|| StoreError::DuplicateBuild(build_id.clone()))?;

        let paths = self.tree.all_paths();
        with_retry(&self.config.store_retry, "create_build", || {
            self.store.create_build(&build_id, &paths)
        })
        .await?;

        tracing::info!(
            build_id = %build_id,
            pipeline = %self.tree.name(),
            steps = paths.len(),
            "Build started"
        );
        self.events
            .emit(
                names::BUILD_STARTED,
                Some(serde_json::json!({
                    "build_id": build_id.as_str(),
                    "pipeline": self.tree.name(),
                })),
            )
            .await;

        let engine = Arc::clone(self);
        let walk_id = build_id.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = engine.run_root(&walk_id).await;
            engine.finish_build(&walk_id, &result).await;
            result
        });

        Ok(BuildHandle { build_id, handle })
    }

    async fn finish_build(&self, build_id: &BuildId, result: &Result<StepStatus, StepwiseError>) {
        match result {
            Ok(status) => {
                tracing::info!(build_id = %build_id, status = %status, "Build completed");
                self.events
                    .emit(
                        names::BUILD_COMPLETED,
                        Some(serde_json::json!({
                            "build_id": build_id.as_str(),
                            "status": status,
                        })),
                    )
                    .await;
            }
            Err(e) => {
                tracing::error!(build_id = %build_id, error = %e, "Build walk aborted");
                self.events
                    .emit(
                        names::BUILD_COMPLETED,
                        Some(serde_json::json!({
                            "build_id": build_id.as_str(),
                            "error": e.to_string(),
                        })),
                    )
                    .await;
            }
        }
    }

    /// Delivers parameters to a waiting manual step.
    pub fn fire_trigger(
        &self,
        trigger_id: &TriggerId,
        parameters: Parameters,
    ) -> Result<TriggerRegistration, TriggerError> {
        let result = self.triggers.fire(trigger_id, parameters);
        if let Err(e) = &result {
            tracing::warn!(trigger_id = %trigger_id, error = %e, "Trigger rejected");
        }
        result
    }

    /// Returns every step record of a build.
    pub async fn state(&self, build_id: &BuildId) -> Result<BuildSnapshot, StepwiseError> {
        self.store.get(build_id).await.map_err(|e| unknown_build(e, build_id))
    }

    /// Returns one step record of a build.
    pub async fn step_state(
        &self,
        build_id: &BuildId,
        path: &StepPath,
    ) -> Result<StepResult, StepwiseError> {
        self.store
            .get_step(build_id, path)
            .await
            .map_err(|e| unknown_build(e, build_id))
    }

    /// Returns the records of every build, keyed by build ID.
    pub async fn all_states(&self) -> Result<BTreeMap<BuildId, BuildSnapshot>, StepwiseError> {
        let mut all = BTreeMap::new();
        for build_id in self.store.list_builds().await? {
            match self.store.get(&build_id).await {
                Ok(snapshot) => {
                    all.insert(build_id, snapshot);
                }
                Err(StoreError::UnknownBuild(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(all)
    }

    /// Lists build IDs, most recent first.
    pub async fn list_builds(&self) -> Result<Vec<BuildId>, StepwiseError> {
        let mut builds = self.store.list_builds().await?;
        builds.sort_unstable_by(|a, b| b.cmp(a));
        Ok(builds)
    }

    /// Returns the most recently created build, if any.
    pub async fn latest_build(&self) -> Result<Option<BuildId>, StepwiseError> {
        Ok(self.store.list_builds().await?.into_iter().max())
    }

    /// Returns what is currently running inside a build.
    #[must_use]
    pub fn activity(&self, build_id: &BuildId) -> Option<Activity> {
        self.in_flight.activity(build_id)
    }

    /// Forgets a build. Its pending triggers become unknown and any branch
    /// still waiting on one ends with [`StepwiseError::BuildAbandoned`].
    ///
    /// Returns false if the build did not exist.
    pub async fn discard_build(&self, build_id: &BuildId) -> Result<bool, StepwiseError> {
        // A manual step registering after the removal fails its state write
        // and cancels its own registration.
        let removed = self.store.remove_build(build_id).await?;
        let abandoned = self.triggers.abandon_build(build_id);
        if removed {
            tracing::info!(build_id = %build_id, abandoned_triggers = abandoned, "Build discarded");
        }
        Ok(removed)
    }
}

/// A build whose walk is running in the background.
#[derive(Debug)]
pub struct BuildHandle {
    build_id: BuildId,
    handle: JoinHandle<Result<StepStatus, StepwiseError>>,
}

impl BuildHandle {
    /// Returns the build ID.
    #[must_use]
    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    /// Returns true once the walk has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the walk to end and returns the overall status.
    pub async fn wait(self) -> Result<StepStatus, StepwiseError> {
        self.handle
            .await
            .map_err(|e| StepwiseError::Internal(format!("Build walk task failed: {e}")))?
    }
}

fn unknown_build(error: StoreError, build_id: &BuildId) -> StepwiseError {
    match error {
        StoreError::UnknownBuild(_) => StepwiseError::UnknownBuild(build_id.clone()),
        other => other.into(),
    }
}
