//! Build state storage.
//!
//! The store owns the per-build, per-step [`StepResult`] records. Branches
//! of a parallel container write to it concurrently, so every operation is
//! atomic per `(build, step)` and a whole-build read always returns a
//! consistent copy.

use crate::core::{BuildId, StepPath, StepResult, StepStatus};
use crate::errors::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// All step records of one build, keyed by path in pre-order.
pub type BuildSnapshot = BTreeMap<StepPath, StepResult>;

/// Protocol for build state storage backends.
#[async_trait]
pub trait BuildStateStore: Send + Sync {
    /// Creates a build with every path set to Pending.
    async fn create_build(&self, build_id: &BuildId, paths: &[StepPath]) -> Result<(), StoreError>;

    /// Returns a copy of every record of a build.
    async fn get(&self, build_id: &BuildId) -> Result<BuildSnapshot, StoreError>;

    /// Returns one record.
    async fn get_step(&self, build_id: &BuildId, path: &StepPath) -> Result<StepResult, StoreError>;

    /// Replaces a record unconditionally.
    async fn update(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        result: StepResult,
    ) -> Result<(), StoreError>;

    /// Replaces a record only if its current status is `expected`.
    async fn compare_and_set(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        expected: StepStatus,
        result: StepResult,
    ) -> Result<(), StoreError>;

    /// Lists every known build.
    async fn list_builds(&self) -> Result<Vec<BuildId>, StoreError>;

    /// Deletes a build. Returns false if it did not exist.
    async fn remove_build(&self, build_id: &BuildId) -> Result<bool, StoreError>;
}

/// In-memory build state store.
#[derive(Debug, Default)]
pub struct InMemoryBuildStateStore {
    builds: DashMap<BuildId, Arc<Mutex<BuildSnapshot>>>,
}

impl InMemoryBuildStateStore {
    /// Creates a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of builds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.builds.len()
    }

    /// Returns true if the store holds no builds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    fn build(&self, build_id: &BuildId) -> Result<Arc<Mutex<BuildSnapshot>>, StoreError> {
        self.builds
            .get(build_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::UnknownBuild(build_id.clone()))
    }
}

#[async_trait]
impl BuildStateStore for InMemoryBuildStateStore {
    async fn create_build(&self, build_id: &BuildId, paths: &[StepPath]) -> Result<(), StoreError> {
        let snapshot: BuildSnapshot = paths
            .iter()
            .map(|path| (path.clone(), StepResult::pending()))
            .collect();

        match self.builds.entry(build_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::DuplicateBuild(build_id.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(snapshot)));
                Ok(())
            }
        }
    }

    async fn get(&self, build_id: &BuildId) -> Result<BuildSnapshot, StoreError> {
        Ok(self.build(build_id)?.lock().clone())
    }

    async fn get_step(&self, build_id: &BuildId, path: &StepPath) -> Result<StepResult, StoreError> {
        self.build(build_id)?
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::UnknownStep {
                build_id: build_id.clone(),
                path: path.clone(),
            })
    }

    async fn update(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        result: StepResult,
    ) -> Result<(), StoreError> {
        self.build(build_id)?.lock().insert(path.clone(), result);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        expected: StepStatus,
        result: StepResult,
    ) -> Result<(), StoreError> {
        let build = self.build(build_id)?;
        let mut steps = build.lock();
        let current = steps.get_mut(path).ok_or_else(|| StoreError::UnknownStep {
            build_id: build_id.clone(),
            path: path.clone(),
        })?;

        if current.status != expected {
            return Err(StoreError::Conflict {
                build_id: build_id.clone(),
                path: path.clone(),
                expected,
                actual: current.status,
            });
        }

        *current = result;
        Ok(())
    }

    async fn list_builds(&self) -> Result<Vec<BuildId>, StoreError> {
        Ok(self.builds.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn remove_build(&self, build_id: &BuildId) -> Result<bool, StoreError> {
        Ok(self.builds.remove(build_id).is_some())
    }
}
