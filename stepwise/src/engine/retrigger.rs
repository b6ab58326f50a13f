//! Re-running one finished top-level step of an existing build.

use super::in_flight::Activity;
use super::Engine;
use crate::core::{BuildId, StepPath, StepResult, StepStatus};
use crate::errors::{InvalidPathError, RetriggerError, StepwiseError, StoreError};
use crate::events::names;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A retriggered step running in the background.
#[derive(Debug)]
pub struct RetriggerHandle {
    build_id: BuildId,
    path: StepPath,
    handle: JoinHandle<Result<StepStatus, StepwiseError>>,
}

impl RetriggerHandle {
    /// Returns the build ID.
    #[must_use]
    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    /// Returns the retriggered step.
    #[must_use]
    pub fn path(&self) -> &StepPath {
        &self.path
    }

    /// Waits for the step to reach a terminal status.
    pub async fn wait(self) -> Result<StepStatus, StepwiseError> {
        self.handle
            .await
            .map_err(|e| StepwiseError::Internal(format!("Retrigger task failed: {e}")))?
    }
}

impl Engine {
    /// Retriggers the step named by `step_index`, either a bare 1-based
    /// top-level index such as `"2"` or a full path such as `"(2)"`.
    pub async fn retrigger(
        self: &Arc<Self>,
        build_id: &BuildId,
        step_index: &str,
    ) -> Result<RetriggerHandle, RetriggerError> {
        let path = parse_step_index(step_index)?;
        self.retrigger_path(build_id, &path).await
    }

    /// Resets a top-level action to Pending and runs it again.
    ///
    /// Nothing else in the build is touched. When this returns an error the
    /// build state is unchanged.
    pub async fn retrigger_path(
        self: &Arc<Self>,
        build_id: &BuildId,
        path: &StepPath,
    ) -> Result<RetriggerHandle, RetriggerError> {
        if !path.is_top_level() {
            return Err(RetriggerError::UnsupportedNesting(path.clone()));
        }
        let node = self.tree.resolve(path)?;
        if node.is_container() {
            return Err(RetriggerError::UnsupportedNesting(path.clone()));
        }

        let guard = self
            .in_flight
            .claim(build_id, Activity::Retrigger(path.clone()))
            .ok_or_else(|| RetriggerError::BuildNotFinished(build_id.clone()))?;

        let snapshot = self.store.get(build_id).await.map_err(|e| match e {
            StoreError::UnknownBuild(_) => RetriggerError::UnknownBuild(build_id.clone()),
            other => other.into(),
        })?;

        if snapshot.values().any(|result| result.status.is_in_flight()) {
            return Err(RetriggerError::BuildNotFinished(build_id.clone()));
        }

        let current = snapshot
            .get(path)
            .map(|result| result.status)
            .ok_or_else(|| StoreError::UnknownStep {
                build_id: build_id.clone(),
                path: path.clone(),
            })?;

        self.store
            .compare_and_set(build_id, path, current, StepResult::pending())
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => RetriggerError::BuildNotFinished(build_id.clone()),
                other => other.into(),
            })?;

        tracing::info!(
            build_id = %build_id,
            step_id = %path,
            previous = %current,
            "Step retriggered"
        );
        self.emit_step(
            names::STEP_RETRIGGERED,
            build_id,
            path,
            node.name(),
            json!({"previous_status": current}),
        )
        .await;

        let engine = Arc::clone(self);
        let run_id = build_id.clone();
        let run_path = path.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            engine.run_node(run_id, run_path).await
        });

        Ok(RetriggerHandle {
            build_id: build_id.clone(),
            path: path.clone(),
            handle,
        })
    }
}

/// Parses a retrigger step index.
///
/// # Errors
///
/// Returns an error if the input is neither a positive integer nor a
/// well-formed step path.
pub fn parse_step_index(step_index: &str) -> Result<StepPath, InvalidPathError> {
    let trimmed = step_index.trim();
    if trimmed.starts_with('(') {
        return trimmed.parse();
    }

    let index: u32 = trimmed.parse().map_err(|_| InvalidPathError::Malformed {
        input: step_index.to_string(),
        reason: "expected a 1-based step index".to_string(),
    })?;
    StepPath::top_level(index)
}
