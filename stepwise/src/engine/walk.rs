//! Walking the step tree for one build.

use super::Engine;
use crate::actions::{ActionContext, ActionOutcome};
use crate::core::{BuildId, Parameters, StepPath, StepResult, StepStatus};
use crate::errors::{StepwiseError, StoreError};
use crate::events::names;
use crate::pipeline::{child_paths, ActionStep, StepNode};
use crate::state::with_retry;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;

/// Output recorded for a manual step whose trigger timed out.
pub const TRIGGER_EXPIRED_OUTPUT: &str = "trigger expired";

impl Engine {
    /// Runs the implicit root container. The root has no record of its own.
    pub(super) async fn run_root(self: &Arc<Self>, build_id: &BuildId) -> Result<StepStatus, StepwiseError> {
        let root = self.tree.root();
        let path = StepPath::root();
        match root {
            StepNode::Parallel(_) => self.run_parallel(build_id, &path, root).await,
            StepNode::Sequence(_) | StepNode::Action(_) => self.run_sequence(build_id, &path, root).await,
        }
    }

    /// Runs the node at `path` and everything below it.
    pub(super) fn run_node(
        self: Arc<Self>,
        build_id: BuildId,
        path: StepPath,
    ) -> BoxFuture<'static, Result<StepStatus, StepwiseError>> {
        async move {
            let node = self.tree.resolve(&path)?;
            match node {
                StepNode::Action(action) => self.run_action(&build_id, &path, action).await,
                StepNode::Sequence(_) => self.run_sequence(&build_id, &path, node).await,
                StepNode::Parallel(_) => self.run_parallel(&build_id, &path, node).await,
            }
        }
        .boxed()
    }

    async fn run_action(
        self: &Arc<Self>,
        build_id: &BuildId,
        path: &StepPath,
        action: &ActionStep,
    ) -> Result<StepStatus, StepwiseError> {
        let (from, parameters) = if action.manual {
            match self.await_trigger(build_id, path, action).await? {
                Some(parameters) => (StepStatus::AwaitingTrigger, parameters),
                None => return Ok(StepStatus::Failure),
            }
        } else {
            (StepStatus::Pending, Parameters::new())
        };

        let running = self.start_step(build_id, path, &action.name, from).await?;

        let ctx = ActionContext::new(build_id.clone(), path.clone(), action.name.clone())
            .with_parameters(parameters);
        let outcome = self.invoke(action, ctx).await?;

        let status = if outcome.success {
            StepStatus::Success
        } else {
            StepStatus::Failure
        };
        self.finish_step(build_id, path, &action.name, &running, status, outcome.output)
            .await?;
        Ok(status)
    }

    /// Parks a manual step until its trigger fires.
    ///
    /// Returns `None` if the trigger expired, in which case the step has
    /// already been recorded as failed.
    async fn await_trigger(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        action: &ActionStep,
    ) -> Result<Option<Parameters>, StepwiseError> {
        let (registration, mut receiver) =
            self.triggers
                .register(build_id.clone(), path.clone(), action.parameters.clone());
        let trigger_id = registration.trigger_id;

        let waiting = StepResult::awaiting_trigger(trigger_id.clone(), action.parameters.clone());
        if let Err(e) = self
            .transition(build_id, path, StepStatus::Pending, waiting)
            .await
        {
            self.triggers.cancel(&trigger_id);
            return Err(e);
        }

        tracing::info!(
            build_id = %build_id,
            step_id = %path,
            trigger_id = %trigger_id,
            "Step awaiting trigger"
        );
        self.emit_step(
            names::STEP_AWAITING_TRIGGER,
            build_id,
            path,
            &action.name,
            json!({"trigger_id": trigger_id.as_str()}),
        )
        .await;

        let received = match self.config.trigger_timeout() {
            None => (&mut receiver).await,
            Some(timeout) => match tokio::time::timeout(timeout, &mut receiver).await {
                Ok(received) => received,
                Err(_) => {
                    if self.triggers.cancel(&trigger_id) {
                        self.expire_trigger(build_id, path, &action.name).await?;
                        return Ok(None);
                    }
                    // Fired concurrently with the deadline.
                    receiver.await
                }
            },
        };

        let Ok(parameters) = received else {
            tracing::warn!(build_id = %build_id, step_id = %path, "Trigger abandoned");
            return Err(StepwiseError::BuildAbandoned(build_id.clone()));
        };

        self.emit_step(
            names::STEP_TRIGGERED,
            build_id,
            path,
            &action.name,
            json!({"trigger_id": trigger_id.as_str(), "parameters": parameters}),
        )
        .await;
        Ok(Some(parameters))
    }

    async fn expire_trigger(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        step: &str,
    ) -> Result<(), StepwiseError> {
        let expired = StepResult::pending().failed(TRIGGER_EXPIRED_OUTPUT);
        self.transition(build_id, path, StepStatus::AwaitingTrigger, expired)
            .await?;

        tracing::warn!(build_id = %build_id, step_id = %path, "Trigger expired");
        self.emit_step(names::TRIGGER_EXPIRED, build_id, path, step, json!({}))
            .await;
        self.emit_step(
            names::STEP_FAILED,
            build_id,
            path,
            step,
            json!({"output": TRIGGER_EXPIRED_OUTPUT}),
        )
        .await;
        Ok(())
    }

    /// Runs a handler on its own task so a panic fails the step instead of
    /// the walk.
    async fn invoke(
        &self,
        action: &ActionStep,
        ctx: ActionContext,
    ) -> Result<ActionOutcome, StepwiseError> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                Arc::clone(permits)
                    .acquire_owned()
                    .await
                    .map_err(|e| StepwiseError::Internal(format!("Action permits closed: {e}")))?,
            ),
            None => None,
        };

        let handler = Arc::clone(&action.handler);
        let build_id = ctx.build_id.clone();
        let path = ctx.path.clone();

        match tokio::spawn(async move { handler.run(&ctx).await }).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic().as_ref());
                tracing::error!(
                    build_id = %build_id,
                    step_id = %path,
                    panic = %message,
                    "Action handler panicked"
                );
                Ok(ActionOutcome::failure(format!("action panicked: {message}")))
            }
            Err(e) => Err(StepwiseError::Internal(format!("Action task failed: {e}"))),
        }
    }

    async fn run_sequence(
        self: &Arc<Self>,
        build_id: &BuildId,
        path: &StepPath,
        node: &StepNode,
    ) -> Result<StepStatus, StepwiseError> {
        let running = if path.is_root() {
            None
        } else {
            Some(
                self.start_step(build_id, path, node.name(), StepStatus::Pending)
                    .await?,
            )
        };

        for (child_path, _) in child_paths(path, node.children()) {
            let status = Arc::clone(self)
                .run_node(build_id.clone(), child_path.clone())
                .await?;

            if status == StepStatus::Failure {
                if let Some(running) = &running {
                    self.finish_step(
                        build_id,
                        path,
                        node.name(),
                        running,
                        StepStatus::Failure,
                        format!("step {child_path} failed"),
                    )
                    .await?;
                }
                return Ok(StepStatus::Failure);
            }
        }

        if let Some(running) = &running {
            self.finish_step(build_id, path, node.name(), running, StepStatus::Success, String::new())
                .await?;
        }
        Ok(StepStatus::Success)
    }

    async fn run_parallel(
        self: &Arc<Self>,
        build_id: &BuildId,
        path: &StepPath,
        node: &StepNode,
    ) -> Result<StepStatus, StepwiseError> {
        let running = if path.is_root() {
            None
        } else {
            Some(
                self.start_step(build_id, path, node.name(), StepStatus::Pending)
                    .await?,
            )
        };

        let mut branches: FuturesUnordered<_> = child_paths(path, node.children())
            .map(|(child_path, _)| tokio::spawn(Arc::clone(self).run_node(build_id.clone(), child_path)))
            .collect();

        let mut failed = false;
        let mut first_error: Option<StepwiseError> = None;

        // Siblings keep running after a failure; the container's failure is
        // recorded as soon as it is known.
        while let Some(joined) = branches.next().await {
            let outcome = joined
                .map_err(|e| StepwiseError::Internal(format!("Branch task failed: {e}")))
                .and_then(|result| result);

            match outcome {
                Ok(StepStatus::Failure) if !failed => {
                    failed = true;
                    if let Some(running) = &running {
                        if let Err(e) = self
                            .finish_step(
                                build_id,
                                path,
                                node.name(),
                                running,
                                StepStatus::Failure,
                                "one or more branches failed".to_string(),
                            )
                            .await
                        {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if failed {
            return Ok(StepStatus::Failure);
        }

        if let Some(running) = &running {
            self.finish_step(build_id, path, node.name(), running, StepStatus::Success, String::new())
                .await?;
        }
        Ok(StepStatus::Success)
    }

    /// Moves a step from `from` to Running.
    async fn start_step(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        step: &str,
        from: StepStatus,
    ) -> Result<StepResult, StepwiseError> {
        let running = StepResult::running();
        self.transition(build_id, path, from, running.clone()).await?;

        tracing::debug!(build_id = %build_id, step_id = %path, step, "Step started");
        self.emit_step(names::STEP_STARTED, build_id, path, step, json!({}))
            .await;
        Ok(running)
    }

    /// Moves a Running step to its terminal status.
    async fn finish_step(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        step: &str,
        running: &StepResult,
        status: StepStatus,
        output: String,
    ) -> Result<(), StepwiseError> {
        let result = if status == StepStatus::Success {
            running.succeeded(output)
        } else {
            running.failed(output)
        };
        let event = if status == StepStatus::Success {
            names::STEP_SUCCEEDED
        } else {
            names::STEP_FAILED
        };
        let detail = json!({"output": result.output});

        self.transition(build_id, path, StepStatus::Running, result)
            .await?;

        tracing::info!(build_id = %build_id, step_id = %path, step, status = %status, "Step finished");
        self.emit_step(event, build_id, path, step, detail).await;
        Ok(())
    }

    /// Writes one status change, retrying transient store failures.
    ///
    /// Only moves allowed by [`StepStatus::can_transition_to`] are written.
    pub(super) async fn transition(
        &self,
        build_id: &BuildId,
        path: &StepPath,
        expected: StepStatus,
        result: StepResult,
    ) -> Result<(), StepwiseError> {
        if !expected.can_transition_to(result.status) {
            tracing::error!(
                build_id = %build_id,
                step_id = %path,
                from = %expected,
                to = %result.status,
                "Refusing illegal step transition"
            );
            return Err(StepwiseError::Internal(format!(
                "illegal transition of step {path} from {expected} to {}",
                result.status
            )));
        }

        with_retry(&self.config.store_retry, "compare_and_set", || {
            self.store
                .compare_and_set(build_id, path, expected, result.clone())
        })
        .await
        .map_err(|e| {
            tracing::error!(
                build_id = %build_id,
                step_id = %path,
                error = %e,
                "Failed to record step status"
            );
            match e {
                StoreError::UnknownBuild(_) => StepwiseError::BuildAbandoned(build_id.clone()),
                other => other.into(),
            }
        })
    }

    pub(super) async fn emit_step(
        &self,
        event_type: &str,
        build_id: &BuildId,
        path: &StepPath,
        step: &str,
        detail: serde_json::Value,
    ) {
        let mut data = json!({
            "build_id": build_id.as_str(),
            "step_id": path.to_string(),
            "step": step,
        });
        if let (Some(fields), serde_json::Value::Object(extra)) = (data.as_object_mut(), detail) {
            fields.extend(extra);
        }
        self.events.emit(event_type, Some(data)).await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
