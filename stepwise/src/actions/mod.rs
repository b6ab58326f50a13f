//! Action handler trait and implementations.
//!
//! Actions are the leaves of a step tree. The engine does not know what an
//! action does: it hands the handler the step's context and records the
//! outcome it reports.

use crate::core::{BuildId, Parameters, StepPath};
use async_trait::async_trait;
use std::fmt::Debug;

/// Everything a handler gets to see about the step it runs.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// The build this step belongs to.
    pub build_id: BuildId,
    /// Position of the step in the tree.
    pub path: StepPath,
    /// The step's name.
    pub step_name: String,
    /// Parameters supplied by whoever fired the trigger. Empty for
    /// non-manual steps.
    pub parameters: Parameters,
}

impl ActionContext {
    /// Creates a context with no parameters.
    #[must_use]
    pub fn new(build_id: BuildId, path: StepPath, step_name: impl Into<String>) -> Self {
        Self {
            build_id,
            path,
            step_name: step_name.into(),
            parameters: Parameters::new(),
        }
    }

    /// Sets the parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns a parameter as a string, if it was supplied as one.
    #[must_use]
    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(serde_json::Value::as_str)
    }
}

/// What a handler reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Text recorded as the step's output.
    pub output: String,
    /// Whether the action succeeded.
    pub success: bool,
}

impl ActionOutcome {
    /// A successful outcome.
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
        }
    }
}

/// Trait for action handlers.
///
/// Handlers report failure through [`ActionOutcome::failure`]; a panicking
/// handler is caught by the engine and recorded as a failure as well.
#[async_trait]
pub trait ActionHandler: Send + Sync + Debug {
    /// Runs the action.
    async fn run(&self, ctx: &ActionContext) -> ActionOutcome;
}

/// A simple function-based action.
pub struct FnAction<F>
where
    F: Fn(&ActionContext) -> ActionOutcome + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(&ActionContext) -> ActionOutcome + Send + Sync,
{
    /// Creates a new function-based action.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnAction<F>
where
    F: Fn(&ActionContext) -> ActionOutcome + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> ActionHandler for FnAction<F>
where
    F: Fn(&ActionContext) -> ActionOutcome + Send + Sync,
{
    async fn run(&self, ctx: &ActionContext) -> ActionOutcome {
        (self.func)(ctx)
    }
}

/// An action that succeeds immediately.
///
/// Its output lists the supplied parameters, which makes it a reasonable
/// default for manual approval gates that have nothing to execute.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAction;

#[async_trait]
impl ActionHandler for NoOpAction {
    async fn run(&self, ctx: &ActionContext) -> ActionOutcome {
        let output = ctx
            .parameters
            .iter()
            .map(|(name, value)| match value {
                serde_json::Value::String(s) => format!("{name}={s}"),
                other => format!("{name}={other}"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        ActionOutcome::success(output)
    }
}
