//! Error types for the stepwise orchestrator.
//!
//! Every failure a caller can observe maps onto one of these types. Action
//! failures are not errors: they are recorded as a failed [`StepResult`]
//! and propagate through the tree according to sequence/parallel rules.
//!
//! [`StepResult`]: crate::core::StepResult

use crate::core::{BuildId, StepPath, StepStatus, TriggerId};
use thiserror::Error;

/// The main error type for stepwise operations.
#[derive(Debug, Error)]
pub enum StepwiseError {
    /// A pipeline definition failed validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A step path was malformed or does not exist in the tree.
    #[error("{0}")]
    InvalidPath(#[from] InvalidPathError),

    /// Firing a trigger failed.
    #[error("{0}")]
    Trigger(#[from] TriggerError),

    /// A retrigger request was rejected.
    #[error("{0}")]
    Retrigger(#[from] RetriggerError),

    /// The build state store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// No build with this ID exists.
    #[error("Unknown build: {0}")]
    UnknownBuild(BuildId),

    /// The build was discarded while a branch was still running.
    #[error("Build {0} was discarded")]
    BuildAbandoned(BuildId),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error raised when a step path cannot be parsed or resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPathError {
    /// The string form could not be parsed.
    #[error("Malformed step path '{input}': {reason}")]
    Malformed {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The path has no indices. The root is not addressable as a step.
    #[error("Empty step path does not address a step")]
    Empty,

    /// An index was zero; indices are 1-based.
    #[error("Step path {path} has a zero index at position {position}")]
    ZeroIndex {
        /// The rendered path.
        path: String,
        /// Offending position (0-based).
        position: usize,
    },

    /// An index exceeds the number of children at that level.
    #[error("Step path {path}: index {index} at depth {depth} exceeds {child_count} children")]
    OutOfRange {
        /// The requested path.
        path: StepPath,
        /// Depth of the offending index (0-based).
        depth: usize,
        /// The offending index.
        index: u32,
        /// Children available at that level.
        child_count: usize,
    },

    /// The path descends below a leaf.
    #[error("Step path {path} descends below action '{action}' at depth {depth}")]
    BelowLeaf {
        /// The requested path.
        path: StepPath,
        /// Name of the leaf that was reached.
        action: String,
        /// Depth at which the leaf was reached (0-based).
        depth: usize,
    },
}

/// Errors returned when firing a manual trigger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// The trigger was never registered, already fired, or abandoned.
    #[error("Unknown trigger: {0}")]
    UnknownTrigger(TriggerId),

    /// Required parameters were not supplied.
    #[error("Trigger {trigger_id} is missing required parameters: {}", .missing.join(", "))]
    ParameterMismatch {
        /// The trigger being fired.
        trigger_id: TriggerId,
        /// Names of the parameters that were missing.
        missing: Vec<String>,
    },
}

impl TriggerError {
    /// Creates an unknown trigger error.
    #[must_use]
    pub fn unknown(trigger_id: &TriggerId) -> Self {
        Self::UnknownTrigger(trigger_id.clone())
    }
}

/// Errors returned by the retrigger coordinator.
///
/// None of these leave any trace in the build state.
#[derive(Debug, Error)]
pub enum RetriggerError {
    /// Only top-level actions can be retriggered.
    #[error("Step {0} cannot be retriggered: only top-level actions are supported")]
    UnsupportedNesting(StepPath),

    /// The build still has running or waiting steps.
    #[error("Build {0} is not finished")]
    BuildNotFinished(BuildId),

    /// No build with this ID exists.
    #[error("Unknown build: {0}")]
    UnknownBuild(BuildId),

    /// The step index does not exist in the tree.
    #[error("{0}")]
    InvalidPath(#[from] InvalidPathError),

    /// The build state store failed.
    #[error("{0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a build state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached. Writes failing this way are
    /// retried before being surfaced.
    #[error("Build state store unavailable: {0}")]
    Unavailable(String),

    /// No build with this ID exists.
    #[error("Unknown build: {0}")]
    UnknownBuild(BuildId),

    /// A build with this ID already exists.
    #[error("Build {0} already exists")]
    DuplicateBuild(BuildId),

    /// The build has no record for this step.
    #[error("Build {build_id} has no step {path}")]
    UnknownStep {
        /// The build.
        build_id: BuildId,
        /// The missing step.
        path: StepPath,
    },

    /// A compare-and-set found a different status than expected.
    #[error("Step {path} of build {build_id} is {actual}, expected {expected}")]
    Conflict {
        /// The build.
        build_id: BuildId,
        /// The contested step.
        path: StepPath,
        /// Status the writer expected.
        expected: StepStatus,
        /// Status actually stored.
        actual: StepStatus,
    },
}

impl StoreError {
    /// Returns true for errors worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// Names of the steps involved in the error.
    pub steps: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            steps: Vec::new(),
        }
    }

    /// Sets the steps involved.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }
}
