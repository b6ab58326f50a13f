//! Step status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a step within one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has not started yet.
    Pending,
    /// Step is currently running.
    Running,
    /// Step completed successfully.
    Success,
    /// Step failed.
    Failure,
    /// Manual step waiting for an external trigger.
    AwaitingTrigger,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::AwaitingTrigger => write!(f, "awaiting_trigger"),
        }
    }
}

impl StepStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Returns true while a step is executing or parked on a trigger.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Running | Self::AwaitingTrigger)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Whether moving from `self` to `next` is a legal transition within a
    /// single execution attempt.
    ///
    /// Resetting a terminal step back to `Pending` is not covered here; only
    /// the retrigger path does that.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        use StepStatus::{AwaitingTrigger, Failure, Pending, Running, Success};
        matches!(
            (self, next),
            (Pending, Running | AwaitingTrigger)
                | (Running, Success | Failure | AwaitingTrigger)
                | (AwaitingTrigger, Running | Failure)
        )
    }
}
