//! Per-step result records.

use super::{StepStatus, TriggerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Description of one parameter a manual step asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Human-readable prompt text.
    #[serde(rename = "desc", alias = "description", default)]
    pub description: String,
}

impl ParameterSpec {
    /// Creates a parameter description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Parameters a manual step requires, keyed by name.
pub type ParameterSchema = BTreeMap<String, ParameterSpec>;

/// Parameter values supplied when a trigger is fired.
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Recorded state of one step in one build.
///
/// Serializes to the shape pollers consume:
/// `{"status": ..., "out": ..., "trigger-id": ..., "parameters": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Current status.
    pub status: StepStatus,

    /// Output produced so far (handler output, or failure detail).
    #[serde(rename = "out", default)]
    pub output: String,

    /// Token for firing a waiting manual step.
    #[serde(rename = "trigger-id", default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<TriggerId>,

    /// Parameters the waiting manual step asks for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterSchema>,

    /// When the current attempt started running.
    #[serde(rename = "started-at", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the current attempt reached a terminal state.
    #[serde(rename = "finished-at", default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for StepResult {
    fn default() -> Self {
        Self::pending()
    }
}

impl StepResult {
    /// A step that has not started.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: StepStatus::Pending,
            output: String::new(),
            trigger_id: None,
            parameters: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// A step that started running now.
    #[must_use]
    pub fn running() -> Self {
        Self {
            status: StepStatus::Running,
            started_at: Some(Utc::now()),
            ..Self::pending()
        }
    }

    /// A manual step parked on `trigger_id`.
    #[must_use]
    pub fn awaiting_trigger(trigger_id: TriggerId, parameters: ParameterSchema) -> Self {
        Self {
            status: StepStatus::AwaitingTrigger,
            trigger_id: Some(trigger_id),
            parameters: Some(parameters),
            ..Self::pending()
        }
    }

    /// A successful completion of the attempt described by `self`.
    #[must_use]
    pub fn succeeded(&self, output: impl Into<String>) -> Self {
        self.finish(StepStatus::Success, output.into())
    }

    /// A failed completion of the attempt described by `self`.
    #[must_use]
    pub fn failed(&self, output: impl Into<String>) -> Self {
        self.finish(StepStatus::Failure, output.into())
    }

    fn finish(&self, status: StepStatus, output: String) -> Self {
        Self {
            status,
            output,
            trigger_id: None,
            parameters: None,
            started_at: self.started_at,
            finished_at: Some(Utc::now()),
        }
    }

    /// Returns true if the step reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
