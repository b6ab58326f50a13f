//! Lifecycle events.
//!
//! The engine reports what it does through an [`EventSink`]. Event names
//! are dotted strings; the ones the engine emits are listed in [`names`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Names of the events the engine emits.
pub mod names {
    /// A build was created and its walk began.
    pub const BUILD_STARTED: &str = "build.started";
    /// The walk of a build ended.
    pub const BUILD_COMPLETED: &str = "build.completed";
    /// A step moved to Running.
    pub const STEP_STARTED: &str = "step.started";
    /// A step finished successfully.
    pub const STEP_SUCCEEDED: &str = "step.succeeded";
    /// A step failed.
    pub const STEP_FAILED: &str = "step.failed";
    /// A manual step is waiting for its trigger.
    pub const STEP_AWAITING_TRIGGER: &str = "step.awaiting_trigger";
    /// A waiting step's trigger was fired.
    pub const STEP_TRIGGERED: &str = "step.triggered";
    /// A top-level step was reset and re-run.
    pub const STEP_RETRIGGERED: &str = "step.retriggered";
    /// A waiting step's trigger ran out of time.
    pub const TRIGGER_EXPIRED: &str = "trigger.expired";
}
