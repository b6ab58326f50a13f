//! Manual step triggers.
//!
//! A manual action suspends its build branch until an external caller fires
//! the trigger ID it was registered under. Trigger IDs are the only handle
//! callers get; they resolve to a `(build, step)` pair through the registry.

mod registry;

pub use registry::{TriggerRegistration, TriggerRegistry};
