//! # Stepwise
//!
//! A build-pipeline orchestrator.
//!
//! A pipeline is a tree of steps: actions at the leaves, sequences that run
//! their children one after another and parallels that run them together.
//! Stepwise provides:
//!
//! - **Positional addressing**: every step is named by its path `(i1 i2 ...)`
//! - **Concurrent builds**: any number of builds of one tree run at once,
//!   each with its own per-step state
//! - **Manual steps**: a branch can park until an external caller fires its
//!   trigger with parameters
//! - **Retriggering**: a finished top-level action can be re-run in place
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stepwise::prelude::*;
//!
//! let tree = PipelineBuilder::new("root")
//!     .action("build", Arc::new(NoOpAction))
//!     .parallel("tests", |p| {
//!         p.action("unit", Arc::new(NoOpAction))
//!             .action("integration", Arc::new(NoOpAction))
//!     })
//!     .manual("deploy", [("env", "target environment")], Arc::new(NoOpAction))
//!     .build()?;
//!
//! let engine = Arc::new(Engine::in_memory(tree));
//! let build = engine.start_build().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod config;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod triggers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{ActionContext, ActionHandler, ActionOutcome, FnAction, NoOpAction};
    pub use crate::config::EngineConfig;
    pub use crate::core::{
        BuildId, ParameterSchema, ParameterSpec, Parameters, StepPath, StepResult, StepStatus,
        TriggerId,
    };
    pub use crate::engine::{BuildHandle, Engine, RetriggerHandle};
    pub use crate::errors::{
        InvalidPathError, PipelineValidationError, RetriggerError, StepwiseError, StoreError,
        TriggerError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{PipelineBuilder, StepKind, StepNode, StepTree};
    pub use crate::state::{BuildStateStore, InMemoryBuildStateStore};
    pub use crate::triggers::{TriggerRegistration, TriggerRegistry};
}
