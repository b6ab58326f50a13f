//! Core domain model types for stepwise.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Step paths (positional addressing)
//! - Step status and per-step result records
//! - Build and trigger identifiers

mod ids;
mod path;
mod result;
mod status;

pub use ids::{BuildId, BuildIdGenerator, TriggerId};
pub use path::StepPath;
pub use result::{ParameterSchema, ParameterSpec, Parameters, StepResult};
pub use status::StepStatus;
