//! Pipeline structure.
//!
//! This module provides:
//! - The immutable step tree and its node types
//! - Path resolution and pre-order enumeration
//! - A fluent builder with validation
//! - A serialisable structure view

mod builder;
mod describe;
mod tree;

pub use builder::PipelineBuilder;
pub use describe::StepDescription;
pub use tree::{ActionStep, ContainerStep, StepKind, StepNode, StepTree};

pub(crate) use tree::child_paths;
