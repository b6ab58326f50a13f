//! Fluent pipeline builder.

use super::tree::{StepKind, StepNode, StepTree};
use crate::actions::ActionHandler;
use crate::core::{ParameterSchema, ParameterSpec};
use crate::errors::PipelineValidationError;
use std::sync::Arc;

/// Builder for creating validated step trees.
///
/// ```rust,ignore
/// let tree = PipelineBuilder::new("root")
///     .action("build", build)
///     .parallel("tests", |p| p.action("unit", unit).action("integration", it))
///     .manual("deploy", [("env", "target environment")], deploy)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The container name.
    name: String,
    /// Whether the container runs its children in order or concurrently.
    kind: StepKind,
    /// Child steps added so far.
    children: Vec<StepNode>,
}

impl PipelineBuilder {
    /// Creates a builder for a pipeline whose root runs its steps in order.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::container(name, StepKind::Sequence)
    }

    fn container(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Adds an automatic action.
    #[must_use]
    pub fn action(mut self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.children.push(StepNode::action(name, handler));
        self
    }

    /// Adds a manual action with `(name, description)` parameter pairs.
    #[must_use]
    pub fn manual<I, K, D>(
        mut self,
        name: impl Into<String>,
        parameters: I,
        handler: Arc<dyn ActionHandler>,
    ) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<String>,
    {
        let schema: ParameterSchema = parameters
            .into_iter()
            .map(|(key, desc)| (key.into(), ParameterSpec::new(desc)))
            .collect();
        self.children.push(StepNode::manual(name, schema, handler));
        self
    }

    /// Adds a nested sequence built by `build`.
    #[must_use]
    pub fn sequence(self, name: impl Into<String>, build: impl FnOnce(Self) -> Self) -> Self {
        self.nested(name, StepKind::Sequence, build)
    }

    /// Adds a nested parallel container built by `build`.
    #[must_use]
    pub fn parallel(self, name: impl Into<String>, build: impl FnOnce(Self) -> Self) -> Self {
        self.nested(name, StepKind::Parallel, build)
    }

    /// Adds an already constructed node.
    #[must_use]
    pub fn step(mut self, node: StepNode) -> Self {
        self.children.push(node);
        self
    }

    fn nested(
        mut self,
        name: impl Into<String>,
        kind: StepKind,
        build: impl FnOnce(Self) -> Self,
    ) -> Self {
        let inner = build(Self::container(name, kind));
        self.children.push(inner.into_node());
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of direct children added so far.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.children.len()
    }

    /// Converts the builder into an unvalidated node.
    #[must_use]
    pub fn into_node(self) -> StepNode {
        match self.kind {
            StepKind::Parallel => StepNode::parallel(self.name, self.children),
            StepKind::Sequence | StepKind::Action => StepNode::sequence(self.name, self.children),
        }
    }

    /// Builds and validates the tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline has no steps or any nested node is
    /// invalid.
    pub fn build(self) -> Result<StepTree, PipelineValidationError> {
        if self.children.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has no steps",
                self.name
            )));
        }
        StepTree::new(self.into_node())
    }
}
