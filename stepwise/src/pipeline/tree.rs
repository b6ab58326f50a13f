//! The immutable step tree.
//!
//! A pipeline definition compiles once into a [`StepTree`]: actions are the
//! leaves, sequences run their children one after another and parallels run
//! them concurrently. Nodes are addressed positionally with [`StepPath`].

use super::describe::StepDescription;
use crate::actions::ActionHandler;
use crate::core::{ParameterSchema, StepPath};
use crate::errors::{InvalidPathError, PipelineValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The kind of a step node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    /// A leaf that runs an action handler.
    #[serde(rename = "action")]
    Action,
    /// A container whose children run in order.
    #[serde(rename = "container")]
    Sequence,
    /// A container whose children run concurrently.
    #[serde(rename = "parallel")]
    Parallel,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => write!(f, "action"),
            Self::Sequence => write!(f, "container"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// A leaf step.
#[derive(Debug, Clone)]
pub struct ActionStep {
    /// The step name.
    pub name: String,
    /// Whether the step waits for an external trigger before running.
    pub manual: bool,
    /// Parameters a manual step asks for when triggered.
    pub parameters: ParameterSchema,
    /// The handler that does the work.
    pub handler: Arc<dyn ActionHandler>,
}

/// A sequence or parallel container.
#[derive(Debug, Clone)]
pub struct ContainerStep {
    /// The container name.
    pub name: String,
    /// Child steps, in declaration order.
    pub children: Vec<StepNode>,
}

/// A node of the step tree.
#[derive(Debug, Clone)]
pub enum StepNode {
    /// A leaf action.
    Action(ActionStep),
    /// Children run strictly one after another.
    Sequence(ContainerStep),
    /// Children run concurrently.
    Parallel(ContainerStep),
}

impl StepNode {
    /// Creates an automatic action.
    #[must_use]
    pub fn action(name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self::Action(ActionStep {
            name: name.into(),
            manual: false,
            parameters: ParameterSchema::new(),
            handler,
        })
    }

    /// Creates a manual action that waits for a trigger carrying
    /// `parameters`.
    #[must_use]
    pub fn manual(
        name: impl Into<String>,
        parameters: ParameterSchema,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self::Action(ActionStep {
            name: name.into(),
            manual: true,
            parameters,
            handler,
        })
    }

    /// Creates a sequence container.
    #[must_use]
    pub fn sequence(name: impl Into<String>, children: Vec<Self>) -> Self {
        Self::Sequence(ContainerStep {
            name: name.into(),
            children,
        })
    }

    /// Creates a parallel container.
    #[must_use]
    pub fn parallel(name: impl Into<String>, children: Vec<Self>) -> Self {
        Self::Parallel(ContainerStep {
            name: name.into(),
            children,
        })
    }

    /// Returns the node's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Action(action) => &action.name,
            Self::Sequence(container) | Self::Parallel(container) => &container.name,
        }
    }

    /// Returns the node's kind.
    #[must_use]
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Action(_) => StepKind::Action,
            Self::Sequence(_) => StepKind::Sequence,
            Self::Parallel(_) => StepKind::Parallel,
        }
    }

    /// Returns the children of a container, or an empty slice for actions.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match self {
            Self::Action(_) => &[],
            Self::Sequence(container) | Self::Parallel(container) => &container.children,
        }
    }

    /// Returns true for sequences and parallels.
    #[must_use]
    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Action(_))
    }

    /// Returns the action, if this node is a leaf.
    #[must_use]
    pub fn as_action(&self) -> Option<&ActionStep> {
        match self {
            Self::Action(action) => Some(action),
            _ => None,
        }
    }

    fn validate(&self, trail: &mut Vec<String>) -> Result<(), PipelineValidationError> {
        let name = self.name();
        trail.push(name.to_string());

        if name.trim().is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Step at '{}' has an empty name",
                trail.join(" / ")
            ))
            .with_steps(trail.clone()));
        }

        match self {
            Self::Action(action) => {
                if !action.manual && !action.parameters.is_empty() {
                    return Err(PipelineValidationError::new(format!(
                        "Action '{}' declares parameters but is not manual",
                        action.name
                    ))
                    .with_steps(trail.clone()));
                }
                if action.parameters.keys().any(|key| key.trim().is_empty()) {
                    return Err(PipelineValidationError::new(format!(
                        "Action '{}' declares a parameter with an empty name",
                        action.name
                    ))
                    .with_steps(trail.clone()));
                }
            }
            Self::Sequence(container) | Self::Parallel(container) => {
                if container.children.is_empty() {
                    return Err(PipelineValidationError::new(format!(
                        "Container '{}' has no steps",
                        container.name
                    ))
                    .with_steps(trail.clone()));
                }
                if u32::try_from(container.children.len()).is_err() {
                    return Err(PipelineValidationError::new(format!(
                        "Container '{}' has too many steps",
                        container.name
                    ))
                    .with_steps(trail.clone()));
                }
                for child in &container.children {
                    child.validate(trail)?;
                }
            }
        }

        trail.pop();
        Ok(())
    }
}

/// A compiled, immutable pipeline.
///
/// The root is an implicit container: its children are the top-level steps
/// `(1)`, `(2)`, ... and the root itself has no address.
#[derive(Debug, Clone)]
pub struct StepTree {
    root: StepNode,
}

impl StepTree {
    /// Validates `root` and wraps it into a tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is an action, a container is empty, a
    /// name is blank, or parameters are declared on a non-manual action.
    pub fn new(root: StepNode) -> Result<Self, PipelineValidationError> {
        if !root.is_container() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline root '{}' must be a container",
                root.name()
            ))
            .with_steps(vec![root.name().to_string()]));
        }

        root.validate(&mut Vec::new())?;
        Ok(Self { root })
    }

    /// Returns the pipeline name (the root container's name).
    #[must_use]
    pub fn name(&self) -> &str {
        self.root.name()
    }

    /// Returns the root container.
    #[must_use]
    pub fn root(&self) -> &StepNode {
        &self.root
    }

    /// Returns the top-level steps.
    #[must_use]
    pub fn top_level(&self) -> &[StepNode] {
        self.root.children()
    }

    /// Finds the node at `path`.
    ///
    /// The descent reads the path without consuming or modifying it.
    ///
    /// # Errors
    ///
    /// Returns an error for the empty path, for an index larger than the
    /// number of children at its level, or for a path that continues below
    /// an action.
    pub fn resolve(&self, path: &StepPath) -> Result<&StepNode, InvalidPathError> {
        if path.is_root() {
            return Err(InvalidPathError::Empty);
        }

        let mut node = &self.root;
        for (depth, &index) in path.indices().iter().enumerate() {
            let children = match node {
                StepNode::Action(action) => {
                    return Err(InvalidPathError::BelowLeaf {
                        path: path.clone(),
                        action: action.name.clone(),
                        depth,
                    });
                }
                StepNode::Sequence(container) | StepNode::Parallel(container) => {
                    &container.children
                }
            };

            node = (index as usize)
                .checked_sub(1)
                .and_then(|i| children.get(i))
                .ok_or_else(|| InvalidPathError::OutOfRange {
                    path: path.clone(),
                    depth,
                    index,
                    child_count: children.len(),
                })?;
        }

        Ok(node)
    }

    /// Every addressable node with its path, in pre-order.
    #[must_use]
    pub fn walk(&self) -> Vec<(StepPath, &StepNode)> {
        fn visit<'a>(node: &'a StepNode, path: &StepPath, out: &mut Vec<(StepPath, &'a StepNode)>) {
            for (child_path, child) in child_paths(path, node.children()) {
                out.push((child_path.clone(), child));
                visit(child, &child_path, out);
            }
        }

        let mut out = Vec::new();
        visit(&self.root, &StepPath::root(), &mut out);
        out
    }

    /// Paths of every container and leaf, in pre-order.
    #[must_use]
    pub fn all_paths(&self) -> Vec<StepPath> {
        self.walk().into_iter().map(|(path, _)| path).collect()
    }

    /// Number of addressable steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.walk().len()
    }

    /// A serialisable view of the tree structure.
    #[must_use]
    pub fn describe(&self) -> Vec<StepDescription> {
        child_paths(&StepPath::root(), self.top_level())
            .map(|(path, node)| StepDescription::of(node, path))
            .collect()
    }
}

/// Pairs each child with its path below `parent`.
pub(crate) fn child_paths<'a>(
    parent: &StepPath,
    children: &'a [StepNode],
) -> impl Iterator<Item = (StepPath, &'a StepNode)> + 'a {
    let parent = parent.clone();
    (1u32..).zip(children).map(move |(index, child)| (parent.child(index), child))
}
