//! Serialisable view of a step tree's structure.

use super::tree::{child_paths, StepKind, StepNode};
use crate::core::{ParameterSchema, StepPath};
use serde::Serialize;

/// One node of the structure view, as rendered by pipeline visualisers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDescription {
    /// The step name.
    pub name: String,
    /// `"action"`, `"container"` or `"parallel"`.
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Canonical path of the step.
    #[serde(rename = "step-id")]
    pub step_id: StepPath,
    /// Set for manual actions.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub manual: bool,
    /// Parameters a manual action asks for.
    #[serde(skip_serializing_if = "ParameterSchema::is_empty")]
    pub parameters: ParameterSchema,
    /// Child steps of a container.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StepDescription>,
}

impl StepDescription {
    pub(crate) fn of(node: &StepNode, path: StepPath) -> Self {
        let (manual, parameters) = node
            .as_action()
            .map(|action| (action.manual, action.parameters.clone()))
            .unwrap_or_default();

        let children = child_paths(&path, node.children())
            .map(|(child_path, child)| Self::of(child, child_path))
            .collect();

        Self {
            name: node.name().to_string(),
            kind: node.kind(),
            step_id: path,
            manual,
            parameters,
            children,
        }
    }
}
