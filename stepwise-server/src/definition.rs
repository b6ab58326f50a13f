//! Pipeline definition files.
//!
//! A definition is a JSON document naming the pipeline and listing its
//! top-level steps. The root is an implicit sequence:
//!
//! ```json
//! {
//!   "name": "root",
//!   "steps": [
//!     {"type": "action", "name": "build", "run": "make"},
//!     {"type": "parallel", "name": "tests", "steps": [
//!       {"type": "action", "name": "unit", "run": "make test"}
//!     ]},
//!     {"type": "action", "name": "deploy", "manual": true,
//!      "parameters": {"env": {"desc": "target environment"}}}
//!   ]
//! }
//! ```

use crate::actions::ShellAction;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use stepwise::actions::{ActionHandler, NoOpAction};
use stepwise::core::ParameterSchema;
use stepwise::errors::PipelineValidationError;
use stepwise::pipeline::{ActionStep, StepNode, StepTree};
use thiserror::Error;

/// Errors raised while loading a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file could not be read.
    #[error("Failed to read pipeline definition: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not a valid definition.
    #[error("Failed to parse pipeline definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// The definition describes an invalid tree.
    #[error("Invalid pipeline definition: {0}")]
    Invalid(#[from] PipelineValidationError),
}

/// A whole pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name.
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    /// Top-level steps.
    pub steps: Vec<StepDefinition>,
}

fn default_pipeline_name() -> String {
    "root".to_string()
}

/// One step of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepDefinition {
    /// A leaf step.
    Action {
        /// Step name.
        name: String,
        /// Shell command to execute. Without one the step succeeds and
        /// echoes its parameters.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        run: Option<String>,
        /// Whether the step waits for a trigger.
        #[serde(default)]
        manual: bool,
        /// Parameters a manual step asks for.
        #[serde(default, skip_serializing_if = "ParameterSchema::is_empty")]
        parameters: ParameterSchema,
    },
    /// Children run one after another.
    #[serde(alias = "container")]
    Sequence {
        /// Container name.
        name: String,
        /// Child steps.
        steps: Vec<StepDefinition>,
    },
    /// Children run concurrently.
    Parallel {
        /// Container name.
        name: String,
        /// Child steps.
        steps: Vec<StepDefinition>,
    },
}

impl PipelineDefinition {
    /// Reads and parses a definition file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a definition from JSON text.
    pub fn from_json(content: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Compiles the definition into a validated step tree.
    pub fn compile(&self) -> Result<StepTree, DefinitionError> {
        let noop: Arc<dyn ActionHandler> = Arc::new(NoOpAction);
        let children = self.steps.iter().map(|step| step.to_node(&noop)).collect();
        Ok(StepTree::new(StepNode::sequence(self.name.clone(), children))?)
    }
}

impl StepDefinition {
    fn to_node(&self, noop: &Arc<dyn ActionHandler>) -> StepNode {
        match self {
            Self::Action {
                name,
                run,
                manual,
                parameters,
            } => {
                let handler: Arc<dyn ActionHandler> = match run {
                    Some(command) => Arc::new(ShellAction::new(command.clone())),
                    None => Arc::clone(noop),
                };
                // Parameters on a non-manual action are kept so that tree
                // validation rejects them.
                StepNode::Action(ActionStep {
                    name: name.clone(),
                    manual: *manual,
                    parameters: parameters.clone(),
                    handler,
                })
            }
            Self::Sequence { name, steps } => StepNode::sequence(
                name.clone(),
                steps.iter().map(|step| step.to_node(noop)).collect(),
            ),
            Self::Parallel { name, steps } => StepNode::parallel(
                name.clone(),
                steps.iter().map(|step| step.to_node(noop)).collect(),
            ),
        }
    }
}
