//! Shell command action handler
//!
//! Runs a definition's `run` command with `sh -c`. Trigger parameters are
//! exported as `STEPWISE_PARAM_<NAME>` environment variables.

use async_trait::async_trait;
use stepwise::actions::{ActionContext, ActionHandler, ActionOutcome};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs a shell command; the exit status decides success.
#[derive(Debug, Clone)]
pub struct ShellAction {
    command: String,
}

impl ShellAction {
    /// Creates a handler for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The command line.
    pub fn command(&self) -> &str {
        &self.command
    }
}

/// Environment variable name for a trigger parameter.
pub fn parameter_env_name(name: &str) -> String {
    let mangled: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("STEPWISE_PARAM_{mangled}")
}

#[async_trait]
impl ActionHandler for ShellAction {
    async fn run(&self, ctx: &ActionContext) -> ActionOutcome {
        debug!(
            build_id = %ctx.build_id,
            step_id = %ctx.path,
            command = %self.command,
            "Executing process"
        );

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .env("STEPWISE_BUILD_ID", ctx.build_id.as_str())
            .env("STEPWISE_STEP_ID", ctx.path.to_string())
            .kill_on_drop(true);

        for (name, value) in &ctx.parameters {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            command.env(parameter_env_name(name), value);
        }

        let output = match command.output().await {
            Ok(output) => output,
            Err(e) => {
                warn!(step_id = %ctx.path, error = %e, "Failed to start process");
                return ActionOutcome::failure(format!("failed to start '{}': {e}", self.command));
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            ActionOutcome::success(text)
        } else {
            if text.is_empty() {
                text = format!("process exited with {}", output.status);
            }
            ActionOutcome::failure(text)
        }
    }
}
