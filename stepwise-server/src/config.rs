//! Server configuration
//!
//! Command-line flags with environment variable fallbacks.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use stepwise::config::EngineConfig;

/// Shape of the `/api/pipeline-state` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StateMode {
    /// `{buildId: {stepId: result}}` for every build, or just the one named
    /// by `build=`.
    #[default]
    AllBuilds,
    /// `{stepId: result}` for the build named by `build=`, or the most
    /// recent one.
    SingleBuild,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "stepwise-server")]
#[command(about = "Stepwise build pipeline server", long_about = None)]
pub struct Cli {
    /// Pipeline definition file (JSON)
    #[arg(long, env = "STEPWISE_PIPELINE")]
    pub pipeline: PathBuf,

    /// Address to listen on
    #[arg(long, env = "STEPWISE_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Response shape of the pipeline state endpoint
    #[arg(long, env = "STEPWISE_STATE_MODE", value_enum, default_value_t = StateMode::AllBuilds)]
    pub state_mode: StateMode,

    /// Seconds a manual step waits for its trigger before failing
    #[arg(long, env = "STEPWISE_TRIGGER_TIMEOUT", value_parser = parse_trigger_timeout)]
    pub trigger_timeout: Option<f64>,

    /// Maximum number of actions running at once
    #[arg(long, env = "STEPWISE_MAX_CONCURRENT_ACTIONS")]
    pub max_concurrent_actions: Option<usize>,

    /// Start a build as soon as the server is up
    #[arg(long)]
    pub start_build: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "STEPWISE_LOG_JSON")]
    pub log_json: bool,
}

/// Accepts a positive number of seconds that fits in a [`Duration`].
fn parse_trigger_timeout(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|e| format!("'{value}' is not a number: {e}"))?;
    if seconds <= 0.0 || Duration::try_from_secs_f64(seconds).is_err() {
        return Err(format!("'{value}' is not a usable number of seconds"));
    }
    Ok(seconds)
}

impl Cli {
    /// Engine settings derived from the flags.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new();
        if let Some(seconds) = self.trigger_timeout {
            config = config.with_trigger_timeout(seconds);
        }
        if let Some(limit) = self.max_concurrent_actions {
            config = config.with_max_concurrent_actions(limit);
        }
        config
    }
}
