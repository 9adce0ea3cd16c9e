use clap::Args;
use std::path::PathBuf;

use launchpad::config::{self, Environment, PipelineConfig, DEFAULT_CONFIG_PATH};
use launchpad::log_status;

pub type CmdResult<T> = launchpad::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Config file and environment selection shared by every subcommand.
#[derive(Args, Default, Debug)]
pub struct PipelineArgs {
    /// Pipeline file (defaults to $CONFIG_PATH, then config.yml)
    pub config: Option<String>,

    /// Target environment (dev, staging, prod); overrides the file's `environment`
    #[arg(long, short = 'e')]
    pub env: Option<String>,
}

/// A loaded pipeline file plus the environment this invocation targets.
pub struct LoadedPipeline {
    pub path: String,
    pub config: PipelineConfig,
    pub environment: Environment,
}

impl PipelineArgs {
    /// Path precedence: positional argument, `CONFIG_PATH`, `config.yml`.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| std::env::var("CONFIG_PATH").ok().filter(|p| !p.is_empty()))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(&self) -> launchpad::Result<LoadedPipeline> {
        let path = self.config_path();
        log_status!("config", "Loading {}", path.display());
        let config = config::load(&path)?;

        let environment = match &self.env {
            Some(raw) => raw.parse::<Environment>()?,
            None => config.environment,
        };

        Ok(LoadedPipeline {
            path: path.display().to_string(),
            config,
            environment,
        })
    }
}

pub mod check;
pub mod deploy;
pub mod run;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (launchpad::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Check(args) => dispatch!(args, global, check),
    }
}
