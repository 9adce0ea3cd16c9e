use clap::Args;
use serde::Serialize;

use launchpad::deploy::Provider;
use launchpad::env::{self, EnvVarStatus};
use launchpad::pipeline::{self, PipelineRunResult, PipelineRunStatus, ProjectStepExecutor};
use launchpad::project::Project;
use launchpad::utils::command::CommandRunner;

use super::{CmdResult, PipelineArgs};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Working directory for build, lint and test commands and for artifact paths
    #[arg(long)]
    pub cwd: Option<String>,
}

#[derive(Serialize)]
pub struct RunOutput {
    pub command: String,
    pub config_path: String,
    pub env: Vec<EnvVarStatus>,
    pub result: PipelineRunResult,
}

pub fn run(args: RunArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<RunOutput> {
    let loaded = args.pipeline.load()?;
    let resolved = env::from_process(&loaded.config.env, loaded.environment);

    let provider = Provider::from_config(&loaded.config.provider, &resolved, args.cwd.as_deref());
    let project = Project::from_config(&loaded.config.project);
    let executor = ProjectStepExecutor::new(project, provider, loaded.environment)
        .with_runner(CommandRunner::new().with_env(resolved.values().clone()))
        .with_cwd(args.cwd);

    let result = pipeline::run(&loaded.config.steps, loaded.environment, &executor);
    let exit_code = if result.status == PipelineRunStatus::Failed { 1 } else { 0 };

    Ok((
        RunOutput {
            command: "pipeline.run".to_string(),
            config_path: loaded.path,
            env: resolved.report,
            result,
        },
        exit_code,
    ))
}
