use clap::Args;
use serde::Serialize;

use launchpad::config::{Environment, StepKind};
use launchpad::deploy::{DeploymentTarget, Provider, TargetMap};
use launchpad::env::{self, EnvVarStatus};
use launchpad::project::{Project, ProjectHandle};

use super::{CmdResult, PipelineArgs};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Serialize)]
pub struct CheckOutput {
    pub command: String,
    pub config_path: String,
    pub environment: Environment,
    pub steps: Vec<StepKind>,
    pub deployment_required: bool,
    pub targets: TargetMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub deployment_commands: Vec<String>,
    pub env: Vec<EnvVarStatus>,
    pub missing_env: Vec<String>,
}

/// Show how the pipeline file is interpreted. Performs no commands or cloud calls.
pub fn run(args: CheckArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<CheckOutput> {
    let loaded = args.pipeline.load()?;
    let resolved = env::from_process(&loaded.config.env, loaded.environment);

    let provider = Provider::from_config(&loaded.config.provider, &resolved, None);
    let project = Project::from_config(&loaded.config.project);

    let strategy = provider
        .target(loaded.environment)
        .map(DeploymentTarget::strategy_name)
        .map(str::to_string);
    let missing_env = resolved
        .missing()
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok((
        CheckOutput {
            command: "config.check".to_string(),
            config_path: loaded.path,
            environment: loaded.environment,
            steps: loaded.config.steps,
            deployment_required: provider.is_deployment_required(),
            targets: provider.targets().clone(),
            strategy,
            deployment_commands: project.deployment_commands(),
            env: resolved.report,
            missing_env,
        },
        0,
    ))
}
