use clap::Args;
use serde::Serialize;

use launchpad::deploy::{DeploymentOutcome, Provider};
use launchpad::env;
use launchpad::project::Project;

use super::{CmdResult, PipelineArgs};

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Serialize)]
pub struct DeployOutput {
    pub command: String,
    pub config_path: String,
    pub outcome: DeploymentOutcome,
}

/// Run only the deploy step, without the pipeline's build, lint and test.
pub fn run(args: DeployArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DeployOutput> {
    let loaded = args.pipeline.load()?;
    let resolved = env::from_process(&loaded.config.env, loaded.environment);

    let provider = Provider::from_config(&loaded.config.provider, &resolved, None);
    let project = Project::from_config(&loaded.config.project);

    let outcome = provider
        .deploy(loaded.environment, Some(&project))
        .map_err(|e| {
            if provider.is_deployment_required() {
                e
            } else {
                e.with_hint(format!(
                    "Configure a target for '{}' in {}",
                    loaded.environment, loaded.path
                ))
            }
        })?;

    Ok((
        DeployOutput {
            command: "deploy.run".to_string(),
            config_path: loaded.path,
            outcome,
        },
        0,
    ))
}
