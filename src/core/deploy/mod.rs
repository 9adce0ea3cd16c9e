//! Deployment orchestration.
//!
//! [`Provider`] classifies each environment's target once, then routes a
//! deploy request to exactly one strategy. All I/O goes through the injected
//! adapters in [`ProviderAdapters`].

mod artifact;
mod container;
pub mod poller;
mod remote;
pub mod target;

pub use artifact::{CDN_INVALIDATION, FUNCTION_UPDATE, SERVICE_REDEPLOY, STORAGE_SYNC};
pub use poller::{PollSettings, PollState, PollStatus, Sleeper, StabilizationPoller, ThreadSleeper};
pub use target::{
    ArtifactTarget, ContainerTarget, DeploymentTarget, RemoteHostTarget, SUPPORTED_TARGET_FIELDS,
};

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::cloud::{ArtifactPublisher, AwsCli, CloudCredentials, ControlPlane};
use crate::config::{Environment, ProviderConfig, ProviderKind, ProviderSettings};
use crate::env::ResolvedEnv;
use crate::error::{Error, Result};
use crate::project::ProjectHandle;
use crate::ssh::{RemoteShell, SshClient};

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentOutcome {
    pub succeeded: bool,
    pub message: String,
    pub duration_ms: u64,
    pub environment: Environment,
    pub strategy: String,
}

/// I/O seams used by the strategies.
#[derive(Clone)]
pub struct ProviderAdapters {
    pub control_plane: Arc<dyn ControlPlane>,
    pub publisher: Arc<dyn ArtifactPublisher>,
    pub remote: Arc<dyn RemoteShell>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl ProviderAdapters {
    /// Production adapters: the `aws` CLI, the system `ssh` binary and real sleeps.
    /// Artifact paths resolve against `cwd` when given.
    pub fn aws(credentials: &CloudCredentials, cwd: Option<&str>) -> Self {
        let cli = Arc::new(AwsCli::new(credentials).with_cwd(cwd.map(str::to_string)));
        Self {
            control_plane: cli.clone(),
            publisher: cli,
            remote: Arc::new(SshClient::new()),
            sleeper: Arc::new(ThreadSleeper),
        }
    }
}

/// Classified target per configured environment. `None` means the
/// environment has settings but none of them form a recognizable target.
pub type TargetMap = BTreeMap<Environment, Option<DeploymentTarget>>;

pub struct Provider {
    targets: TargetMap,
    poll: PollSettings,
    adapters: ProviderAdapters,
}

impl Provider {
    pub fn new(targets: TargetMap, poll: PollSettings, adapters: ProviderAdapters) -> Self {
        Self {
            targets,
            poll,
            adapters,
        }
    }

    pub fn from_settings(settings: &ProviderSettings, adapters: ProviderAdapters) -> Self {
        let targets = settings
            .targets()
            .into_iter()
            .map(|(env, config)| (env, DeploymentTarget::classify(config)))
            .collect();

        Self::new(targets, settings.poll_settings(), adapters)
    }

    /// Build the production provider for a config block, with credentials
    /// taken from the resolved environment.
    pub fn from_config(config: &ProviderConfig, env: &ResolvedEnv, cwd: Option<&str>) -> Self {
        match config.kind {
            ProviderKind::Aws => {
                let credentials = CloudCredentials::resolve(&config.config, env);
                log_status!("provider", "AWS region {}", credentials.region);
                Self::from_settings(&config.config, ProviderAdapters::aws(&credentials, cwd))
            }
        }
    }

    /// True when at least one environment has a recognizable target.
    pub fn is_deployment_required(&self) -> bool {
        self.targets.values().any(Option::is_some)
    }

    pub fn targets(&self) -> &TargetMap {
        &self.targets
    }

    pub fn target(&self, environment: Environment) -> Option<&DeploymentTarget> {
        self.targets.get(&environment).and_then(Option::as_ref)
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    pub fn deploy(
        &self,
        environment: Environment,
        project: Option<&dyn ProjectHandle>,
    ) -> Result<DeploymentOutcome> {
        let classified = self.targets.get(&environment).ok_or_else(|| {
            Error::environment_not_configured(
                environment.as_str(),
                self.targets.keys().map(|env| env.to_string()).collect(),
            )
        })?;
        let target = classified
            .as_ref()
            .ok_or_else(|| Error::no_valid_target(environment.as_str()))?;

        let strategy = target.strategy_name();
        log_status!("deploy", "Deploying {} via {}", environment, strategy);
        let started = Instant::now();

        let message = match target {
            DeploymentTarget::ContainerService(container_target) => {
                let poller = StabilizationPoller::new(self.poll, self.adapters.sleeper.as_ref());
                container::deploy(
                    container_target,
                    self.adapters.control_plane.as_ref(),
                    &poller,
                )?
            }
            DeploymentTarget::RemoteHost(host_target) => {
                remote::deploy(host_target, self.adapters.remote.as_ref(), project)?
            }
            DeploymentTarget::ArtifactSync(artifact_target) => artifact::deploy(
                artifact_target,
                self.adapters.publisher.as_ref(),
                self.adapters.control_plane.as_ref(),
            )?,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        log_status!("deploy", "{} ({} ms)", message, duration_ms);

        Ok(DeploymentOutcome {
            succeeded: true,
            message,
            duration_ms,
            environment,
            strategy: strategy.to_string(),
        })
    }
}
