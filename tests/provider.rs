use std::sync::{Arc, Mutex};
use std::time::Duration;

use launchpad::cloud::{ArtifactPublisher, ControlPlane, RolloutState};
use launchpad::config::{
    self, ConfigFormat, Environment, ProjectKind, ProjectSettings, ProviderSettings, StepKind,
    TargetConfig,
};
use launchpad::deploy::{Provider, ProviderAdapters, Sleeper};
use launchpad::error::{Error, ErrorCode, ErrorKind, Result};
use launchpad::pipeline::{self, PipelineRunStatus, ProjectStepExecutor};
use launchpad::project::{Project, ProjectHandle};
use launchpad::ssh::{CommandOutput, RemoteShell};
use launchpad::utils::command::{CommandRunner, NullSink};

/// Records every adapter call. `completed_on` is the 1-based status check
/// that first reports COMPLETED; `failing` makes calls whose name matches fail.
#[derive(Default)]
struct FakeCloud {
    completed_on: Option<u32>,
    failing: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
    describes: Mutex<u32>,
    sleeps: Mutex<u32>,
}

impl FakeCloud {
    fn record(&self, name: &'static str, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(&name) {
            return Err(Error::provider_request_failed(name, "simulated failure"));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl ControlPlane for FakeCloud {
    fn update_service(&self, cluster: &str, service: &str) -> Result<String> {
        self.record("update", format!("update {} {}", cluster, service))?;
        Ok("ecs-svc/42".to_string())
    }

    fn describe_service(&self, cluster: &str, service: &str) -> Result<RolloutState> {
        self.record("describe", format!("describe {} {}", cluster, service))?;
        let mut describes = self.describes.lock().unwrap();
        *describes += 1;
        match self.completed_on {
            Some(n) if *describes >= n => Ok(RolloutState::Completed),
            _ => Ok(RolloutState::InProgress),
        }
    }
}

impl ArtifactPublisher for FakeCloud {
    fn sync_bucket(&self, source_dir: &str, bucket: &str) -> Result<()> {
        self.record("sync", format!("sync {} {}", source_dir, bucket))
    }

    fn update_function_code(&self, function: &str, archive: &str) -> Result<()> {
        self.record("function", format!("function {} {}", function, archive))
    }

    fn invalidate_distribution(&self, distribution: &str) -> Result<String> {
        self.record("invalidate", format!("invalidate {}", distribution))?;
        Ok("I2J0".to_string())
    }
}

impl RemoteShell for FakeCloud {
    fn run_remote(&self, host: &str, user: &str, _key_path: &str, command: &str) -> CommandOutput {
        self.calls
            .lock()
            .unwrap()
            .push(format!("ssh {}@{} {}", user, host, command));
        let failed = self.failing.iter().any(|needle| command.contains(needle));
        CommandOutput {
            stdout: String::new(),
            stderr: if failed { "remote error".to_string() } else { String::new() },
            success: !failed,
            exit_code: if failed { 1 } else { 0 },
        }
    }
}

impl Sleeper for FakeCloud {
    fn sleep(&self, _duration: Duration) {
        *self.sleeps.lock().unwrap() += 1;
    }
}

fn provider_with(fake: Arc<FakeCloud>, dev: TargetConfig) -> Provider {
    let settings = ProviderSettings {
        dev: Some(dev),
        ..Default::default()
    };
    let adapters = ProviderAdapters {
        control_plane: fake.clone(),
        publisher: fake.clone(),
        remote: fake.clone(),
        sleeper: fake,
    };
    Provider::from_settings(&settings, adapters)
}

fn opt(value: &str) -> Option<String> {
    Some(value.to_string())
}

struct Commands(Vec<&'static str>);

impl ProjectHandle for Commands {
    fn deployment_commands(&self) -> Vec<String> {
        self.0.iter().map(|c| c.to_string()).collect()
    }
}

fn container() -> TargetConfig {
    TargetConfig {
        cluster: opt("c1"),
        service: opt("s1"),
        ..Default::default()
    }
}

#[test]
fn container_target_stabilizing_immediately_takes_one_check() {
    let fake = Arc::new(FakeCloud {
        completed_on: Some(1),
        ..Default::default()
    });
    let provider = provider_with(fake.clone(), container());

    let outcome = provider.deploy(Environment::Dev, None).unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.strategy, "container_service");
    assert!(outcome.message.contains("ecs-svc/42"));
    assert_eq!(fake.calls(), vec!["update c1 s1", "describe c1 s1"]);
    assert_eq!(*fake.sleeps.lock().unwrap(), 0);
}

#[test]
fn container_target_issues_one_update_regardless_of_polling() {
    for n in [1u32, 4, 10] {
        let fake = Arc::new(FakeCloud {
            completed_on: Some(n),
            ..Default::default()
        });
        let provider = provider_with(fake.clone(), container());

        provider.deploy(Environment::Dev, None).unwrap();

        assert_eq!(fake.count("update"), 1);
        assert_eq!(fake.count("describe"), n as usize);
        assert_eq!(*fake.sleeps.lock().unwrap(), n - 1);
    }
}

#[test]
fn container_target_that_never_stabilizes_times_out_after_ten_checks() {
    let fake = Arc::new(FakeCloud::default());
    let provider = provider_with(fake.clone(), container());

    let err = provider.deploy(Environment::Dev, None).unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployStabilizationTimeout);
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.message, "Service did not stabilize in time");
    assert_eq!(fake.count("describe"), 10);
    assert_eq!(fake.count("update"), 1);
}

#[test]
fn remote_host_runs_pull_then_project_commands() {
    let fake = Arc::new(FakeCloud::default());
    let provider = provider_with(
        fake.clone(),
        TargetConfig {
            host: opt("h"),
            user: opt("u"),
            key_path: opt("k"),
            app_path: opt("/app"),
            ..Default::default()
        },
    );
    let project = Commands(vec!["build", "restart"]);

    let outcome = provider.deploy(Environment::Dev, Some(&project)).unwrap();

    assert_eq!(outcome.strategy, "remote_host");
    assert_eq!(
        fake.calls(),
        vec![
            "ssh u@h cd '/app' && git pull origin main",
            "ssh u@h cd '/app' && build",
            "ssh u@h cd '/app' && restart",
        ]
    );
}

#[test]
fn remote_host_failed_pull_runs_no_project_commands() {
    let fake = Arc::new(FakeCloud {
        failing: vec!["git pull"],
        ..Default::default()
    });
    let provider = provider_with(
        fake.clone(),
        TargetConfig {
            host: opt("h"),
            user: opt("u"),
            key_path: opt("k"),
            app_path: opt("/app"),
            ..Default::default()
        },
    );
    let project = Commands(vec!["build", "restart"]);

    let err = provider.deploy(Environment::Dev, Some(&project)).unwrap_err();

    assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    assert_eq!(err.details["stderr"], "remote error");
    assert_eq!(fake.calls().len(), 1);
}

#[test]
fn artifact_storage_failure_stops_before_function_update() {
    let fake = Arc::new(FakeCloud {
        failing: vec!["sync"],
        ..Default::default()
    });
    let provider = provider_with(
        fake.clone(),
        TargetConfig {
            bucket: opt("site"),
            lambda_function: opt("api"),
            ..Default::default()
        },
    );

    let err = provider.deploy(Environment::Dev, None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(err.details["operation"], "storage_sync");
    assert_eq!(fake.calls(), vec!["sync dist site"]);
}

#[test]
fn artifact_target_runs_every_configured_operation() {
    let fake = Arc::new(FakeCloud::default());
    let provider = provider_with(
        fake.clone(),
        TargetConfig {
            bucket: opt("site"),
            lambda_function: opt("api"),
            ecs_service: opt("worker"),
            cloud_front_distribution: opt("E123"),
            source_dir: opt("out"),
            ..Default::default()
        },
    );

    provider.deploy(Environment::Dev, None).unwrap();

    assert_eq!(
        fake.calls(),
        vec![
            "sync out site",
            "function api function.zip",
            "update default worker",
            "invalidate E123",
        ]
    );
    assert_eq!(fake.count("describe"), 0);
}

#[test]
fn empty_target_is_not_deployable() {
    let fake = Arc::new(FakeCloud::default());
    let provider = provider_with(fake.clone(), TargetConfig::default());

    assert!(!provider.is_deployment_required());
    let err = provider.deploy(Environment::Dev, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(fake.calls().is_empty());
}

#[test]
fn provider_built_from_yaml_config() {
    let yaml = r#"
project:
  type: node
provider:
  type: aws
  config:
    pollAttempts: 2
    pollIntervalMs: 1
    staging:
      cluster: web
      service: api
steps: [deploy]
"#;
    let config = config::parse(yaml, ConfigFormat::Yaml).unwrap();
    let fake = Arc::new(FakeCloud::default());
    let adapters = ProviderAdapters {
        control_plane: fake.clone(),
        publisher: fake.clone(),
        remote: fake.clone(),
        sleeper: fake.clone(),
    };
    let provider = Provider::from_settings(&config.provider.config, adapters);

    assert!(provider.is_deployment_required());
    let err = provider.deploy(Environment::Staging, None).unwrap_err();
    assert_eq!(err.code, ErrorCode::DeployStabilizationTimeout);
    assert_eq!(fake.count("describe"), 2);

    let err = provider.deploy(Environment::Prod, None).unwrap_err();
    assert_eq!(err.code, ErrorCode::DeployEnvironmentNotConfigured);
}

#[test]
fn pipeline_skips_deploy_without_target() {
    let fake = Arc::new(FakeCloud::default());
    let provider = provider_with(fake.clone(), TargetConfig::default());
    let project = Project::new(ProjectKind::Node, ProjectSettings::default());
    let executor = ProjectStepExecutor::new(project, provider, Environment::Dev);

    let result = pipeline::run(&[StepKind::Deploy], Environment::Dev, &executor);

    assert_eq!(result.status, PipelineRunStatus::Skipped);
    assert_eq!(result.steps[0].status, PipelineRunStatus::Skipped);
    assert!(result.steps[0].warnings[0].contains("cluster + service"));
    assert!(fake.calls().is_empty());
}

#[test]
fn pipeline_deploys_after_successful_steps() {
    let fake = Arc::new(FakeCloud {
        completed_on: Some(1),
        ..Default::default()
    });
    let provider = provider_with(fake.clone(), container());
    let project = Project::new(ProjectKind::Node, ProjectSettings::default());
    let executor = ProjectStepExecutor::new(project, provider, Environment::Dev);

    let result = pipeline::run(&[StepKind::Deploy], Environment::Dev, &executor);

    assert_eq!(result.status, PipelineRunStatus::Success);
    let data = result.steps[0].data.as_ref().unwrap();
    assert_eq!(data["strategy"], "container_service");
    assert_eq!(data["environment"], "dev");
}

#[test]
fn pipeline_failure_skips_deploy() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeCloud::default());
    let provider = provider_with(fake.clone(), container());
    let project = Project::new(ProjectKind::Rust, ProjectSettings::default());
    let executor = ProjectStepExecutor::new(project, provider, Environment::Dev)
        .with_runner(CommandRunner::new().with_sink(Arc::new(NullSink)))
        .with_cwd(Some(dir.path().display().to_string()));

    // No Cargo.toml in the empty directory, so the test step fails.
    let result = pipeline::run(&[StepKind::Test, StepKind::Deploy], Environment::Dev, &executor);

    assert_eq!(result.status, PipelineRunStatus::Failed);
    assert_eq!(result.steps[0].status, PipelineRunStatus::Failed);
    assert_eq!(result.steps[0].error_code.as_deref(), Some("exec.command_failed"));
    assert_eq!(
        result.steps[1].warnings,
        vec!["Skipped because 'test' did not succeed"]
    );
    assert!(fake.calls().is_empty());
}
