use serde::Deserialize;
use std::sync::Arc;

use super::{ArtifactPublisher, CloudCredentials, ControlPlane, RolloutState};
use crate::error::{Error, ErrorCode, Result};
use crate::utils::command::{CommandRunner, NullSink};
use crate::utils::shell;

/// Cloud adapter that drives the `aws` command line tool.
///
/// Each call spawns one `aws` process with the credentials set on that child
/// only. JSON responses are parsed into the minimal shapes below.
pub struct AwsCli {
    binary: String,
    runner: CommandRunner,
    cwd: Option<String>,
}

impl AwsCli {
    pub fn new(credentials: &CloudCredentials) -> Self {
        Self {
            binary: "aws".to_string(),
            runner: CommandRunner::new()
                .with_env(credentials.to_env())
                .with_sink(Arc::new(NullSink)),
            cwd: None,
        }
    }

    /// Directory relative artifact paths (`dist`, `function.zip`) resolve against.
    pub fn with_cwd(mut self, cwd: Option<String>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn call(&self, operation: &str, args: &[&str]) -> Result<String> {
        let mut argv = vec![self.binary.as_str()];
        argv.extend_from_slice(args);
        let command = shell::join_args(&argv);

        log_status!("aws", "{}", operation);

        self.runner
            .run(&command, self.cwd.as_deref())
            .map(|output| output.stdout)
            .map_err(|err| request_failed(operation, err))
    }

    fn call_json<T: for<'de> Deserialize<'de>>(&self, operation: &str, args: &[&str]) -> Result<T> {
        let mut full_args = args.to_vec();
        full_args.extend_from_slice(&["--output", "json"]);
        let stdout = self.call(operation, &full_args)?;
        serde_json::from_str(&stdout)
            .map_err(|e| Error::provider_invalid_response(operation, e.to_string()))
    }
}

fn request_failed(operation: &str, err: Error) -> Error {
    let cause = err.details["stderr"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| err.details["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| err.message.clone());

    // sh reports a missing binary as exit 127
    let not_found = err.code == ErrorCode::ExecSpawnFailed || err.details["exitCode"] == 127;
    let wrapped = Error::provider_request_failed(operation, cause);
    if not_found {
        wrapped.with_hint("Install the AWS CLI and make sure `aws` is on PATH")
    } else {
        wrapped
    }
}

#[derive(Debug, Deserialize)]
struct UpdateServiceResponse {
    service: Option<EcsService>,
}

#[derive(Debug, Deserialize)]
struct DescribeServicesResponse {
    #[serde(default)]
    services: Vec<EcsService>,
    #[serde(default)]
    failures: Vec<EcsFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsService {
    #[serde(default)]
    deployments: Vec<EcsDeployment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsDeployment {
    id: Option<String>,
    status: Option<String>,
    rollout_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EcsFailure {
    arn: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInvalidationResponse {
    invalidation: Invalidation,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Invalidation {
    id: String,
}

const UPDATE_SERVICE: &str = "ecs update-service";
const DESCRIBE_SERVICES: &str = "ecs describe-services";

fn deployment_id(response: UpdateServiceResponse) -> Result<String> {
    let deployments = response.service.map(|s| s.deployments).unwrap_or_default();

    deployments
        .iter()
        .find(|d| d.status.as_deref() == Some("PRIMARY"))
        .or_else(|| deployments.first())
        .and_then(|d| d.id.clone())
        .ok_or_else(|| Error::provider_invalid_response(UPDATE_SERVICE, "Response contains no deployment id"))
}

fn rollout_state(response: DescribeServicesResponse) -> Result<RolloutState> {
    let Some(service) = response.services.into_iter().next() else {
        let reason = response
            .failures
            .first()
            .map(|f| {
                format!(
                    "{} ({})",
                    f.reason.as_deref().unwrap_or("unknown failure"),
                    f.arn.as_deref().unwrap_or("unknown service")
                )
            })
            .unwrap_or_else(|| "Service not found".to_string());
        return Err(Error::provider_invalid_response(DESCRIBE_SERVICES, reason));
    };

    Ok(service
        .deployments
        .first()
        .and_then(|d| d.rollout_state.as_deref())
        .map(RolloutState::parse)
        .unwrap_or_else(|| RolloutState::Unknown(String::new())))
}

impl ControlPlane for AwsCli {
    fn update_service(&self, cluster: &str, service: &str) -> Result<String> {
        let response: UpdateServiceResponse = self.call_json(
            UPDATE_SERVICE,
            &[
                "ecs",
                "update-service",
                "--cluster",
                cluster,
                "--service",
                service,
                "--force-new-deployment",
            ],
        )?;
        deployment_id(response)
    }

    fn describe_service(&self, cluster: &str, service: &str) -> Result<RolloutState> {
        let response: DescribeServicesResponse = self.call_json(
            DESCRIBE_SERVICES,
            &["ecs", "describe-services", "--cluster", cluster, "--services", service],
        )?;
        rollout_state(response)
    }
}

impl ArtifactPublisher for AwsCli {
    fn sync_bucket(&self, source_dir: &str, bucket: &str) -> Result<()> {
        let destination = format!("s3://{}", bucket);
        self.call(
            "s3 sync",
            &["s3", "sync", source_dir, &destination, "--delete", "--no-progress"],
        )?;
        Ok(())
    }

    fn update_function_code(&self, function: &str, archive: &str) -> Result<()> {
        let zip_file = format!("fileb://{}", archive);
        let _: serde_json::Value = self.call_json(
            "lambda update-function-code",
            &[
                "lambda",
                "update-function-code",
                "--function-name",
                function,
                "--zip-file",
                &zip_file,
            ],
        )?;
        Ok(())
    }

    fn invalidate_distribution(&self, distribution: &str) -> Result<String> {
        let response: CreateInvalidationResponse = self.call_json(
            "cloudfront create-invalidation",
            &[
                "cloudfront",
                "create-invalidation",
                "--distribution-id",
                distribution,
                "--paths",
                "/*",
            ],
        )?;
        Ok(response.invalidation.id)
    }
}
