use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidValue,
    ConfigParseFailed,

    ValidationInvalidArgument,

    DeployEnvironmentNotConfigured,
    DeployNoValidTarget,
    DeployStabilizationTimeout,

    ExecCommandFailed,
    ExecSpawnFailed,
    RemoteCommandFailed,

    ProviderRequestFailed,
    ProviderInvalidResponse,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

/// Coarse failure taxonomy used for exit codes and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Exec,
    Provider,
    Timeout,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigParseFailed => "config.parse_failed",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::DeployEnvironmentNotConfigured => "deploy.environment_not_configured",
            ErrorCode::DeployNoValidTarget => "deploy.no_valid_target",
            ErrorCode::DeployStabilizationTimeout => "deploy.stabilization_timeout",

            ErrorCode::ExecCommandFailed => "exec.command_failed",
            ErrorCode::ExecSpawnFailed => "exec.spawn_failed",
            ErrorCode::RemoteCommandFailed => "remote.command_failed",

            ErrorCode::ProviderRequestFailed => "provider.request_failed",
            ErrorCode::ProviderInvalidResponse => "provider.invalid_response",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ConfigMissingKey
            | ErrorCode::ConfigInvalidValue
            | ErrorCode::ConfigParseFailed
            | ErrorCode::ValidationInvalidArgument
            | ErrorCode::DeployEnvironmentNotConfigured
            | ErrorCode::DeployNoValidTarget => ErrorKind::Configuration,

            ErrorCode::ExecCommandFailed
            | ErrorCode::ExecSpawnFailed
            | ErrorCode::RemoteCommandFailed => ErrorKind::Exec,

            ErrorCode::ProviderRequestFailed | ErrorCode::ProviderInvalidResponse => {
                ErrorKind::Provider
            }

            ErrorCode::DeployStabilizationTimeout => ErrorKind::Timeout,

            ErrorCode::InternalIoError
            | ErrorCode::InternalJsonError
            | ErrorCode::InternalUnexpected => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParseFailedDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDetails {
    pub environment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configured: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilizationTimeoutDetails {
    pub cluster: String,
    pub service: String,
    pub attempts: u32,
    pub interval_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommandFailedDetails {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    pub host: String,
    pub user: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub target: TargetDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequestFailedDetails {
    pub operation: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let message = format!("Missing required configuration key '{}'", key);
        Self::new(
            ErrorCode::ConfigMissingKey,
            message,
            to_details(ConfigMissingKeyDetails { key, path }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn config_parse_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        let details = to_details(ConfigParseFailedDetails {
            path: path.clone(),
            error: error.into(),
        });

        Self::new(
            ErrorCode::ConfigParseFailed,
            format!("Failed to load config from {}", path),
            details,
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn environment_not_configured(
        environment: impl Into<String>,
        configured: Vec<String>,
    ) -> Self {
        let environment = environment.into();
        Self::new(
            ErrorCode::DeployEnvironmentNotConfigured,
            format!("No configuration for environment: {}", environment),
            to_details(EnvironmentDetails {
                environment,
                configured,
            }),
        )
        .with_hint("Add a target for this environment under provider.config")
    }

    pub fn no_valid_target(environment: impl Into<String>) -> Self {
        let environment = environment.into();
        Self::new(
            ErrorCode::DeployNoValidTarget,
            format!("No valid deployment configuration for environment: {}", environment),
            to_details(EnvironmentDetails {
                environment,
                configured: Vec::new(),
            }),
        )
        .with_hint("Set cluster + service, host + user, or one of bucket, lambdaFunction, ecsService, cloudFrontDistribution")
    }

    pub fn stabilization_timeout(
        cluster: impl Into<String>,
        service: impl Into<String>,
        attempts: u32,
        interval_ms: u64,
    ) -> Self {
        let mut err = Self::new(
            ErrorCode::DeployStabilizationTimeout,
            "Service did not stabilize in time",
            to_details(StabilizationTimeoutDetails {
                cluster: cluster.into(),
                service: service.into(),
                attempts,
                interval_ms,
            }),
        );
        err.retryable = Some(false);
        err
    }

    pub fn exec_command_failed(details: ExecCommandFailedDetails) -> Self {
        let message = format!("Command exited with code {}", details.exit_code);
        let mut err = Self::new(ErrorCode::ExecCommandFailed, message, to_details(details));
        err.retryable = Some(false);
        err
    }

    pub fn exec_spawn_failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExecSpawnFailed,
            "Failed to start command",
            serde_json::json!({
                "command": command.into(),
                "error": error.into(),
            }),
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let mut err = Self::new(
            ErrorCode::RemoteCommandFailed,
            "Remote command failed",
            to_details(details),
        );
        err.retryable = Some(false);
        err
    }

    pub fn provider_request_failed(operation: impl Into<String>, error: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::ProviderRequestFailed,
            format!("Cloud provider request failed: {}", operation),
            to_details(ProviderRequestFailedDetails {
                operation,
                error: error.into(),
            }),
        )
    }

    pub fn provider_invalid_response(
        operation: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::ProviderInvalidResponse,
            format!("Unexpected cloud provider response: {}", operation),
            to_details(ProviderRequestFailedDetails {
                operation,
                error: problem.into(),
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({
                "error": error.into(),
                "context": context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Attach an extra field to the structured details.
    ///
    /// Non-object details are wrapped under `"cause"` so nothing is lost.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if !self.details.is_object() {
            let previous = std::mem::take(&mut self.details);
            let mut map = serde_json::Map::new();
            if !previous.is_null() {
                map.insert("cause".to_string(), previous);
            }
            self.details = Value::Object(map);
        }
        if let Value::Object(map) = &mut self.details {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn with_message_prefix(mut self, prefix: &str) -> Self {
        self.message = format!("{}: {}", prefix, self.message);
        self
    }
}
