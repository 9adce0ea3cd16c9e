//! Pipeline configuration file loading.
//!
//! A pipeline file names the project kind, the provider with one target per
//! environment, the environment to deploy and the ordered list of steps.
//! YAML, JSON and TOML are accepted; the format follows the file extension.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::deploy::poller::PollSettings;
use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Staging, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == normalized)
            .ok_or_else(|| {
                Error::validation_invalid_argument(
                    "environment",
                    format!("Unknown environment '{}'", s),
                    Some(Environment::ALL.iter().map(|e| e.to_string()).collect()),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Lint,
    Build,
    Test,
    Deploy,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Lint => "lint",
            StepKind::Build => "build",
            StepKind::Test => "test",
            StepKind::Deploy => "deploy",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    NextJs,
    Node,
    Rust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub package_manager: PackageManager,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(rename = "type")]
    pub kind: ProjectKind,
    #[serde(default)]
    pub config: ProjectSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Aws,
}

/// Raw per-environment target settings as written in the config file.
///
/// Which fields are present decides the deployment strategy; see
/// [`crate::deploy::DeploymentTarget::classify`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(alias = "key", skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(alias = "s3Bucket", skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecs_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_front_distribution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_archive: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev: Option<TargetConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging: Option<TargetConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prod: Option<TargetConfig>,
}

impl ProviderSettings {
    pub fn target(&self, environment: Environment) -> Option<&TargetConfig> {
        match environment {
            Environment::Dev => self.dev.as_ref(),
            Environment::Staging => self.staging.as_ref(),
            Environment::Prod => self.prod.as_ref(),
        }
    }

    /// Configured targets in environment order.
    pub fn targets(&self) -> BTreeMap<Environment, &TargetConfig> {
        Environment::ALL
            .into_iter()
            .filter_map(|env| self.target(env).map(|target| (env, target)))
            .collect()
    }

    pub fn poll_settings(&self) -> PollSettings {
        let defaults = PollSettings::default();
        PollSettings {
            max_attempts: self.poll_attempts.unwrap_or(defaults.max_attempts),
            interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub config: ProviderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub project: ProjectConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub environment: Environment,
    pub steps: Vec<StepKind>,
    /// Variables to resolve from the process environment. A non-empty value
    /// is used as the fallback when neither `KEY` nor `<env>_KEY` is set.
    #[serde(default)]
    pub env: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => ConfigFormat::Json,
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Read and validate a pipeline file.
pub fn load(path: &Path) -> Result<PipelineConfig> {
    let source = path.display().to_string();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config_parse_failed(&source, e.to_string()))?;

    parse_from(&content, ConfigFormat::from_path(path), &source)
}

/// Parse pipeline configuration text in the given format and validate it.
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineConfig> {
    parse_from(content, format, "<inline>")
}

fn parse_from(content: &str, format: ConfigFormat, source: &str) -> Result<PipelineConfig> {
    let parsed = match format {
        ConfigFormat::Yaml => serde_yml::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    };
    let config: PipelineConfig = parsed.map_err(|e| Error::config_parse_failed(source, e))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &PipelineConfig) -> Result<()> {
    if config.steps.is_empty() {
        return Err(Error::config_invalid_value(
            "steps",
            None,
            "At least one step is required",
        ));
    }

    if config.provider.config.poll_attempts == Some(0) {
        return Err(Error::config_invalid_value(
            "provider.config.pollAttempts",
            Some("0".to_string()),
            "Must be at least 1",
        ));
    }

    Ok(())
}
