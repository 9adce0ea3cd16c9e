//! Per-environment deployment targets, classified once from raw settings.

use serde::Serialize;

use crate::config::TargetConfig;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_ARTIFACT_CLUSTER: &str = "default";
pub const DEFAULT_SOURCE_DIR: &str = "dist";
pub const DEFAULT_FUNCTION_ARCHIVE: &str = "function.zip";

/// Fields that make a target recognizable, for diagnostics.
pub const SUPPORTED_TARGET_FIELDS: &[&str] = &[
    "cluster + service",
    "host + user",
    "bucket",
    "lambdaFunction",
    "ecsService",
    "cloudFrontDistribution",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerTarget {
    pub cluster: String,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHostTarget {
    pub host: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_path: Option<String>,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecs_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_front_distribution: Option<String>,
    pub cluster: String,
    pub source_dir: String,
    pub function_archive: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DeploymentTarget {
    ContainerService(ContainerTarget),
    RemoteHost(RemoteHostTarget),
    ArtifactSync(ArtifactTarget),
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl DeploymentTarget {
    /// Decide the target shape. Container settings win over host settings,
    /// which win over artifact settings. Empty strings count as absent.
    pub fn classify(config: &TargetConfig) -> Option<Self> {
        if let (Some(cluster), Some(service)) = (present(&config.cluster), present(&config.service)) {
            return Some(DeploymentTarget::ContainerService(ContainerTarget { cluster, service }));
        }

        if let (Some(host), Some(user)) = (present(&config.host), present(&config.user)) {
            return Some(DeploymentTarget::RemoteHost(RemoteHostTarget {
                host,
                user,
                key_path: present(&config.key_path),
                app_path: present(&config.app_path),
                branch: present(&config.branch).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            }));
        }

        let artifact = ArtifactTarget {
            bucket: present(&config.bucket),
            lambda_function: present(&config.lambda_function),
            ecs_service: present(&config.ecs_service),
            cloud_front_distribution: present(&config.cloud_front_distribution),
            cluster: present(&config.cluster)
                .unwrap_or_else(|| DEFAULT_ARTIFACT_CLUSTER.to_string()),
            source_dir: present(&config.source_dir).unwrap_or_else(|| DEFAULT_SOURCE_DIR.to_string()),
            function_archive: present(&config.function_archive)
                .unwrap_or_else(|| DEFAULT_FUNCTION_ARCHIVE.to_string()),
        };
        if artifact.has_operations() {
            return Some(DeploymentTarget::ArtifactSync(artifact));
        }

        None
    }

    pub fn strategy_name(&self) -> &'static str {
        match self {
            DeploymentTarget::ContainerService(_) => "container_service",
            DeploymentTarget::RemoteHost(_) => "remote_host",
            DeploymentTarget::ArtifactSync(_) => "artifact_sync",
        }
    }
}

impl ArtifactTarget {
    pub fn has_operations(&self) -> bool {
        self.bucket.is_some()
            || self.lambda_function.is_some()
            || self.ecs_service.is_some()
            || self.cloud_front_distribution.is_some()
    }
}
