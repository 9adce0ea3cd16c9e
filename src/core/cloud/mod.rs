//! Narrow cloud interfaces the deployment strategies depend on.
//!
//! Strategies never see a cloud SDK; they call these traits. [`AwsCli`] is the
//! production implementation, tests use in-memory fakes.

mod aws;

pub use aws::AwsCli;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ProviderSettings;
use crate::env::ResolvedEnv;
use crate::error::Result;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Convergence status the control plane reports for a service update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutState {
    Completed,
    InProgress,
    Failed,
    Unknown(String),
}

impl RolloutState {
    pub fn parse(value: &str) -> Self {
        match value {
            "COMPLETED" => RolloutState::Completed,
            "IN_PROGRESS" => RolloutState::InProgress,
            "FAILED" => RolloutState::Failed,
            other => RolloutState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for RolloutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RolloutState::Completed => f.write_str("COMPLETED"),
            RolloutState::InProgress => f.write_str("IN_PROGRESS"),
            RolloutState::Failed => f.write_str("FAILED"),
            RolloutState::Unknown(raw) if raw.is_empty() => f.write_str("UNKNOWN"),
            RolloutState::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Container service control plane.
pub trait ControlPlane: Send + Sync {
    /// Force a new deployment of the service. Returns the deployment id.
    fn update_service(&self, cluster: &str, service: &str) -> Result<String>;

    /// Rollout state of the service's most recent deployment.
    fn describe_service(&self, cluster: &str, service: &str) -> Result<RolloutState>;
}

/// Static and serverless artifact publishing.
pub trait ArtifactPublisher: Send + Sync {
    fn sync_bucket(&self, source_dir: &str, bucket: &str) -> Result<()>;

    fn update_function_code(&self, function: &str, archive: &str) -> Result<()>;

    /// Invalidate every cached path. Returns the invalidation id.
    fn invalidate_distribution(&self, distribution: &str) -> Result<String>;
}

/// Explicit credentials handed to the cloud adapter.
///
/// Built from configuration and the resolved environment map, never read
/// from the process environment by the adapter itself.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CloudCredentials {
    pub region: String,
    pub profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "***"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl CloudCredentials {
    /// Region precedence: provider config, `AWS_REGION`, `AWS_DEFAULT_REGION`, `us-east-1`.
    pub fn resolve(settings: &ProviderSettings, env: &ResolvedEnv) -> Self {
        let region = settings
            .region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| env.get("AWS_REGION").map(str::to_string))
            .or_else(|| env.get("AWS_DEFAULT_REGION").map(str::to_string))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Self {
            region,
            profile: settings
                .profile
                .clone()
                .or_else(|| env.get("AWS_PROFILE").map(str::to_string)),
            access_key_id: env.get("AWS_ACCESS_KEY_ID").map(str::to_string),
            secret_access_key: env.get("AWS_SECRET_ACCESS_KEY").map(str::to_string),
            session_token: env.get("AWS_SESSION_TOKEN").map(str::to_string),
        }
    }

    /// Variables to set on each `aws` child process.
    pub fn to_env(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("AWS_REGION".to_string(), self.region.clone());
        vars.insert("AWS_DEFAULT_REGION".to_string(), self.region.clone());

        let optional = [
            ("AWS_PROFILE", &self.profile),
            ("AWS_ACCESS_KEY_ID", &self.access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &self.secret_access_key),
            ("AWS_SESSION_TOKEN", &self.session_token),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                vars.insert(key.to_string(), value.clone());
            }
        }

        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    fn resolved(pairs: &[(&str, &str)]) -> ResolvedEnv {
        let values: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        crate::env::resolve(&BTreeMap::new(), Environment::Dev, |key| {
            values.get(key).cloned()
        })
    }

    #[test]
    fn rollout_state_parses_known_values() {
        assert_eq!(RolloutState::parse("COMPLETED"), RolloutState::Completed);
        assert_eq!(RolloutState::parse("IN_PROGRESS"), RolloutState::InProgress);
        assert_eq!(
            RolloutState::parse("PENDING"),
            RolloutState::Unknown("PENDING".to_string())
        );
    }

    #[test]
    fn region_prefers_provider_config() {
        let settings = ProviderSettings {
            region: Some("eu-central-1".to_string()),
            ..Default::default()
        };
        let creds = CloudCredentials::resolve(&settings, &resolved(&[("AWS_REGION", "us-west-2")]));
        assert_eq!(creds.region, "eu-central-1");
    }

    #[test]
    fn region_falls_back_to_env_then_default() {
        let settings = ProviderSettings::default();

        let creds = CloudCredentials::resolve(&settings, &resolved(&[("AWS_DEFAULT_REGION", "ap-south-1")]));
        assert_eq!(creds.region, "ap-south-1");

        let creds = CloudCredentials::resolve(&settings, &resolved(&[]));
        assert_eq!(creds.region, DEFAULT_REGION);
    }

    #[test]
    fn to_env_only_includes_present_secrets() {
        let creds = CloudCredentials::resolve(
            &ProviderSettings::default(),
            &resolved(&[("AWS_ACCESS_KEY_ID", "AKIA"), ("AWS_SECRET_ACCESS_KEY", "s3cr3t")]),
        );

        let vars = creds.to_env();
        assert_eq!(vars.get("AWS_ACCESS_KEY_ID").map(String::as_str), Some("AKIA"));
        assert_eq!(vars.get("AWS_REGION").map(String::as_str), Some(DEFAULT_REGION));
        assert!(!vars.contains_key("AWS_SESSION_TOKEN"));
        assert!(!format!("{:?}", creds).contains("s3cr3t"));
    }
}
