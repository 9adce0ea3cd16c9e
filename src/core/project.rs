//! Project kinds and the shell commands they contribute to a pipeline.

use serde::Serialize;

use crate::config::{PackageManager, ProjectConfig, ProjectKind, ProjectSettings, StepKind};

const DEFAULT_APP_NAME: &str = "app";
const DEFAULT_BUILD_SCRIPT: &str = "build";

/// What a deployment strategy needs to know about the project being shipped.
pub trait ProjectHandle {
    /// Commands to run on the target after the source has been updated, in order.
    fn deployment_commands(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub kind: ProjectKind,
    pub settings: ProjectSettings,
}

impl Project {
    pub fn new(kind: ProjectKind, settings: ProjectSettings) -> Self {
        Self { kind, settings }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.kind, config.config.clone())
    }

    fn app_name(&self) -> &str {
        self.settings
            .app_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_APP_NAME)
    }

    fn build_script(&self) -> &str {
        self.settings
            .build_script
            .as_deref()
            .filter(|script| !script.is_empty())
            .unwrap_or(DEFAULT_BUILD_SCRIPT)
    }

    fn script(&self, script: &str) -> String {
        match self.settings.package_manager {
            PackageManager::Npm => format!("npm run {}", script),
            PackageManager::Yarn => format!("yarn {}", script),
            PackageManager::Pnpm => format!("pnpm {}", script),
            PackageManager::Bun => format!("bun {}", script),
        }
    }

    fn package_manager_binary(&self) -> &'static str {
        match self.settings.package_manager {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Bun => "bun",
        }
    }

    fn install_production(&self) -> &'static str {
        match self.settings.package_manager {
            PackageManager::Npm => "npm install --production",
            PackageManager::Yarn => "yarn install --production",
            PackageManager::Pnpm => "pnpm install --prod",
            PackageManager::Bun => "bun install --production",
        }
    }

    pub fn build_command(&self) -> String {
        match self.kind {
            ProjectKind::NextJs | ProjectKind::Node => self.script(self.build_script()),
            ProjectKind::Rust => "cargo build --release".to_string(),
        }
    }

    pub fn lint_command(&self) -> String {
        match self.kind {
            ProjectKind::NextJs | ProjectKind::Node => self.script("lint"),
            ProjectKind::Rust => "cargo fmt -- --check && cargo clippy -- -D warnings".to_string(),
        }
    }

    pub fn test_command(&self) -> String {
        match self.kind {
            ProjectKind::NextJs | ProjectKind::Node => self.script("test"),
            ProjectKind::Rust => "cargo test".to_string(),
        }
    }

    /// Local command for a build/lint/test step. Deploy has none.
    pub fn command_for(&self, step: StepKind) -> Option<String> {
        match step {
            StepKind::Build => Some(self.build_command()),
            StepKind::Lint => Some(self.lint_command()),
            StepKind::Test => Some(self.test_command()),
            StepKind::Deploy => None,
        }
    }
}

impl ProjectHandle for Project {
    fn deployment_commands(&self) -> Vec<String> {
        let app = self.app_name();
        match self.kind {
            ProjectKind::NextJs | ProjectKind::Node => vec![
                self.install_production().to_string(),
                self.script(self.build_script()),
                format!("pm2 delete {} || true", app),
                format!(
                    "pm2 start {} --name \"{}\" -- start",
                    self.package_manager_binary(),
                    app
                ),
                "pm2 save".to_string(),
                "sudo pm2 startup || true".to_string(),
            ],
            ProjectKind::Rust => vec![
                "cargo build --release".to_string(),
                format!("pkill -f {} || true", app),
                format!("nohup ./target/release/{} > app.log 2>&1 &", app),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(package_manager: PackageManager) -> Project {
        Project::new(
            ProjectKind::Node,
            ProjectSettings {
                package_manager,
                ..Default::default()
            },
        )
    }

    #[test]
    fn node_commands_follow_package_manager() {
        assert_eq!(node(PackageManager::Npm).build_command(), "npm run build");
        assert_eq!(node(PackageManager::Yarn).lint_command(), "yarn lint");
        assert_eq!(node(PackageManager::Pnpm).test_command(), "pnpm test");
        assert_eq!(node(PackageManager::Bun).build_command(), "bun build");
    }

    #[test]
    fn custom_build_script_is_used() {
        let project = Project::new(
            ProjectKind::NextJs,
            ProjectSettings {
                build_script: Some("build:prod".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(project.build_command(), "npm run build:prod");
    }

    #[test]
    fn rust_commands() {
        let project = Project::new(ProjectKind::Rust, ProjectSettings::default());
        assert_eq!(project.build_command(), "cargo build --release");
        assert_eq!(project.test_command(), "cargo test");
        assert!(project.lint_command().contains("cargo clippy"));
        assert_eq!(project.command_for(StepKind::Deploy), None);
    }

    #[test]
    fn node_deployment_commands_restart_under_pm2() {
        let project = Project::new(
            ProjectKind::Node,
            ProjectSettings {
                app_name: Some("web".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(
            project.deployment_commands(),
            vec![
                "npm install --production",
                "npm run build",
                "pm2 delete web || true",
                "pm2 start npm --name \"web\" -- start",
                "pm2 save",
                "sudo pm2 startup || true",
            ]
        );
    }

    #[test]
    fn rust_deployment_commands_default_app_name() {
        let project = Project::new(ProjectKind::Rust, ProjectSettings::default());
        let commands = project.deployment_commands();

        assert_eq!(commands.len(), 3);
        assert_eq!(commands[1], "pkill -f app || true");
        assert_eq!(commands[2], "nohup ./target/release/app > app.log 2>&1 &");
    }
}
