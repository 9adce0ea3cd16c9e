//! Push-deploy to a host over SSH: pull the branch, then run project commands.

use super::target::RemoteHostTarget;
use crate::error::{Error, RemoteCommandFailedDetails, Result, TargetDetails};
use crate::project::ProjectHandle;
use crate::ssh::RemoteShell;
use crate::utils::shell;

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::config_missing_key(key, None))
}

pub(crate) fn deploy(
    target: &RemoteHostTarget,
    remote: &dyn RemoteShell,
    project: Option<&dyn ProjectHandle>,
) -> Result<String> {
    let key_path = required(&target.key_path, "keyPath")?;
    let app_path = required(&target.app_path, "appPath")?;

    let mut commands = vec![shell::in_dir(
        app_path,
        &format!("git pull origin {}", shell::quote_arg(&target.branch)),
    )];
    if let Some(project) = project {
        commands.extend(
            project
                .deployment_commands()
                .iter()
                .map(|cmd| shell::in_dir(app_path, cmd)),
        );
    }

    log_status!(
        "deploy:ssh",
        "Deploying {} to {}@{}:{}",
        target.branch,
        target.user,
        target.host,
        app_path
    );

    for command in &commands {
        log_status!("deploy:ssh", "Running: {}", command);
        let output = remote.run_remote(&target.host, &target.user, key_path, command);
        if !output.success {
            return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                command: command.clone(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
                target: TargetDetails {
                    host: target.host.clone(),
                    user: target.user.clone(),
                },
            }));
        }
    }

    Ok(format!(
        "Deployed {} to {}@{}:{} ({} remote commands)",
        target.branch,
        target.user,
        target.host,
        app_path,
        commands.len()
    ))
}
