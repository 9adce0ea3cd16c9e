use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::utils::command::{self, OutputSink, StatusSink};

/// Executes one command on a remote host and reports how it went.
///
/// Implementations must not retry: a failed remote step is reported as-is.
pub trait RemoteShell: Send + Sync {
    fn run_remote(&self, host: &str, user: &str, key_path: &str, command: &str) -> CommandOutput;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code: -1,
        }
    }
}

/// Remote shell backed by the system `ssh` binary.
///
/// Host key checking is disabled so unattended pipelines never block on a
/// prompt, and `BatchMode` makes authentication failures exit instead of
/// asking for a password.
pub struct SshClient {
    pub connect_timeout_secs: u32,
    sink: Arc<dyn OutputSink>,
}

impl Default for SshClient {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            sink: Arc::new(StatusSink::stderr()),
        }
    }
}

impl SshClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_ssh_args(&self, host: &str, user: &str, identity_file: &str, command: &str) -> Vec<String> {
        let mut args = vec!["-i".to_string(), identity_file.to_string()];
        args.extend([
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", user, host));
        args.push(command.to_string());
        args
    }
}

impl RemoteShell for SshClient {
    fn run_remote(&self, host: &str, user: &str, key_path: &str, command: &str) -> CommandOutput {
        let identity_file = shellexpand::tilde(key_path).to_string();
        if !Path::new(&identity_file).exists() {
            return CommandOutput::failure(format!(
                "SSH identity file not found: {}",
                identity_file
            ));
        }

        log_status!("ssh", "{}@{}: {}", user, host, command);

        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(host, user, &identity_file, command));

        match command::stream(cmd, self.sink.as_ref()) {
            Ok(result) => CommandOutput {
                stdout: result.output.stdout,
                stderr: result.output.stderr,
                success: result.success,
                exit_code: result.exit_code,
            },
            Err(e) => CommandOutput::failure(format!("SSH error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_args_disable_host_key_checking_and_pass_identity() {
        let client = SshClient::new();
        let args = client.build_ssh_args("example.com", "deploy", "/keys/id", "uptime");

        assert_eq!(&args[..2], &["-i".to_string(), "/keys/id".to_string()]);
        assert!(args.contains(&"StrictHostKeyChecking=no".to_string()));
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert_eq!(args[args.len() - 2], "deploy@example.com");
        assert_eq!(args[args.len() - 1], "uptime");
    }

    #[test]
    fn missing_identity_file_fails_without_spawning() {
        let client = SshClient::new();
        let output = client.run_remote("h", "u", "/nonexistent/launchpad/key", "true");

        assert!(!output.success);
        assert_eq!(output.exit_code, -1);
        assert!(output.stderr.contains("identity file not found"));
    }
}
