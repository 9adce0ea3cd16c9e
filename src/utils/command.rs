//! Command execution primitives with consistent error handling.
//!
//! Output is streamed line by line to an [`OutputSink`] while it is also
//! captured, so callers get live progress and the full text for errors.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{Error, ExecCommandFailedDetails, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives subprocess output as it arrives.
pub trait OutputSink: Send + Sync {
    fn line(&self, stream: OutputStream, line: &str);
}

/// Writes every line with an `[out]`/`[err]` prefix, terminal or not.
///
/// Defaults to stderr so stdout stays reserved for the JSON result.
pub struct StatusSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StatusSink {
    pub fn stderr() -> Self {
        Self::to_writer(std::io::stderr())
    }

    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl OutputSink for StatusSink {
    fn line(&self, stream: OutputStream, line: &str) {
        let prefix = match stream {
            OutputStream::Stdout => "out",
            OutputStream::Stderr => "err",
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "[{}] {}", prefix, line);
        }
    }
}

/// Discards output. Used where stdout is machine-readable and parsed afterwards.
pub struct NullSink;

impl OutputSink for NullSink {
    fn line(&self, _stream: OutputStream, _line: &str) {}
}

/// Captured output from command execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapturedOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: String, stderr: String) -> Self {
        Self { stdout, stderr }
    }
}

/// A finished process. `exit_code` is -1 when the process was killed by a signal.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub output: CapturedOutput,
    pub exit_code: i32,
    pub success: bool,
}

/// Spawn `cmd` with piped output and wait for it, forwarding every line to `sink`.
///
/// stdout and stderr are drained on two scoped threads so neither pipe can
/// fill up and stall the child. Both threads are joined before returning.
pub fn stream(mut cmd: Command, sink: &dyn OutputSink) -> std::io::Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = std::thread::scope(|scope| {
        let out = scope.spawn(move || drain(stdout, OutputStream::Stdout, sink));
        let err = scope.spawn(move || drain(stderr, OutputStream::Stderr, sink));
        (out.join().unwrap_or_default(), err.join().unwrap_or_default())
    });

    let status = child.wait()?;

    Ok(ProcessOutput {
        output: CapturedOutput::new(stdout, stderr),
        exit_code: status.code().unwrap_or(-1),
        success: status.success(),
    })
}

fn drain<R: Read>(reader: Option<R>, stream: OutputStream, sink: &dyn OutputSink) -> String {
    let Some(reader) = reader else {
        return String::new();
    };

    let mut reader = BufReader::new(reader);
    let mut captured = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                sink.line(stream, line);
                captured.push_str(line);
                captured.push('\n');
            }
        }
    }

    captured
}

/// Build a platform shell invocation for a command string.
pub fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    let cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    cmd
}

/// Runs shell commands to completion with an explicit environment overlay.
///
/// The overlay is applied to each child only; the parent process environment
/// is never modified.
#[derive(Clone)]
pub struct CommandRunner {
    env: BTreeMap<String, String>,
    sink: Arc<dyn OutputSink>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            sink: Arc::new(StatusSink::stderr()),
        }
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run `command` through the shell, optionally inside `cwd`.
    ///
    /// Returns the captured output on a zero exit. A nonzero exit becomes
    /// `exec.command_failed` carrying the exit code and both streams.
    pub fn run(&self, command: &str, cwd: Option<&str>) -> Result<CapturedOutput> {
        let mut cmd = shell_command(command);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.env);

        let result = stream(cmd, self.sink.as_ref())
            .map_err(|e| Error::exec_spawn_failed(command, e.to_string()))?;

        if !result.success {
            return Err(Error::exec_command_failed(ExecCommandFailedDetails {
                command: command.to_string(),
                cwd: cwd.map(str::to_string),
                exit_code: result.exit_code,
                stdout: result.output.stdout,
                stderr: result.output.stderr,
            }));
        }

        Ok(result.output)
    }
}
