mod client;

pub use client::{CommandOutput, RemoteShell, SshClient};
