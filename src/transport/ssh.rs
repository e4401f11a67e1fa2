// src/transport/ssh.rs

//! SSH backends: run commands and upload files on a remote host
//!
//! Drives the system `ssh` and `scp` binaries. Argument vectors are built
//! separately from execution so tests can assert on them without touching
//! the network.

use crate::error::{Error, Result};
use crate::transport::{CommandRunner, FileTransport};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Connection settings shared by [`SshRunner`] and [`ScpTransport`].
///
/// Deserializable so host inventories can be loaded from configuration;
/// only `host` and `user` are required there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Private key path, when not relying on the agent
    #[serde(default)]
    pub identity: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl SshConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port: 22,
            identity: None,
        }
    }

    pub fn user_at_host(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Base `ssh` arguments (port, options, key, user@host) without a command.
    pub fn ssh_base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
        ];
        if let Some(ref identity) = self.identity {
            args.push("-i".to_string());
            args.push(identity.clone());
        }
        args.push(self.user_at_host());
        args
    }
}

/// Wrap `text` in single quotes for a remote shell.
fn sh_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Runs commands on a remote host through the system `ssh` binary.
pub struct SshRunner {
    config: SshConfig,
}

impl SshRunner {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// The full `ssh` argument vector for a command, elevation included.
    /// The remote command is passed as a single argument so the remote shell
    /// handles pipes and redirects.
    pub fn command_args(&self, command: &str, elevated: bool) -> Vec<String> {
        let remote = if elevated {
            format!("sudo -- sh -c {}", sh_quote(command))
        } else {
            command.to_string()
        };
        let mut args = self.config.ssh_base_args();
        args.push(remote);
        args
    }
}

impl CommandRunner for SshRunner {
    fn run(&self, command: &str, elevated: bool, quiet: bool) -> Result<String> {
        if quiet {
            debug!(host = %self.config.host, %command, elevated, "running over ssh");
        } else {
            info!(host = %self.config.host, %command, elevated, "running over ssh");
        }

        let output = Command::new("ssh")
            .args(self.command_args(command, elevated))
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !quiet {
            for line in stdout.lines() {
                info!("{line}");
            }
        }
        Ok(stdout)
    }
}

/// Uploads files to a remote host through the system `scp` binary.
///
/// Runs as the SSH session user; privileged destinations go through the
/// engine's staged copy instead.
pub struct ScpTransport {
    config: SshConfig,
}

impl ScpTransport {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// The full `scp` argument vector for an upload.
    pub fn upload_args(&self, local: &Path, remote: &str) -> Vec<String> {
        let mut args = vec!["-P".to_string(), self.config.port.to_string()];
        if let Some(ref identity) = self.config.identity {
            args.push("-i".to_string());
            args.push(identity.clone());
        }
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.config.user_at_host(), remote));
        args
    }
}

impl FileTransport for ScpTransport {
    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        debug!(host = %self.config.host, from = %local.display(), to = remote, "uploading over scp");
        let output = Command::new("scp")
            .args(self.upload_args(local, remote))
            .output()?;
        if !output.status.success() {
            return Err(Error::Upload {
                from: local.display().to_string(),
                to: remote.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
