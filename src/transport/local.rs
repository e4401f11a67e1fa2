// src/transport/local.rs

//! Local backends: run commands and copy files on this machine
//!
//! Useful for provisioning localhost and as the reference implementation of
//! the transport contracts.

use crate::error::{Error, Result};
use crate::transport::{CommandRunner, FileTransport};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Runs commands through `sh -c`, prefixed with `sudo` when elevated.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, elevated: bool, quiet: bool) -> Result<String> {
        if quiet {
            debug!(%command, elevated, "running");
        } else {
            info!(%command, elevated, "running");
        }

        let mut cmd = if elevated {
            let mut c = Command::new("sudo");
            c.arg("sh");
            c
        } else {
            Command::new("sh")
        };
        let output = cmd.arg("-c").arg(command).output()?;

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

/// Copies files on the local filesystem.
pub struct LocalTransport;

impl FileTransport for LocalTransport {
    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        debug!(from = %local.display(), to = remote, "copying file");
        fs::copy(local, remote).map_err(|e| Error::Upload {
            from: local.display().to_string(),
            to: remote.to_string(),
            detail: e.to_string(),
        })?;
        Ok(())
    }
}
