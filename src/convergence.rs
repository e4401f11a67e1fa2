// src/convergence.rs

//! Idempotent convergence engine
//!
//! The [`Provisioner`] is the handle roles use to interact with the target
//! host. Every mutating operation here follows the same policy: inspect the
//! remote state first and write only on mismatch, reporting whether a write
//! happened. The file push never transfers content speculatively: when the
//! destination exists, a digest is computed on the remote side (one command
//! round-trip, a designed cost) and compared with the digest of the locally
//! rendered artifact.
//!
//! The rendered artifact lives in a [`NamedTempFile`] for the duration of one
//! push; the RAII guard deletes it on every exit path, including render and
//! transfer failures.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::template;
use crate::transport::{CommandRunner, FileTransport};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Call-site options for [`Provisioner::update_file`]
#[derive(Debug, Clone, Default)]
pub struct UpdateFileOptions {
    /// Owner applied to the destination after a write
    pub owner: Option<String>,
    /// Transfer through the staged privileged copy
    pub elevated: bool,
    /// Extra template variables; win over context values on collision
    pub vars: HashMap<String, Value>,
}

/// Handle for converging one target host
pub struct Provisioner {
    runner: Box<dyn CommandRunner>,
    transport: Box<dyn FileTransport>,
    algorithm: HashAlgorithm,
}

impl Provisioner {
    /// Create a provisioner over the given transport backends.
    ///
    /// Digest comparisons default to MD5; see [`Provisioner::with_algorithm`].
    pub fn new(runner: Box<dyn CommandRunner>, transport: Box<dyn FileTransport>) -> Self {
        Self {
            runner,
            transport,
            algorithm: HashAlgorithm::default(),
        }
    }

    /// Select the digest algorithm used for convergence comparisons
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// The digest algorithm in use
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Run a shell command on the target host.
    ///
    /// `elevated` runs it as the super-user; `quiet` keeps the command and
    /// its output off the operator console while still capturing it.
    pub fn execute(&self, command: &str, elevated: bool, quiet: bool) -> Result<String> {
        self.runner.run(command, elevated, quiet)
    }

    /// Whether `path` exists as a regular file on the target
    pub fn remote_exists(&self, path: &str) -> Result<bool> {
        let out = self.execute(&format!("test -f {path}; echo $?"), false, true)?;
        Ok(out.trim() == "0")
    }

    /// Whether `path` exists as a directory on the target
    pub fn remote_exists_dir(&self, path: &str) -> Result<bool> {
        let out = self.execute(&format!("test -d {path}; echo $?"), false, true)?;
        Ok(out.trim() == "0")
    }

    /// Whether `path` exists at all on the target (any file type)
    pub fn remote_path_exists(&self, path: &str) -> Result<bool> {
        let out = self.execute(&format!("test -e {path}; echo $?"), false, true)?;
        Ok(out.trim() == "0")
    }

    /// The temp directory on the target
    pub fn remote_temp_dir(&self) -> Result<String> {
        let out = self.execute("echo ${TMPDIR:-/tmp}", false, true)?;
        Ok(out.trim().to_string())
    }

    /// The user the session is logged in as on the target
    pub fn logged_user(&self) -> Result<String> {
        let out = self.execute("whoami", false, true)?;
        Ok(out.trim().to_string())
    }

    /// Content of a remote file
    pub fn read_remote_file(&self, path: &str, elevated: bool) -> Result<String> {
        self.execute(&format!("cat {path}"), elevated, true)
    }

    /// Whether a process matching `pattern` is running on the target
    pub fn is_process_running(&self, pattern: &str, elevated: bool) -> Result<bool> {
        let out = self.execute(
            &format!("ps aux | grep {pattern} | grep -v grep > /dev/null; echo $?"),
            elevated,
            true,
        )?;
        Ok(out.lines().last().map(str::trim) == Some("0"))
    }

    /// Digest of a remote file, computed on the target
    pub fn remote_hash(&self, path: &str) -> Result<String> {
        let out = self.execute(&self.algorithm.remote_command(path), false, true)?;
        Ok(out.split_whitespace().next().unwrap_or_default().to_string())
    }

    /// Apply ownership to a remote file (always privileged)
    pub fn change_file_owner(&self, path: &str, owner: &str) -> Result<()> {
        self.execute(&format!("chown {owner} {path}"), true, true)?;
        Ok(())
    }

    /// Apply ownership recursively to a remote directory (always privileged)
    pub fn change_dir_owner(&self, path: &str, owner: &str) -> Result<()> {
        self.execute(&format!("chown -R {owner} {path}"), true, true)?;
        Ok(())
    }

    /// Transfer a local file to the target.
    ///
    /// The transport writes as the unprivileged session user, so a privileged
    /// destination is reached in two steps: upload to a neutral temp path,
    /// then a privileged copy into place.
    pub fn put_file(&self, local: &Path, to_path: &str, elevated: bool) -> Result<()> {
        if elevated {
            let staging = format!(
                "{}/{}",
                self.remote_temp_dir()?.trim_end_matches('/'),
                local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "provisor-upload".to_string())
            );
            self.transport.upload(local, &staging)?;
            self.execute(&format!("cp {staging} {to_path}"), true, true)?;
            return Ok(());
        }
        self.transport.upload(local, to_path)
    }

    /// Ensure the destination holds the rendered template, writing only when
    /// the remote content differs. Returns whether a write happened.
    ///
    /// The template is rendered against the context merged with
    /// `opts.vars` (call-site values win), persisted to a scoped local temp
    /// file, and transferred only if the destination is absent or its digest
    /// differs from the rendered artifact's.
    pub fn update_file(
        &self,
        ctx: &Context,
        template: &str,
        to_path: &str,
        opts: &UpdateFileOptions,
    ) -> Result<bool> {
        // Render before touching the filesystem or the host: a bad template
        // must not leave any local or remote state behind.
        let rendered = template::render(ctx, template, &opts.vars)?;

        // Deleted on drop, on every exit path below.
        let mut local = NamedTempFile::new()?;
        local.write_all(rendered.as_bytes())?;
        local.flush()?;

        if !self.remote_exists(to_path)? {
            debug!(host = ctx.host(), path = to_path, "destination absent, pushing");
            self.put_file(local.path(), to_path, opts.elevated)?;
            if let Some(ref owner) = opts.owner {
                self.change_file_owner(to_path, owner)?;
            }
            return Ok(true);
        }

        let local_hash = self.algorithm.hash_file(local.path())?;
        let remote_hash = self.remote_hash(to_path)?;
        if local_hash.trim() != remote_hash.trim() {
            info!(
                host = ctx.host(),
                path = to_path,
                local = %local_hash,
                remote = %remote_hash,
                "content hashes differ, pushing"
            );
            self.put_file(local.path(), to_path, opts.elevated)?;
            if let Some(ref owner) = opts.owner {
                self.change_file_owner(to_path, owner)?;
            }
            return Ok(true);
        }

        debug!(host = ctx.host(), path = to_path, "content already converged");
        Ok(false)
    }

    /// Ensure `to_path` is a symlink pointing at `from_path` on the target.
    /// Returns whether a write happened.
    ///
    /// Fails with [`Error::MissingSource`] when `from_path` does not exist;
    /// nothing is mutated in that case. A destination that exists but is not
    /// a symlink is left untouched and reported unchanged.
    pub fn remote_symlink(&self, from_path: &str, to_path: &str, elevated: bool) -> Result<bool> {
        if !self.remote_path_exists(from_path)? {
            return Err(Error::MissingSource {
                path: from_path.to_string(),
            });
        }

        let link = format!("ln -sf {from_path} {to_path}");
        if !self.remote_path_exists(to_path)? {
            info!(source = from_path, dest = to_path, "symlink absent, creating");
            self.execute(&link, elevated, true)?;
            return Ok(true);
        }

        let target = self.execute(&format!("readlink {to_path} || true"), elevated, true)?;
        let target = target.trim();
        if target.is_empty() {
            // Destination exists but is not a symlink; left untouched.
            return Ok(false);
        }
        if target != from_path {
            info!(
                source = from_path,
                dest = to_path,
                current = target,
                "symlink points elsewhere, retargeting"
            );
            self.execute(&link, elevated, true)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Ensure a directory tree exists on the target. Creation is conditional
    /// on absence; ownership, when given, is applied unconditionally.
    pub fn ensure_dir(&self, path: &str, owner: Option<&str>, elevated: bool) -> Result<()> {
        if !self.remote_exists_dir(path)? {
            debug!(path, "directory absent, creating");
            self.execute(&format!("mkdir -p {path}"), elevated, true)?;
        }
        if let Some(owner) = owner {
            self.change_dir_owner(path, owner)?;
        }
        Ok(())
    }

    /// Delete a remote file if present. Returns whether a deletion happened;
    /// absence is not an error.
    pub fn remove_file(&self, path: &str, elevated: bool) -> Result<bool> {
        if self.remote_exists(path)? {
            info!(path, "file found, removing");
            self.execute(&format!("rm -f {path}"), elevated, true)?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockRunner, MockTransport};

    fn provisioner_with(responses: Vec<std::result::Result<String, String>>) -> Provisioner {
        Provisioner::new(
            Box::new(MockRunner::with_responses(responses)),
            Box::new(MockTransport::new()),
        )
    }

    #[test]
    fn test_remote_exists_parses_exit_status() {
        let prov = provisioner_with(vec![Ok("0\n".into()), Ok("1\n".into())]);
        assert!(prov.remote_exists("/etc/app.conf").unwrap());
        assert!(!prov.remote_exists("/etc/app.conf").unwrap());
    }

    #[test]
    fn test_remote_temp_dir_trims_output() {
        let prov = provisioner_with(vec![Ok("/tmp\n".into())]);
        assert_eq!(prov.remote_temp_dir().unwrap(), "/tmp");
    }

    #[test]
    fn test_remote_hash_takes_first_token() {
        let prov = provisioner_with(vec![Ok(
            "900150983cd24fb0d6963f7d28e17f72  /etc/app.conf\n".into(),
        )]);
        assert_eq!(
            prov.remote_hash("/etc/app.conf").unwrap(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_is_process_running_reads_last_line() {
        let prov = provisioner_with(vec![Ok("0\n".into()), Ok("1\n".into())]);
        assert!(prov.is_process_running("nginx", false).unwrap());
        assert!(!prov.is_process_running("nginx", false).unwrap());
    }

    #[test]
    fn test_remove_file_present_and_absent() {
        let prov = provisioner_with(vec![
            Ok("0\n".into()), // exists
            Ok("".into()),    // rm
            Ok("1\n".into()), // absent
        ]);
        assert!(prov.remove_file("/tmp/stale.conf", false).unwrap());
        assert!(!prov.remove_file("/tmp/stale.conf", false).unwrap());
    }

    #[test]
    fn test_ensure_dir_applies_owner_unconditionally() {
        let runner = std::rc::Rc::new(MockRunner::with_responses(vec![
            Ok("0\n".into()),
            Ok("".into()),
        ]));
        let prov = Provisioner::new(
            Box::new(std::rc::Rc::clone(&runner)),
            Box::new(MockTransport::new()),
        );
        prov.ensure_dir("/srv/app", Some("deploy"), false).unwrap();
        // Directory existed: no mkdir, but chown still ran.
        let commands = runner.executed_commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], "test -d /srv/app; echo $?");
        assert_eq!(commands[1], "chown -R deploy /srv/app");
    }
}
