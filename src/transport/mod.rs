// src/transport/mod.rs

//! Transport collaborators: command execution and file upload
//!
//! The convergence engine never talks to a host directly; it goes through
//! these two narrow contracts. Backends are swappable: a shell runner for
//! provisioning the local machine, an SSH runner for remote hosts, and
//! scripted doubles for tests. The engine behaves identically regardless of
//! which backend is plugged in.

pub mod local;
pub mod mock;
pub mod ssh;

pub use local::{LocalTransport, ShellRunner};
pub use mock::{ExecCall, MockRunner, MockTransport, Upload};
pub use ssh::{ScpTransport, SshConfig, SshRunner};

use crate::error::Result;
use std::path::Path;

/// Executes shell command strings on the target host.
///
/// `elevated` means the command runs with super-user privilege on the target.
/// `quiet` suppresses mirroring of the command and its output to the operator
/// console; the captured output is returned either way.
pub trait CommandRunner {
    fn run(&self, command: &str, elevated: bool, quiet: bool) -> Result<String>;
}

/// Uploads a local file to a path on the target host.
///
/// Writes as the unprivileged session identity and never escalates; callers
/// that need a privileged destination stage through a neutral temp path and
/// copy with an elevated command instead.
pub trait FileTransport {
    fn upload(&self, local: &Path, remote: &str) -> Result<()>;
}

// Shared handles: a caller can keep a clone of the backend (to inspect
// recorded traffic, typically) while the provisioner owns the other.
impl<T: CommandRunner + ?Sized> CommandRunner for std::rc::Rc<T> {
    fn run(&self, command: &str, elevated: bool, quiet: bool) -> Result<String> {
        (**self).run(command, elevated, quiet)
    }
}

impl<T: FileTransport + ?Sized> FileTransport for std::rc::Rc<T> {
    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        (**self).upload(local, remote)
    }
}
