// src/lib.rs

//! Provisor
//!
//! Remote-host provisioning engine built around idempotent convergence:
//! roles describe desired state, and every managed artifact (file, symlink,
//! directory, user) is written only when the remote side actually differs.
//!
//! # Architecture
//!
//! - Context-first: one shared [`Context`] per host carries values, template
//!   sources, and the deferred cleanup queue
//! - Roles: composable units of idempotent logic with deduplicated cleanup
//! - Convergence: content digests decide whether a remote write is needed,
//!   never timestamps or sizes
//! - Transports: command execution and file upload are narrow, swappable
//!   contracts (local shell, SSH, scripted test doubles)

pub mod context;
pub mod convergence;
mod error;
pub mod hash;
pub mod role;
pub mod roles;
pub mod template;
pub mod transport;

pub use context::Context;
pub use convergence::{Provisioner, UpdateFileOptions};
pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use role::{run_cleanup, Role};
pub use transport::{CommandRunner, FileTransport};
