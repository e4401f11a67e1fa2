// src/hash.rs

//! Content digests for convergence checks
//!
//! The engine decides whether a remote write is needed by comparing a digest
//! of the locally rendered artifact against a digest computed on the target
//! host. Any algorithm works as long as both sides agree; MD5 is the default
//! because `md5sum` is universally present on targets and collisions are not
//! a realistic concern at configuration-file scale.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Digest algorithm used on both sides of a convergence comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// MD5 (128-bit), computed remotely via `md5sum`
    #[default]
    Md5,
    /// SHA-256, computed remotely via `sha256sum`
    Sha256,
}

impl HashAlgorithm {
    /// Algorithm name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    /// The remote command that prints the digest of `path`.
    ///
    /// Output format is the coreutils one: the digest is the first
    /// whitespace-separated token.
    pub fn remote_command(&self, path: &str) -> String {
        match self {
            Self::Md5 => format!("md5sum {path}"),
            Self::Sha256 => format!("sha256sum {path}"),
        }
    }

    /// Hex digest of a byte slice
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(md5::Md5::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
        }
    }

    /// Hex digest of a local file's content
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let data = fs::read(path)?;
        Ok(self.hash_bytes(&data))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
