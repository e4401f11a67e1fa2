// src/error.rs

//! Central error types for provisioning operations

use thiserror::Error;

/// Errors that can occur during role provisioning and convergence
#[derive(Error, Debug)]
pub enum Error {
    /// Symlink source missing on the target host
    #[error("Symlink source '{path}' was not found on the target host")]
    MissingSource { path: String },

    /// A remote command returned a non-zero exit status
    #[error("Command failed: `{command}`: {detail}")]
    CommandFailed { command: String, detail: String },

    /// File transport failed to upload
    #[error("Upload of '{from}' to '{to}' failed: {detail}")]
    Upload {
        from: String,
        to: String,
        detail: String,
    },

    /// No registered template source resolves the template name
    #[error("Template '{name}' not found in any registered template source")]
    TemplateNotFound { name: String },

    /// Template rendering failed
    #[error("Template rendering failed: {0}")]
    Render(#[from] minijinja::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, Error>;
