// src/transport/mock.rs

//! Scripted test doubles for the transport contracts
//!
//! `MockRunner` replays preset responses and records every call, including
//! the elevation and quiet flags, so tests can assert on the exact remote
//! traffic an operation produced. `MockTransport` records uploads and
//! captures the uploaded bytes at upload time, since the convergence engine
//! deletes its local temp file before returning, so tests could not read it
//! afterwards.

use crate::error::{Error, Result};
use crate::transport::{CommandRunner, FileTransport};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// One recorded [`CommandRunner::run`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
    pub command: String,
    pub elevated: bool,
    pub quiet: bool,
}

/// Test-double runner that records calls and returns preset responses.
///
/// Responses are consumed in order; once exhausted, further calls return
/// empty output.
pub struct MockRunner {
    responses: RefCell<Vec<std::result::Result<String, String>>>,
    calls: RefCell<Vec<ExecCall>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<std::result::Result<String, String>>) -> Self {
        let mut reversed = responses;
        reversed.reverse();
        MockRunner {
            responses: RefCell::new(reversed),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ExecCall> {
        self.calls.borrow().clone()
    }

    /// Just the command strings, in order.
    pub fn executed_commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.command.clone()).collect()
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &str, elevated: bool, quiet: bool) -> Result<String> {
        self.calls.borrow_mut().push(ExecCall {
            command: command.to_string(),
            elevated,
            quiet,
        });
        match self.responses.borrow_mut().pop() {
            Some(Ok(output)) => Ok(output),
            Some(Err(detail)) => Err(Error::CommandFailed {
                command: command.to_string(),
                detail,
            }),
            None => Ok(String::new()),
        }
    }
}

/// One recorded [`FileTransport::upload`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub local: PathBuf,
    pub remote: String,
    /// Bytes of the local file at upload time.
    pub content: Vec<u8>,
}

/// Test-double transport that records uploads instead of performing them.
pub struct MockTransport {
    uploads: RefCell<Vec<Upload>>,
    fail_with: RefCell<Option<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            uploads: RefCell::new(Vec::new()),
            fail_with: RefCell::new(None),
        }
    }

    /// Make the next upload fail with the given detail.
    pub fn fail_next(&self, detail: impl Into<String>) {
        *self.fail_with.borrow_mut() = Some(detail.into());
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.borrow().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTransport for MockTransport {
    fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        if let Some(detail) = self.fail_with.borrow_mut().take() {
            return Err(Error::Upload {
                from: local.display().to_string(),
                to: remote.to_string(),
                detail,
            });
        }
        let content = fs::read(local)?;
        self.uploads.borrow_mut().push(Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            content,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_records_calls_with_flags() {
        let runner = MockRunner::with_responses(vec![Ok("ok".into())]);
        runner.run("ls /", true, false).unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command, "ls /");
        assert!(calls[0].elevated);
        assert!(!calls[0].quiet);
    }

    #[test]
    fn test_mock_runner_returns_responses_in_order() {
        let runner = MockRunner::with_responses(vec![
            Ok("first".into()),
            Err("fail".into()),
            Ok("third".into()),
        ]);
        assert_eq!(runner.run("cmd1", false, true).unwrap(), "first");
        assert!(runner.run("cmd2", false, true).is_err());
        assert_eq!(runner.run("cmd3", false, true).unwrap(), "third");
    }

    #[test]
    fn test_mock_runner_defaults_to_empty_ok() {
        let runner = MockRunner::new();
        assert_eq!(runner.run("anything", false, true).unwrap(), "");
    }

    #[test]
    fn test_mock_transport_captures_content_at_upload_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.txt");
        fs::write(&path, "port=8080\n").unwrap();

        let transport = MockTransport::new();
        transport.upload(&path, "/etc/app.conf").unwrap();
        fs::remove_file(&path).unwrap();

        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].remote, "/etc/app.conf");
        assert_eq!(uploads[0].content, b"port=8080\n");
    }

    #[test]
    fn test_mock_transport_scripted_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.txt");
        fs::write(&path, "x").unwrap();

        let transport = MockTransport::new();
        transport.fail_next("connection reset");
        assert!(transport.upload(&path, "/etc/app.conf").is_err());
        // Failure is one-shot.
        transport.upload(&path, "/etc/app.conf").unwrap();
        assert_eq!(transport.uploads().len(), 1);
    }
}
