// src/context.rs

//! Per-host provisioning context
//!
//! A [`Context`] is created once per host-provisioning run and threaded by
//! reference through every role that touches that host. It carries:
//!
//! - the host identifier (constant for the Context's lifetime)
//! - arbitrary string-keyed values shared between roles
//! - the ordered list of template source directories
//! - the cleanup queue drained by the external driver at end of run
//!
//! Any role may read or write any value key; collisions are a documented
//! contract between roles, not enforced here. There is no internal locking:
//! provisioning within one host is strictly sequential, and a Context must
//! never be shared across hosts.

use crate::role::Role;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shared mutable registry for one host-provisioning run
pub struct Context {
    /// Target host identifier
    host: String,
    /// Values shared between roles
    values: HashMap<String, Value>,
    /// Ordered template source directories ("loader" order)
    template_sources: Vec<PathBuf>,
    /// Source identifiers already registered, to keep registration idempotent
    registered_sources: HashSet<String>,
    /// Roles whose `cleanup` the driver must invoke, at most one per tag
    cleanup: Vec<Box<dyn Role>>,
}

impl Context {
    /// Create a fresh context for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            values: HashMap::new(),
            template_sources: Vec::new(),
            registered_sources: HashSet::new(),
            cleanup: Vec::new(),
        }
    }

    /// The host this context belongs to
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Store a shared value under `key`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a shared value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a shared value as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// All shared values
    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Register a template source directory.
    ///
    /// Registering the same directory any number of times has the same
    /// observable effect as registering it once: the loader order gains one
    /// entry and the registered set gains one identifier.
    pub fn register_template_source(&mut self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        let identifier = dir.to_string_lossy().into_owned();
        if self.registered_sources.contains(&identifier) {
            return;
        }
        debug!(source = %identifier, "registering template source");
        self.template_sources.push(dir.to_path_buf());
        self.registered_sources.insert(identifier);
    }

    /// Template source directories in registration order
    pub fn template_sources(&self) -> &[PathBuf] {
        &self.template_sources
    }

    /// Schedule a role's cleanup for end of run.
    ///
    /// Deduplicates by [`Role::tag`]: scheduling N instances of the same role
    /// kind leaves exactly one pending entry. Entries are appended, never
    /// removed, until the driver drains them.
    pub fn schedule_cleanup(&mut self, role: Box<dyn Role>) {
        if self.cleanup.iter().any(|r| r.tag() == role.tag()) {
            debug!(tag = role.tag(), "cleanup already scheduled");
            return;
        }
        self.cleanup.push(role);
    }

    /// Number of pending cleanup entries
    pub fn pending_cleanup(&self) -> usize {
        self.cleanup.len()
    }

    /// Tags of pending cleanup entries, in scheduling order
    pub fn cleanup_tags(&self) -> Vec<&'static str> {
        self.cleanup.iter().map(|r| r.tag()).collect()
    }

    /// Drain the cleanup queue, handing ownership of the entries to the
    /// caller (the external driver). Used by [`crate::role::run_cleanup`].
    pub fn take_cleanup(&mut self) -> Vec<Box<dyn Role>> {
        std::mem::take(&mut self.cleanup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NginxRole;
    impl Role for NginxRole {
        fn tag(&self) -> &'static str {
            "nginx"
        }
    }

    struct PostgresRole;
    impl Role for PostgresRole {
        fn tag(&self) -> &'static str {
            "postgres"
        }
    }

    #[test]
    fn test_host_is_constant() {
        let ctx = Context::new("web01");
        assert_eq!(ctx.host(), "web01");
    }

    #[test]
    fn test_values_roundtrip() {
        let mut ctx = Context::new("web01");
        ctx.set("port", 8080);
        ctx.set("owner", "deploy");
        assert_eq!(ctx.get("port").and_then(Value::as_i64), Some(8080));
        assert_eq!(ctx.get_str("owner"), Some("deploy"));
        assert!(ctx.get("missing").is_none());
    }

    #[test]
    fn test_register_template_source_is_idempotent() {
        let mut ctx = Context::new("web01");
        ctx.register_template_source("/srv/templates");
        ctx.register_template_source("/srv/templates");
        ctx.register_template_source("/srv/templates");
        assert_eq!(ctx.template_sources().len(), 1);

        ctx.register_template_source("/opt/templates");
        assert_eq!(ctx.template_sources().len(), 2);
        // Registration order is preserved.
        assert_eq!(ctx.template_sources()[0], PathBuf::from("/srv/templates"));
    }

    #[test]
    fn test_schedule_cleanup_dedups_by_tag() {
        let mut ctx = Context::new("web01");
        ctx.schedule_cleanup(Box::new(NginxRole));
        ctx.schedule_cleanup(Box::new(NginxRole));
        ctx.schedule_cleanup(Box::new(NginxRole));
        assert_eq!(ctx.pending_cleanup(), 1);

        ctx.schedule_cleanup(Box::new(PostgresRole));
        assert_eq!(ctx.pending_cleanup(), 2);
        assert_eq!(ctx.cleanup_tags(), vec!["nginx", "postgres"]);
    }

    #[test]
    fn test_take_cleanup_drains_queue() {
        let mut ctx = Context::new("web01");
        ctx.schedule_cleanup(Box::new(NginxRole));
        let drained = ctx.take_cleanup();
        assert_eq!(drained.len(), 1);
        assert_eq!(ctx.pending_cleanup(), 0);
    }
}
