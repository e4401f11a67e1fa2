// src/role.rs

//! Role lifecycle: provisioning, nesting, and deferred cleanup
//!
//! A [`Role`] is a unit of idempotent provisioning logic. Roles are stateless
//! beyond the handles passed into their methods and are constructed fresh
//! (via `Default`) for every nested invocation; the cleanup queue therefore
//! only ever holds default-constructed state for scope-delegated roles.
//!
//! Two nesting protocols are supported:
//!
//! - [`Provisioner::provision_role`]: direct delegation. The nested role's
//!   `provision` completes fully before the caller continues, and its cleanup
//!   is scheduled (not run) immediately after.
//! - [`Provisioner::using`]: scoped delegation. The role is provisioned and
//!   yielded to the scope body for further calls; on scope exit (whether the
//!   body succeeded or failed) cleanup is scheduled for a *fresh* instance
//!   of the same role. A failed `provision` never reaches scope exit, so
//!   nothing is scheduled in that case.
//!
//! Cleanup scheduling deduplicates by [`Role::tag`], so a role provisioned
//! many times during one run is cleaned up exactly once.

use crate::context::Context;
use crate::convergence::Provisioner;
use crate::error::Result;
use tracing::debug;

/// A unit of idempotent provisioning logic.
///
/// `provision` is the sole operation roles are expected to override;
/// `cleanup` is optional and runs at end of run, after every role for the
/// host has been provisioned. Both default to no-ops.
///
/// Roles whose cleanup depends on state mutated during `provision` must use
/// [`Provisioner::provision_role`] (which schedules the provisioned instance)
/// or park that state in the [`Context`]; scoped delegation schedules a
/// default-constructed instance.
pub trait Role {
    /// Stable identifier for this role kind. The cleanup queue keys on it.
    fn tag(&self) -> &'static str;

    /// Converge the host towards this role's desired state.
    fn provision(&mut self, prov: &mut Provisioner, ctx: &mut Context) -> Result<()> {
        let _ = (prov, ctx);
        Ok(())
    }

    /// Tear down or finalize resources at end of run.
    fn cleanup(&mut self, prov: &mut Provisioner, ctx: &mut Context) -> Result<()> {
        let _ = (prov, ctx);
        Ok(())
    }
}

impl Provisioner {
    /// Provision a nested role, then schedule its cleanup.
    ///
    /// The nested `provision` runs to completion before this returns; its
    /// cleanup is scheduled unconditionally afterwards. A failed `provision`
    /// propagates immediately and schedules nothing.
    pub fn provision_role<R>(&mut self, ctx: &mut Context) -> Result<()>
    where
        R: Role + Default + 'static,
    {
        let mut role = R::default();
        debug!(tag = role.tag(), host = ctx.host(), "provisioning nested role");
        role.provision(self, ctx)?;
        ctx.schedule_cleanup(Box::new(role));
        Ok(())
    }

    /// Provision a role and yield it to `body` for further calls.
    ///
    /// On scope exit, with `body` returning `Ok` or `Err` alike, cleanup is
    /// scheduled for a fresh instance of `R`, not the one the body used.
    /// Dedup by tag makes the fresh instance sufficient, and it avoids
    /// carrying call-specific state into the cleanup queue.
    pub fn using<R, T, F>(&mut self, ctx: &mut Context, body: F) -> Result<T>
    where
        R: Role + Default + 'static,
        F: FnOnce(&mut R, &mut Provisioner, &mut Context) -> Result<T>,
    {
        let mut role = R::default();
        debug!(tag = role.tag(), host = ctx.host(), "entering role scope");
        role.provision(self, ctx)?;
        let result = body(&mut role, self, ctx);
        ctx.schedule_cleanup(Box::new(R::default()));
        result
    }
}

/// Drain the context's cleanup queue, invoking `cleanup` on each entry in
/// scheduling order. The external driver must call this after all roles for
/// the host have been provisioned, then discard the context.
///
/// Errors propagate immediately; entries after a failing one stay undrained.
pub fn run_cleanup(prov: &mut Provisioner, ctx: &mut Context) -> Result<()> {
    for mut role in ctx.take_cleanup() {
        debug!(tag = role.tag(), host = ctx.host(), "running scheduled cleanup");
        role.cleanup(prov, ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockRunner, MockTransport};

    fn mock_provisioner() -> Provisioner {
        Provisioner::new(Box::new(MockRunner::new()), Box::new(MockTransport::new()))
    }

    fn push_event(ctx: &mut Context, event: &str) {
        let mut events = ctx
            .get("events")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        events.push(event.into());
        ctx.set("events", events);
    }

    fn events(ctx: &Context) -> Vec<String> {
        ctx.get("events")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    }

    #[derive(Default)]
    struct InnerRole;
    impl Role for InnerRole {
        fn tag(&self) -> &'static str {
            "inner"
        }
        fn provision(&mut self, _prov: &mut Provisioner, ctx: &mut Context) -> Result<()> {
            push_event(ctx, "inner.provision");
            Ok(())
        }
        fn cleanup(&mut self, _prov: &mut Provisioner, ctx: &mut Context) -> Result<()> {
            push_event(ctx, "inner.cleanup");
            Ok(())
        }
    }

    #[derive(Default)]
    struct OuterRole;
    impl Role for OuterRole {
        fn tag(&self) -> &'static str {
            "outer"
        }
        fn provision(&mut self, prov: &mut Provisioner, ctx: &mut Context) -> Result<()> {
            prov.provision_role::<InnerRole>(ctx)?;
            push_event(ctx, "outer.provision");
            Ok(())
        }
        fn cleanup(&mut self, _prov: &mut Provisioner, ctx: &mut Context) -> Result<()> {
            push_event(ctx, "outer.cleanup");
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingRole;
    impl Role for FailingRole {
        fn tag(&self) -> &'static str {
            "failing"
        }
        fn provision(&mut self, _prov: &mut Provisioner, _ctx: &mut Context) -> Result<()> {
            Err(crate::Error::CommandFailed {
                command: "false".into(),
                detail: "exit 1".into(),
            })
        }
    }

    #[test]
    fn test_provision_role_runs_then_schedules() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        prov.provision_role::<InnerRole>(&mut ctx).unwrap();
        assert_eq!(events(&ctx), vec!["inner.provision"]);
        assert_eq!(ctx.cleanup_tags(), vec!["inner"]);
    }

    #[test]
    fn test_nested_provision_completes_before_caller_continues() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        prov.provision_role::<OuterRole>(&mut ctx).unwrap();
        // Inner finished before outer's own work ran.
        assert_eq!(events(&ctx), vec!["inner.provision", "outer.provision"]);
        assert_eq!(ctx.cleanup_tags(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_provision_role_failure_schedules_nothing() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        assert!(prov.provision_role::<FailingRole>(&mut ctx).is_err());
        assert_eq!(ctx.pending_cleanup(), 0);
    }

    #[test]
    fn test_using_yields_instance_and_schedules_on_success() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        let out = prov
            .using(&mut ctx, |_role: &mut InnerRole, _prov, ctx| {
                push_event(ctx, "body");
                Ok(42)
            })
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(events(&ctx), vec!["inner.provision", "body"]);
        assert_eq!(ctx.cleanup_tags(), vec!["inner"]);
    }

    #[test]
    fn test_using_schedules_even_when_body_fails() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        let result: Result<()> = prov.using(&mut ctx, |_role: &mut InnerRole, _prov, _ctx| {
            Err(crate::Error::CommandFailed {
                command: "boom".into(),
                detail: "scope body failed".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(ctx.cleanup_tags(), vec!["inner"]);
    }

    #[test]
    fn test_using_skips_scheduling_when_provision_fails() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        let result: Result<()> =
            prov.using(&mut ctx, |_role: &mut FailingRole, _prov, _ctx| Ok(()));
        assert!(result.is_err());
        assert_eq!(ctx.pending_cleanup(), 0);
    }

    #[test]
    fn test_repeated_provisioning_cleans_up_once() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        for _ in 0..5 {
            prov.provision_role::<InnerRole>(&mut ctx).unwrap();
        }
        assert_eq!(ctx.pending_cleanup(), 1);
    }

    #[test]
    fn test_run_cleanup_drains_in_order() {
        let mut prov = mock_provisioner();
        let mut ctx = Context::new("web01");
        prov.provision_role::<OuterRole>(&mut ctx).unwrap();
        ctx.set("events", Vec::<serde_json::Value>::new());

        run_cleanup(&mut prov, &mut ctx).unwrap();
        assert_eq!(events(&ctx), vec!["inner.cleanup", "outer.cleanup"]);
        assert_eq!(ctx.pending_cleanup(), 0);
    }
}
