// src/roles/users.rs

//! User and group management role
//!
//! Every operation converges: groups and users are created only when absent,
//! memberships are granted only when missing. `ensure_user` records the
//! ensured user under the context's `owner` key so later file pushes can pick
//! it up as the default owner.

use crate::context::Context;
use crate::convergence::Provisioner;
use crate::error::Result;
use crate::role::Role;
use tracing::info;

/// Options for [`UserRole::ensure_user`]
#[derive(Debug, Clone)]
pub struct UserOptions {
    /// Login password; without one the user cannot log in by password
    pub password: Option<String>,
    /// Home directory; defaults to `/home/<username>`
    pub home: Option<String>,
    /// Login shell
    pub shell: String,
    /// Supplementary groups, created when absent; the first one becomes the
    /// primary group (the username otherwise)
    pub groups: Vec<String>,
    /// Also add the user to the `admin` group
    pub is_admin: bool,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            password: None,
            home: None,
            shell: "/bin/bash".to_string(),
            groups: Vec::new(),
            is_admin: false,
        }
    }
}

/// Role providing user management operations on the target host
#[derive(Debug, Default)]
pub struct UserRole;

impl Role for UserRole {
    fn tag(&self) -> &'static str {
        "users"
    }
}

impl UserRole {
    /// Whether a group exists on the target
    pub fn group_exists(&self, prov: &Provisioner, group: &str) -> Result<bool> {
        let groups = prov.read_remote_file("/etc/group", false)?;
        Ok(groups
            .lines()
            .any(|line| line.split(':').next() == Some(group)))
    }

    /// Whether a user exists on the target
    pub fn user_exists(&self, prov: &Provisioner, username: &str) -> Result<bool> {
        let passwd = prov.read_remote_file("/etc/passwd", false)?;
        Ok(passwd
            .lines()
            .any(|line| line.split(':').next() == Some(username)))
    }

    /// Whether a user belongs to a group
    pub fn user_in_group(&self, prov: &Provisioner, username: &str, group: &str) -> Result<bool> {
        let out = prov.execute(&format!("groups {username}"), true, true)?;
        Ok(out.split_whitespace().any(|g| g == group))
    }

    /// Create a group if it does not exist
    pub fn ensure_group(&self, prov: &Provisioner, group: &str) -> Result<()> {
        if !self.group_exists(prov, group)? {
            info!(group, "group not found, creating");
            prov.execute(&format!("groupadd {group}"), true, true)?;
        }
        Ok(())
    }

    /// Grant each missing group membership
    pub fn ensure_user_groups(
        &self,
        prov: &Provisioner,
        username: &str,
        groups: &[String],
    ) -> Result<()> {
        for group in groups {
            if !self.user_in_group(prov, username, group)? {
                info!(user = username, group = %group, "granting group membership");
                prov.execute(&format!("usermod -G {group} {username}"), true, true)?;
            }
        }
        Ok(())
    }

    /// Ensure a user is present with the given settings.
    ///
    /// Creates missing groups first, then the user when absent; an existing
    /// user is only promoted to admin when requested. Records the username
    /// under the context's `owner` key.
    pub fn ensure_user(
        &self,
        prov: &Provisioner,
        ctx: &mut Context,
        username: &str,
        opts: &UserOptions,
    ) -> Result<()> {
        let home = opts
            .home
            .clone()
            .unwrap_or_else(|| format!("/home/{username}"));
        let primary_group = opts
            .groups
            .first()
            .map(String::as_str)
            .unwrap_or(username);

        for group in &opts.groups {
            self.ensure_group(prov, group)?;
        }
        self.ensure_group(prov, primary_group)?;

        if !self.user_exists(prov, username)? {
            info!(user = username, "user not found, creating");
            let admin_flag = if opts.is_admin { "-G admin " } else { "" };
            let password = opts.password.as_deref().unwrap_or("none");
            prov.execute(
                &format!(
                    "useradd -g {primary_group} {admin_flag}-s {shell} -p {password} -d {home} -m {username}",
                    shell = opts.shell,
                ),
                true,
                true,
            )?;
        } else if opts.is_admin && !self.user_in_group(prov, username, "admin")? {
            info!(user = username, "promoting existing user to admin");
            prov.execute(&format!("usermod -G admin {username}"), true, true)?;
        }

        self.ensure_user_groups(prov, username, &opts.groups)?;

        if let Some(ref password) = opts.password {
            prov.execute(
                &format!("echo \"{username}:{password}\" | chpasswd"),
                true,
                true,
            )?;
        }

        ctx.set("owner", username);
        Ok(())
    }
}
