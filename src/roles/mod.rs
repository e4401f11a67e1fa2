// src/roles/mod.rs

//! Bundled roles
//!
//! Ready-made roles built on the convergence engine. Roles in this namespace
//! are meant to be invoked from user roles through
//! [`Provisioner::using`](crate::Provisioner::using) or
//! [`Provisioner::provision_role`](crate::Provisioner::provision_role).

pub mod users;

pub use users::{UserOptions, UserRole};
