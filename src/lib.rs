//! Realm Profile Sync - declarative Keycloak user-profile reconciliation
//!
//! This crate models a realm's user-profile policy (attributes, groups,
//! validators, permissions and the unmanaged attribute policy) and keeps a
//! Keycloak server convergent to a declared profile across server versions.

pub mod config;
pub mod declaration;
pub mod domain;
pub mod error;
pub mod keycloak;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{ProfileError, Result};
