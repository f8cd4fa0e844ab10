//! Unified error handling for realm profile reconciliation

use crate::keycloak::TransportError;
use std::fmt;
use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, ProfileError>;

/// Step of a reconciliation pass that issued a network call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    /// Server version or realm feature lookup
    Discovery,
    /// Standalone read with no write following
    Read,
    FetchBeforeWrite,
    Write,
    FetchAfterWrite,
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportPhase::Discovery => "discovery",
            TransportPhase::Read => "read",
            TransportPhase::FetchBeforeWrite => "fetch-before-write",
            TransportPhase::Write => "write",
            TransportPhase::FetchAfterWrite => "fetch-after-write",
        };
        f.write_str(s)
    }
}

/// Which half of an attribute's permissions block is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionSide {
    View,
    Edit,
}

impl fmt::Display for PermissionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionSide::View => f.write_str("view"),
            PermissionSide::Edit => f.write_str("edit"),
        }
    }
}

/// Reconciliation error types
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("User Profile is disabled for realm '{realm}'")]
    UserProfileFeatureDisabled { realm: String },

    #[error("Missing mandatory attribute(s): {}", .missing.join(", "))]
    MissingMandatoryAttribute { missing: Vec<String> },

    #[error("Missing required argument: attribute '{attribute}' permissions must define at least one '{side}' role")]
    MissingRequiredPermissionSide {
        attribute: String,
        side: PermissionSide,
    },

    #[error("Malformed config value at {path}: {message}")]
    MalformedConfigValue { path: String, message: String },

    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Attribute '{attribute}' references unknown group '{group}'")]
    UnknownGroup { attribute: String, group: String },

    #[error("Transport error during {phase}: {source}")]
    Transport {
        phase: TransportPhase,
        #[source]
        source: TransportError,
    },

    #[error("Operation cancelled during {phase}")]
    Cancelled { phase: TransportPhase },
}

impl ProfileError {
    pub(crate) fn transport(phase: TransportPhase) -> impl FnOnce(TransportError) -> Self {
        move |source| ProfileError::Transport { phase, source }
    }

    /// True when a write was issued but its effect on the remote state is unknown.
    ///
    /// A status rejection of the write is a clean failure: the declared state was
    /// refused. Anything that loses the response of the write, or fails while
    /// confirming it, leaves the remote profile in an unconfirmed state.
    pub fn state_unconfirmed(&self) -> bool {
        match self {
            ProfileError::Transport {
                phase: TransportPhase::FetchAfterWrite,
                ..
            } => true,
            ProfileError::Transport {
                phase: TransportPhase::Write,
                source,
            } => !source.left_state_unchanged(),
            ProfileError::Cancelled { phase } => {
                matches!(phase, TransportPhase::Write | TransportPhase::FetchAfterWrite)
            }
            _ => false,
        }
    }

    /// True for errors raised by local validation, before any mutating call
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ProfileError::MissingMandatoryAttribute { .. }
                | ProfileError::MissingRequiredPermissionSide { .. }
                | ProfileError::MalformedConfigValue { .. }
                | ProfileError::DuplicateName { .. }
                | ProfileError::UnknownGroup { .. }
        )
    }

    /// Short label for metrics
    pub fn outcome_label(&self) -> &'static str {
        match self {
            ProfileError::UserProfileFeatureDisabled { .. } => "feature_disabled",
            ProfileError::MissingMandatoryAttribute { .. } => "missing_mandatory_attribute",
            ProfileError::MissingRequiredPermissionSide { .. } => "missing_permission_side",
            ProfileError::MalformedConfigValue { .. } => "malformed_config_value",
            ProfileError::DuplicateName { .. } | ProfileError::UnknownGroup { .. } => {
                "invalid_declaration"
            }
            ProfileError::Transport { .. } => "transport_failure",
            ProfileError::Cancelled { .. } => "cancelled",
        }
    }
}
