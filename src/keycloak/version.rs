//! Keycloak server versions and the user-profile capabilities they carry
//!
//! This is the only place that compares raw version numbers. Everything else
//! branches on [`CapabilitySet`].

use std::cmp::Ordering;
use std::fmt;

/// First major version that rejects profiles without `username` and `email`
pub const MANDATORY_ATTRIBUTES_SINCE: u32 = 23;
/// First major version with `unmanagedAttributePolicy` and multi-valued attributes.
/// From here on user profile is always enabled.
pub const UNMANAGED_POLICY_SINCE: u32 = 24;

/// A parsed Keycloak version such as `24.0.5` or `26.1.0-SNAPSHOT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerVersion {
    Release { major: u32, minor: u32, patch: u32 },
    /// Unparseable or development builds, treated as newer than any release
    Unknown(String),
}

impl ServerVersion {
    /// Parse a version string. Never fails: anything that does not start with a
    /// numeric major version is [`ServerVersion::Unknown`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        // Nightly builds report 999.0.0-SNAPSHOT
        let core = trimmed.split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.').map(|p| p.parse::<u32>());

        match parts.next() {
            Some(Ok(major)) if major < 999 => {
                let minor = parts.next().and_then(|p| p.ok()).unwrap_or(0);
                let patch = parts.next().and_then(|p| p.ok()).unwrap_or(0);
                ServerVersion::Release {
                    major,
                    minor,
                    patch,
                }
            }
            _ => ServerVersion::Unknown(trimmed.to_string()),
        }
    }

    pub fn major(&self) -> Option<u32> {
        match self {
            ServerVersion::Release { major, .. } => Some(*major),
            ServerVersion::Unknown(_) => None,
        }
    }

    /// True when this version is at or beyond the given major release
    pub fn at_least(&self, major: u32) -> bool {
        self.major().map_or(true, |m| m >= major)
    }
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                ServerVersion::Release {
                    major: a,
                    minor: b,
                    patch: c,
                },
                ServerVersion::Release {
                    major: x,
                    minor: y,
                    patch: z,
                },
            ) => (a, b, c).cmp(&(x, y, z)),
            (ServerVersion::Release { .. }, ServerVersion::Unknown(_)) => Ordering::Less,
            (ServerVersion::Unknown(_), ServerVersion::Release { .. }) => Ordering::Greater,
            (ServerVersion::Unknown(a), ServerVersion::Unknown(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerVersion::Release {
                major,
                minor,
                patch,
            } => write!(f, "{}.{}.{}", major, minor, patch),
            ServerVersion::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// User-profile behaviors available on a server version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    pub requires_username_email_attributes: bool,
    pub supports_unmanaged_attribute_policy: bool,
    pub multi_valued_supported: bool,
    /// User profile can be switched per realm through the `userProfileEnabled`
    /// realm attribute. Later versions have it always on.
    pub feature_togglable_by_realm_attribute: bool,
}

impl CapabilitySet {
    pub fn resolve(version: &ServerVersion) -> Self {
        let unmanaged = version.at_least(UNMANAGED_POLICY_SINCE);
        Self {
            requires_username_email_attributes: version.at_least(MANDATORY_ATTRIBUTES_SINCE),
            supports_unmanaged_attribute_policy: unmanaged,
            multi_valued_supported: unmanaged,
            feature_togglable_by_realm_attribute: !unmanaged,
        }
    }
}
