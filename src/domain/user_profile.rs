//! Realm user-profile domain types

use super::config_value::{ConfigMap, ConfigValue};
use crate::error::{PermissionSide, ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

/// Attribute names the server requires from version 23 onward
pub const MANDATORY_ATTRIBUTES: [&str; 2] = ["username", "email"];

/// How attributes not declared in the profile are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnmanagedAttributePolicy {
    #[serde(rename = "ENABLED")]
    Enabled,
    #[serde(rename = "DISABLED")]
    Disabled,
    #[serde(rename = "ADMIN_EDIT", alias = "ADMINEDIT")]
    AdminEdit,
    #[serde(rename = "ADMIN_VIEW", alias = "ADMINVIEW")]
    AdminView,
}

impl UnmanagedAttributePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmanagedAttributePolicy::Enabled => "ENABLED",
            UnmanagedAttributePolicy::Disabled => "DISABLED",
            UnmanagedAttributePolicy::AdminEdit => "ADMIN_EDIT",
            UnmanagedAttributePolicy::AdminView => "ADMIN_VIEW",
        }
    }
}

impl fmt::Display for UnmanagedAttributePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnmanagedAttributePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENABLED" => Ok(UnmanagedAttributePolicy::Enabled),
            "DISABLED" => Ok(UnmanagedAttributePolicy::Disabled),
            "ADMIN_EDIT" | "ADMINEDIT" => Ok(UnmanagedAttributePolicy::AdminEdit),
            "ADMIN_VIEW" | "ADMINVIEW" => Ok(UnmanagedAttributePolicy::AdminView),
            other => Err(format!("unknown unmanaged attribute policy: {}", other)),
        }
    }
}

/// Scopes under which an attribute participates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub scopes: BTreeSet<String>,
}

/// Roles and scopes that make an attribute mandatory.
///
/// A present but empty `RequiredBy` means the attribute is always required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredBy {
    pub roles: BTreeSet<String>,
    pub scopes: BTreeSet<String>,
}

/// Roles allowed to view and edit an attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    pub view: BTreeSet<String>,
    pub edit: BTreeSet<String>,
}

impl Permissions {
    pub fn is_empty(&self) -> bool {
        self.view.is_empty() && self.edit.is_empty()
    }
}

/// A declared user attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub display_name: Option<String>,
    pub multi_valued: bool,
    pub group: Option<String>,
    pub selector: Option<Selector>,
    pub required: Option<RequiredBy>,
    pub permissions: Option<Permissions>,
    /// Validator name to its configuration. An empty map is a valid configuration.
    pub validations: BTreeMap<String, ConfigMap>,
    pub annotations: ConfigMap,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_permissions<V, E>(mut self, view: V, edit: E) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        self.permissions = Some(Permissions {
            view: view.into_iter().map(Into::into).collect(),
            edit: edit.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_validation(mut self, validator: impl Into<String>, config: ConfigMap) -> Self {
        self.validations.insert(validator.into(), config);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.annotations.insert(key.into(), value);
        self
    }

    /// Permission blocks must name at least one role on each side
    fn validate_permissions(&self) -> Result<()> {
        let Some(permissions) = &self.permissions else {
            return Ok(());
        };
        if permissions.view.is_empty() {
            return Err(ProfileError::MissingRequiredPermissionSide {
                attribute: self.name.clone(),
                side: PermissionSide::View,
            });
        }
        if permissions.edit.is_empty() {
            return Err(ProfileError::MissingRequiredPermissionSide {
                attribute: self.name.clone(),
                side: PermissionSide::Edit,
            });
        }
        Ok(())
    }
}

/// A named group of attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub name: String,
    pub display_header: Option<String>,
    pub display_description: Option<String>,
    pub annotations: ConfigMap,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The user-profile policy of one realm
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub realm_id: String,
    /// Kept in declaration order for payload stability
    pub attributes: Vec<Attribute>,
    pub groups: Vec<Group>,
    /// `None` leaves the policy to the server default
    pub unmanaged_attribute_policy: Option<UnmanagedAttributePolicy>,
}

impl UserProfile {
    pub fn new(realm_id: impl Into<String>) -> Self {
        Self {
            realm_id: realm_id.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Version-independent checks run before any network call.
    ///
    /// Rejects duplicate attribute or group names, attributes that reference a
    /// group not declared in this profile, and permission blocks with an empty
    /// side.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(ProfileError::DuplicateName {
                    kind: "group",
                    name: group.name.clone(),
                });
            }
        }

        let mut seen_attributes = HashSet::new();
        for attribute in &self.attributes {
            if !seen_attributes.insert(attribute.name.as_str()) {
                return Err(ProfileError::DuplicateName {
                    kind: "attribute",
                    name: attribute.name.clone(),
                });
            }
            if let Some(group) = &attribute.group {
                if !seen.contains(group.as_str()) {
                    return Err(ProfileError::UnknownGroup {
                        attribute: attribute.name.clone(),
                        group: group.clone(),
                    });
                }
            }
            attribute.validate_permissions()?;
        }
        Ok(())
    }

    /// Names from [`MANDATORY_ATTRIBUTES`] that this profile does not declare
    pub fn missing_mandatory_attributes(&self) -> Vec<String> {
        MANDATORY_ATTRIBUTES
            .iter()
            .filter(|name| self.attribute(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }
}
