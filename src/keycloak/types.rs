//! Keycloak type definitions
//!
//! Wire representations of the user-profile document served at
//! `/admin/realms/{realm}/users/profile`, plus the few realm and server-info
//! fields the reconciliation needs.

use crate::domain::UnmanagedAttributePolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Full user-profile document. The endpoint has replace semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<UserProfileAttribute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<UserProfileGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmanaged_attribute_policy: Option<UnmanagedAttributePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileAttribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<BTreeMap<String, Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<UserProfileRequired>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<UserProfilePermissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<UserProfileSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Spelled `multivalued` by the server
    #[serde(
        default,
        rename = "multivalued",
        skip_serializing_if = "Option::is_none"
    )]
    pub multi_valued: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfileRequired {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfilePermissions {
    #[serde(default)]
    pub view: Vec<String>,
    #[serde(default)]
    pub edit: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfileSelector {
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Map<String, Value>>,
}

/// Keycloak realm representation, reduced to what the profile feature check reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakRealm {
    pub realm: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl KeycloakRealm {
    /// Realm attribute that switches user profile on before version 24
    pub const USER_PROFILE_ENABLED: &'static str = "userProfileEnabled";

    /// Absent counts as disabled
    pub fn user_profile_enabled(&self) -> bool {
        self.attributes
            .get(Self::USER_PROFILE_ENABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// `GET /admin/serverinfo`, reduced to the version
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub system_info: SystemInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    pub version: String,
}
