//! Mapping between the domain [`UserProfile`] and the Keycloak wire document

use super::types::*;
use super::version::CapabilitySet;
use crate::domain::config_value::{map_from_json, map_to_json_at};
use crate::domain::{
    Attribute, Group, Permissions, RequiredBy, Selector, UserProfile,
};
use crate::error::Result;
use std::collections::BTreeSet;
use tracing::warn;

/// Path of the user-profile document for a realm, relative to the server URL
pub fn user_profile_path(realm: &str) -> String {
    format!("/admin/realms/{}/users/profile", urlencoding::encode(realm))
}

/// Path of the realm representation
pub fn realm_path(realm: &str) -> String {
    format!("/admin/realms/{}", urlencoding::encode(realm))
}

/// Render a declared profile into the full document sent to the server.
///
/// Fields the server version does not understand are omitted rather than sent
/// as `null`.
pub fn render_profile(profile: &UserProfile, caps: &CapabilitySet) -> Result<UserProfileConfig> {
    let attributes = profile
        .attributes
        .iter()
        .map(|a| render_attribute(a, caps))
        .collect::<Result<Vec<_>>>()?;
    let groups = profile
        .groups
        .iter()
        .map(render_group)
        .collect::<Result<Vec<_>>>()?;

    let unmanaged_attribute_policy = if caps.supports_unmanaged_attribute_policy {
        profile.unmanaged_attribute_policy
    } else {
        if let Some(policy) = profile.unmanaged_attribute_policy {
            warn!(
                realm = %profile.realm_id,
                %policy,
                "Server does not support unmanagedAttributePolicy, omitting it"
            );
        }
        None
    };

    Ok(UserProfileConfig {
        attributes: Some(attributes),
        groups: Some(groups),
        unmanaged_attribute_policy,
    })
}

fn render_attribute(attribute: &Attribute, caps: &CapabilitySet) -> Result<UserProfileAttribute> {
    let path = format!("attribute[{}]", attribute.name);

    let validations = if attribute.validations.is_empty() {
        None
    } else {
        let mut out = std::collections::BTreeMap::new();
        for (validator, config) in &attribute.validations {
            let config_path = format!("{}.validations.{}", path, validator);
            out.insert(validator.clone(), map_to_json_at(&config_path, config)?);
        }
        Some(out)
    };

    let annotations = if attribute.annotations.is_empty() {
        None
    } else {
        Some(map_to_json_at(
            &format!("{}.annotations", path),
            &attribute.annotations,
        )?)
    };

    let multi_valued = if caps.multi_valued_supported {
        Some(attribute.multi_valued)
    } else {
        if attribute.multi_valued {
            warn!(
                attribute = %attribute.name,
                "Server does not support multi-valued attributes, omitting multivalued"
            );
        }
        None
    };

    Ok(UserProfileAttribute {
        name: attribute.name.clone(),
        display_name: attribute.display_name.clone(),
        validations,
        annotations,
        required: attribute.required.as_ref().map(|r| UserProfileRequired {
            roles: non_empty(&r.roles),
            scopes: non_empty(&r.scopes),
        }),
        permissions: attribute
            .permissions
            .as_ref()
            .map(|p| UserProfilePermissions {
                view: p.view.iter().cloned().collect(),
                edit: p.edit.iter().cloned().collect(),
            }),
        selector: attribute
            .selector
            .as_ref()
            .filter(|s| !s.scopes.is_empty())
            .map(|s| UserProfileSelector {
                scopes: s.scopes.iter().cloned().collect(),
            }),
        group: attribute.group.clone(),
        multi_valued,
    })
}

fn render_group(group: &Group) -> Result<UserProfileGroup> {
    let annotations = if group.annotations.is_empty() {
        None
    } else {
        Some(map_to_json_at(
            &format!("group[{}].annotations", group.name),
            &group.annotations,
        )?)
    };

    Ok(UserProfileGroup {
        name: group.name.clone(),
        display_header: group.display_header.clone(),
        display_description: group.display_description.clone(),
        annotations,
    })
}

fn non_empty(set: &BTreeSet<String>) -> Option<Vec<String>> {
    if set.is_empty() {
        None
    } else {
        Some(set.iter().cloned().collect())
    }
}

fn to_set(values: Option<&Vec<String>>) -> BTreeSet<String> {
    values.into_iter().flatten().cloned().collect()
}

/// Build a domain profile from the document the server returned
pub fn parse_profile(realm: &str, config: &UserProfileConfig) -> UserProfile {
    let attributes = config
        .attributes
        .iter()
        .flatten()
        .map(parse_attribute)
        .collect();
    let groups = config
        .groups
        .iter()
        .flatten()
        .map(|g| Group {
            name: g.name.clone(),
            display_header: g.display_header.clone(),
            display_description: g.display_description.clone(),
            annotations: g.annotations.as_ref().map(map_from_json).unwrap_or_default(),
        })
        .collect();

    UserProfile {
        realm_id: realm.to_string(),
        attributes,
        groups,
        unmanaged_attribute_policy: config.unmanaged_attribute_policy,
    }
}

fn parse_attribute(attribute: &UserProfileAttribute) -> Attribute {
    Attribute {
        name: attribute.name.clone(),
        display_name: attribute.display_name.clone(),
        multi_valued: attribute.multi_valued.unwrap_or(false),
        group: attribute.group.clone(),
        selector: attribute.selector.as_ref().map(|s| Selector {
            scopes: s.scopes.iter().cloned().collect(),
        }),
        required: attribute.required.as_ref().map(|r| RequiredBy {
            roles: to_set(r.roles.as_ref()),
            scopes: to_set(r.scopes.as_ref()),
        }),
        permissions: attribute.permissions.as_ref().map(|p| Permissions {
            view: p.view.iter().cloned().collect(),
            edit: p.edit.iter().cloned().collect(),
        }),
        validations: attribute
            .validations
            .iter()
            .flatten()
            .map(|(name, config)| (name.clone(), map_from_json(config)))
            .collect(),
        annotations: attribute
            .annotations
            .as_ref()
            .map(map_from_json)
            .unwrap_or_default(),
    }
}
