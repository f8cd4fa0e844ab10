//! Declarative profile files
//!
//! Operators describe a profile in JSON. Validator configuration and
//! annotation values are JSON-encoded strings, e.g.
//! `"annotations": {"inputType": "\"text\""}`, so every value keeps its exact
//! type. Decoding failures report the key path of the offending value.

use crate::domain::config_value::decode_map_at;
use crate::domain::{Attribute, Group, Permissions, RequiredBy, Selector, UserProfile};
use crate::error::{ProfileError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileDeclaration {
    #[serde(default)]
    pub unmanaged_attribute_policy: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDeclaration>,
    #[serde(default)]
    pub groups: Vec<GroupDeclaration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDeclaration {
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub multi_valued: bool,
    pub group: Option<String>,
    #[serde(default)]
    pub enabled_when_scope: Vec<String>,
    /// Required for everyone, regardless of roles and scopes
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub required_for_roles: Vec<String>,
    #[serde(default)]
    pub required_for_scopes: Vec<String>,
    pub permissions: Option<PermissionsDeclaration>,
    #[serde(default)]
    pub validators: Vec<ValidatorDeclaration>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionsDeclaration {
    #[serde(default)]
    pub view: Vec<String>,
    #[serde(default)]
    pub edit: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorDeclaration {
    pub name: String,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDeclaration {
    pub name: String,
    pub display_header: Option<String>,
    pub display_description: Option<String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl ProfileDeclaration {
    /// Build the domain profile for `realm`, decoding every encoded value
    pub fn into_profile(self, realm: &str) -> Result<UserProfile> {
        let unmanaged_attribute_policy = self
            .unmanaged_attribute_policy
            .as_deref()
            .map(|p| {
                p.parse()
                    .map_err(|message| ProfileError::MalformedConfigValue {
                        path: "unmanaged_attribute_policy".to_string(),
                        message,
                    })
            })
            .transpose()?;

        let attributes = self
            .attributes
            .into_iter()
            .map(AttributeDeclaration::into_attribute)
            .collect::<Result<Vec<_>>>()?;
        let groups = self
            .groups
            .into_iter()
            .map(GroupDeclaration::into_group)
            .collect::<Result<Vec<_>>>()?;

        Ok(UserProfile {
            realm_id: realm.to_string(),
            attributes,
            groups,
            unmanaged_attribute_policy,
        })
    }
}

impl AttributeDeclaration {
    fn into_attribute(self) -> Result<Attribute> {
        let path = format!("attribute[{}]", self.name);

        let mut validations = BTreeMap::new();
        for validator in &self.validators {
            let config = decode_map_at(
                &format!("{}.validations.{}", path, validator.name),
                &validator.config,
            )?;
            if validations.insert(validator.name.clone(), config).is_some() {
                return Err(ProfileError::DuplicateName {
                    kind: "validator",
                    name: format!("{}.{}", self.name, validator.name),
                });
            }
        }
        let annotations = decode_map_at(&format!("{}.annotations", path), &self.annotations)?;

        let selector = (!self.enabled_when_scope.is_empty()).then(|| Selector {
            scopes: to_set(self.enabled_when_scope),
        });
        let required = (self.required
            || !self.required_for_roles.is_empty()
            || !self.required_for_scopes.is_empty())
        .then(|| RequiredBy {
            roles: to_set(self.required_for_roles),
            scopes: to_set(self.required_for_scopes),
        });
        let permissions = self.permissions.map(|p| Permissions {
            view: to_set(p.view),
            edit: to_set(p.edit),
        });

        Ok(Attribute {
            name: self.name,
            display_name: self.display_name,
            multi_valued: self.multi_valued,
            group: self.group,
            selector,
            required,
            permissions,
            validations,
            annotations,
        })
    }
}

impl GroupDeclaration {
    fn into_group(self) -> Result<Group> {
        let annotations = decode_map_at(
            &format!("group[{}].annotations", self.name),
            &self.annotations,
        )?;
        Ok(Group {
            name: self.name,
            display_header: self.display_header,
            display_description: self.display_description,
            annotations,
        })
    }
}

fn to_set(values: Vec<String>) -> BTreeSet<String> {
    values.into_iter().collect()
}
