//! Semantic comparison of user profiles
//!
//! Two profiles are equivalent when reconciling one into the other would be a
//! no-op. Attributes and groups are matched by name, absent and empty
//! collections are the same thing, and dynamic config values are compared as
//! values rather than as rendered text.

use super::config_value::{same_map, ConfigMap};
use super::user_profile::{
    Attribute, Group, Permissions, RequiredBy, Selector, UnmanagedAttributePolicy, UserProfile,
};
use crate::keycloak::CapabilitySet;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Meaning of an absent `unmanagedAttributePolicy` on versions that support it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentPolicyInterpretation {
    /// Absence means "not configured" and differs from an explicit `DISABLED`
    #[default]
    Unspecified,
    /// Absence means `DISABLED`, matching how servers report a disabled policy
    Disabled,
}

impl FromStr for AbsentPolicyInterpretation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unspecified" => Ok(AbsentPolicyInterpretation::Unspecified),
            "disabled" => Ok(AbsentPolicyInterpretation::Disabled),
            other => Err(format!("unknown absent policy interpretation: {}", other)),
        }
    }
}

/// One difference between two profiles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    /// Location such as `attribute[phone].permissions.view`
    pub path: String,
    pub detail: String,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.detail)
    }
}

/// Compares profiles under the rules of one server version
#[derive(Debug, Clone, Copy)]
pub struct ProfileComparator {
    capabilities: CapabilitySet,
    absent_policy: AbsentPolicyInterpretation,
}

impl ProfileComparator {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities,
            absent_policy: AbsentPolicyInterpretation::default(),
        }
    }

    pub fn with_absent_policy(mut self, absent_policy: AbsentPolicyInterpretation) -> Self {
        self.absent_policy = absent_policy;
        self
    }

    pub fn equivalent(&self, a: &UserProfile, b: &UserProfile) -> bool {
        self.diff(a, b).is_empty()
    }

    /// Every difference between `a` and `b`, in a stable order
    pub fn diff(&self, a: &UserProfile, b: &UserProfile) -> Vec<Drift> {
        let mut drift = DriftCollector::default();

        let policy_a = self.effective_policy(a.unmanaged_attribute_policy);
        let policy_b = self.effective_policy(b.unmanaged_attribute_policy);
        if policy_a != policy_b {
            drift.push(
                "unmanagedAttributePolicy",
                format!("{} != {}", show_policy(policy_a), show_policy(policy_b)),
            );
        }

        let attrs_a = by_name(&a.attributes, |x| &x.name);
        let attrs_b = by_name(&b.attributes, |x| &x.name);
        for name in union_keys(&attrs_a, &attrs_b) {
            let path = format!("attribute[{}]", name);
            match (attrs_a.get(name), attrs_b.get(name)) {
                (Some(x), Some(y)) => self.diff_attribute(&path, x, y, &mut drift),
                (Some(_), None) => drift.push(&path, "only on the left".to_string()),
                (None, Some(_)) => drift.push(&path, "only on the right".to_string()),
                (None, None) => {}
            }
        }

        let groups_a = by_name(&a.groups, |x| &x.name);
        let groups_b = by_name(&b.groups, |x| &x.name);
        for name in union_keys(&groups_a, &groups_b) {
            let path = format!("group[{}]", name);
            match (groups_a.get(name), groups_b.get(name)) {
                (Some(x), Some(y)) => diff_group(&path, x, y, &mut drift),
                (Some(_), None) => drift.push(&path, "only on the left".to_string()),
                (None, Some(_)) => drift.push(&path, "only on the right".to_string()),
                (None, None) => {}
            }
        }

        drift.0
    }

    fn effective_policy(
        &self,
        policy: Option<UnmanagedAttributePolicy>,
    ) -> Option<UnmanagedAttributePolicy> {
        let absent_is_disabled = !self.capabilities.supports_unmanaged_attribute_policy
            || self.absent_policy == AbsentPolicyInterpretation::Disabled;
        match policy {
            None if absent_is_disabled => Some(UnmanagedAttributePolicy::Disabled),
            other => other,
        }
    }

    fn diff_attribute(&self, path: &str, a: &Attribute, b: &Attribute, drift: &mut DriftCollector) {
        drift.opt_str(&format!("{}.displayName", path), &a.display_name, &b.display_name);
        if self.capabilities.multi_valued_supported && a.multi_valued != b.multi_valued {
            drift.push(
                &format!("{}.multivalued", path),
                format!("{} != {}", a.multi_valued, b.multi_valued),
            );
        }
        drift.opt_str(&format!("{}.group", path), &a.group, &b.group);

        let scopes = |s: &Option<Selector>| -> BTreeSet<String> {
            s.as_ref().map(|s| s.scopes.clone()).unwrap_or_default()
        };
        drift.set(
            &format!("{}.selector.scopes", path),
            &scopes(&a.selector),
            &scopes(&b.selector),
        );

        diff_required(&format!("{}.required", path), &a.required, &b.required, drift);

        let no_permissions = Permissions::default();
        let pa = a.permissions.as_ref().unwrap_or(&no_permissions);
        let pb = b.permissions.as_ref().unwrap_or(&no_permissions);
        drift.set(&format!("{}.permissions.view", path), &pa.view, &pb.view);
        drift.set(&format!("{}.permissions.edit", path), &pa.edit, &pb.edit);

        let validations = format!("{}.validations", path);
        for name in union_keys(&a.validations, &b.validations) {
            let vpath = format!("{}.{}", validations, name);
            match (a.validations.get(name), b.validations.get(name)) {
                (Some(x), Some(y)) => drift.config(&vpath, x, y),
                (Some(_), None) => drift.push(&vpath, "only on the left".to_string()),
                (None, Some(_)) => drift.push(&vpath, "only on the right".to_string()),
                (None, None) => {}
            }
        }

        drift.config(&format!("{}.annotations", path), &a.annotations, &b.annotations);
    }
}

fn diff_group(path: &str, a: &Group, b: &Group, drift: &mut DriftCollector) {
    drift.opt_str(&format!("{}.displayHeader", path), &a.display_header, &b.display_header);
    drift.opt_str(
        &format!("{}.displayDescription", path),
        &a.display_description,
        &b.display_description,
    );
    drift.config(&format!("{}.annotations", path), &a.annotations, &b.annotations);
}

/// An empty `required` block means "always required", so presence matters
fn diff_required(
    path: &str,
    a: &Option<RequiredBy>,
    b: &Option<RequiredBy>,
    drift: &mut DriftCollector,
) {
    match (a, b) {
        (None, None) => {}
        (Some(x), Some(y)) => {
            drift.set(&format!("{}.roles", path), &x.roles, &y.roles);
            drift.set(&format!("{}.scopes", path), &x.scopes, &y.scopes);
        }
        (Some(_), None) => drift.push(path, "only on the left".to_string()),
        (None, Some(_)) => drift.push(path, "only on the right".to_string()),
    }
}

fn by_name<'a, T>(items: &'a [T], name: impl Fn(&T) -> &String) -> BTreeMap<&'a str, &'a T> {
    items.iter().map(|item| (name(item).as_str(), item)).collect()
}

fn union_keys<'a, K: Ord, V, W>(a: &'a BTreeMap<K, V>, b: &'a BTreeMap<K, W>) -> BTreeSet<&'a K> {
    a.keys().chain(b.keys()).collect()
}

fn show_policy(policy: Option<UnmanagedAttributePolicy>) -> String {
    policy.map_or_else(|| "<unset>".to_string(), |p| p.to_string())
}

#[derive(Default)]
struct DriftCollector(Vec<Drift>);

impl DriftCollector {
    fn push(&mut self, path: &str, detail: String) {
        self.0.push(Drift {
            path: path.to_string(),
            detail,
        });
    }

    /// `None` and the empty string are the same
    fn opt_str(&mut self, path: &str, a: &Option<String>, b: &Option<String>) {
        let a = a.as_deref().unwrap_or_default();
        let b = b.as_deref().unwrap_or_default();
        if a != b {
            self.push(path, format!("{:?} != {:?}", a, b));
        }
    }

    fn set(&mut self, path: &str, a: &BTreeSet<String>, b: &BTreeSet<String>) {
        if a != b {
            self.push(path, format!("{:?} != {:?}", a, b));
        }
    }

    fn config(&mut self, path: &str, a: &ConfigMap, b: &ConfigMap) {
        if !same_map(a, b) {
            self.push(path, format!("{:?} != {:?}", a, b));
        }
    }
}

/// Semantic equality of two profiles under the given capabilities
pub fn equivalent(a: &UserProfile, b: &UserProfile, capabilities: &CapabilitySet) -> bool {
    ProfileComparator::new(*capabilities).equivalent(a, b)
}
