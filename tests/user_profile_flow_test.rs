//! End-to-end reconciliation against an in-memory Keycloak

mod common;

use common::InMemoryKeycloak;
use pretty_assertions::assert_eq;
use realm_profile_sync::domain::{
    equivalent, AbsentPolicyInterpretation, Attribute, ConfigMap, ConfigValue, Group,
    ProfileComparator, UnmanagedAttributePolicy, UserProfile,
};
use realm_profile_sync::keycloak::{CapabilitySet, ServerVersion};
use realm_profile_sync::service::UserProfileService;
use realm_profile_sync::ProfileError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const REALM: &str = "acme";

fn service(keycloak: &Arc<InMemoryKeycloak>) -> UserProfileService {
    UserProfileService::new(keycloak.clone())
}

fn caps(version: &str) -> CapabilitySet {
    CapabilitySet::resolve(&ServerVersion::parse(version))
}

fn base_profile() -> UserProfile {
    let mut profile = UserProfile::new(REALM);
    profile.attributes = vec![Attribute::new("username"), Attribute::new("email")];
    profile
}

#[tokio::test]
async fn test_attribute_group_reference_survives_round_trip() {
    let keycloak = Arc::new(
        InMemoryKeycloak::new("22.0.5")
            .with_realm(REALM)
            .with_realm_attribute(REALM, "userProfileEnabled", "true"),
    );
    let service = service(&keycloak);
    let cancel = CancellationToken::new();

    let mut declared = UserProfile::new(REALM);
    declared.attributes = vec![Attribute::new("attribute1").with_group("group")];
    declared.groups = vec![Group::new("group")];

    service.apply(REALM, &declared, &cancel).await.unwrap();

    let read = service.read(REALM, &cancel).await.unwrap().unwrap();
    assert_eq!(
        read.attribute("attribute1").unwrap().group.as_deref(),
        Some("group")
    );
    assert!(equivalent(&read, &declared, &caps("22.0.5")));
}

#[tokio::test]
async fn test_full_profile_round_trip() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5").with_realm(REALM));
    let service = service(&keycloak);
    let cancel = CancellationToken::new();

    let mut length = ConfigMap::new();
    length.insert("min".to_string(), ConfigValue::Integer(3));
    length.insert("max".to_string(), ConfigValue::Integer(255));

    let mut options = ConfigMap::new();
    options.insert(
        "options".to_string(),
        ConfigValue::Array(vec!["sales".into(), "support".into()]),
    );

    let mut declared = base_profile();
    declared.unmanaged_attribute_policy = Some(UnmanagedAttributePolicy::AdminEdit);
    let mut department = Attribute::new("department")
        .with_group("work")
        .with_permissions(["admin", "user"], ["admin"])
        .with_validation("length", length)
        .with_validation("options", options)
        .with_annotation("inputType", "select".into())
        .with_annotation("inputOptionsFromValidation", "options".into());
    department.multi_valued = true;
    declared.attributes.push(department);
    let mut work = Group::new("work");
    work.display_header = Some("Work".to_string());
    work.annotations.insert("collapsed".to_string(), ConfigValue::Bool(false));
    declared.groups.push(work);

    let effective = service.apply(REALM, &declared, &cancel).await.unwrap();
    assert!(equivalent(&effective, &declared, &caps("24.0.5")));

    let stored = keycloak.stored(REALM);
    assert_eq!(stored["unmanagedAttributePolicy"], "ADMIN_EDIT");
    assert_eq!(stored["attributes"][2]["multivalued"], true);
    assert_eq!(stored["attributes"][2]["validations"]["length"]["min"], 3);
    assert!(stored["attributes"][2]["validations"]["length"]["min"].is_i64());
}

#[tokio::test]
async fn test_reapply_is_idempotent() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5").with_realm(REALM));
    let service = service(&keycloak);
    let cancel = CancellationToken::new();

    let mut declared = base_profile();
    declared.attributes[1] = Attribute::new("email").with_permissions(["admin"], ["admin"]);
    declared.groups = vec![Group::new("user-metadata")];
    declared.unmanaged_attribute_policy = Some(UnmanagedAttributePolicy::Enabled);

    let before = service.apply(REALM, &declared, &cancel).await.unwrap();
    assert_eq!(keycloak.puts(), 1);

    let after = service.apply(REALM, &declared, &cancel).await.unwrap();
    assert_eq!(keycloak.puts(), 1);
    assert!(equivalent(&before, &after, &caps("24.0.5")));
}

#[tokio::test]
async fn test_removed_policy_converges_to_disabled() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5").with_realm(REALM));
    let service = service(&keycloak).with_absent_policy(AbsentPolicyInterpretation::Disabled);
    let cancel = CancellationToken::new();

    let mut enabled = base_profile();
    enabled.unmanaged_attribute_policy = Some(UnmanagedAttributePolicy::Enabled);
    service.apply(REALM, &enabled, &cancel).await.unwrap();
    let read = service.read(REALM, &cancel).await.unwrap().unwrap();
    assert_eq!(
        read.unmanaged_attribute_policy,
        Some(UnmanagedAttributePolicy::Enabled)
    );

    let absent = base_profile();
    service.apply(REALM, &absent, &cancel).await.unwrap();
    let read = service.read(REALM, &cancel).await.unwrap().unwrap();
    assert_eq!(read.unmanaged_attribute_policy, None);

    let mut disabled = base_profile();
    disabled.unmanaged_attribute_policy = Some(UnmanagedAttributePolicy::Disabled);
    let comparator = ProfileComparator::new(caps("24.0.5"))
        .with_absent_policy(AbsentPolicyInterpretation::Disabled);
    assert!(comparator.equivalent(&read, &disabled));

    // Absence is only "not configured" under the default interpretation
    assert!(!equivalent(&read, &disabled, &caps("24.0.5")));
}

#[tokio::test]
async fn test_declared_disabled_policy_converges_under_disabled_interpretation() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5").with_realm(REALM));
    let service = service(&keycloak).with_absent_policy(AbsentPolicyInterpretation::Disabled);
    let cancel = CancellationToken::new();

    let mut declared = base_profile();
    declared.unmanaged_attribute_policy = Some(UnmanagedAttributePolicy::Disabled);

    service.apply(REALM, &declared, &cancel).await.unwrap();
    service.apply(REALM, &declared, &cancel).await.unwrap();
    // The server reads DISABLED back as absent, which must not look like drift
    assert_eq!(keycloak.puts(), 1);
}

#[tokio::test]
async fn test_declared_disabled_policy_converges_by_default() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5").with_realm(REALM));
    let service = service(&keycloak);
    let cancel = CancellationToken::new();

    let mut declared = base_profile();
    declared.unmanaged_attribute_policy = Some(UnmanagedAttributePolicy::Disabled);

    for _ in 0..3 {
        service.apply(REALM, &declared, &cancel).await.unwrap();
    }
    assert_eq!(keycloak.puts(), 1);

    let drift = service.plan(REALM, &declared, &cancel).await.unwrap();
    assert!(drift.is_empty(), "unexpected drift: {drift:?}");
}

#[tokio::test]
async fn test_feature_disabled_before_24() {
    let keycloak = Arc::new(InMemoryKeycloak::new("23.0.7").with_realm(REALM));
    let service = service(&keycloak);
    let cancel = CancellationToken::new();

    let err = service
        .apply(REALM, &base_profile(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::UserProfileFeatureDisabled { .. }));
    assert_eq!(keycloak.puts(), 0);

    assert!(service.read(REALM, &cancel).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_email_issues_no_requests() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5").with_realm(REALM));
    let service = service(&keycloak);

    let mut declared = UserProfile::new(REALM);
    declared.attributes = vec![Attribute::new("username")];

    let err = service
        .apply(REALM, &declared, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::MissingMandatoryAttribute { .. }));
    assert!(err.is_local());
    assert_eq!(keycloak.gets(), 0);
    assert_eq!(keycloak.puts(), 0);
}

#[tokio::test]
async fn test_unsupported_fields_do_not_cause_repeated_writes() {
    let keycloak = Arc::new(
        InMemoryKeycloak::new("23.0.7")
            .with_realm(REALM)
            .with_realm_attribute(REALM, "userProfileEnabled", "true"),
    );
    let service = service(&keycloak);
    let cancel = CancellationToken::new();

    let mut declared = base_profile();
    declared.attributes[0].multi_valued = true;
    declared.unmanaged_attribute_policy = Some(UnmanagedAttributePolicy::AdminView);

    service.apply(REALM, &declared, &cancel).await.unwrap();
    let stored = keycloak.stored(REALM);
    assert!(stored.get("unmanagedAttributePolicy").is_none());
    assert!(stored["attributes"][0].get("multivalued").is_none());

    service.apply(REALM, &declared, &cancel).await.unwrap();
    assert_eq!(keycloak.puts(), 1);
}

#[tokio::test]
async fn test_plan_reports_drift_and_writes_nothing() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5").with_realm(REALM));
    let service = service(&keycloak);

    let drift = service
        .plan(REALM, &base_profile(), &CancellationToken::new())
        .await
        .unwrap();
    let paths: Vec<_> = drift.iter().map(|d| d.path.as_str()).collect();
    assert!(paths.contains(&"attribute[firstName]"));
    assert!(paths.contains(&"attribute[lastName]"));
    assert!(paths.contains(&"group[user-metadata]"));
    assert_eq!(keycloak.puts(), 0);
}

#[tokio::test]
async fn test_unknown_realm_is_transport_failure() {
    let keycloak = Arc::new(InMemoryKeycloak::new("24.0.5"));
    let service = service(&keycloak);

    // A missing document and a missing realm look the same to a read
    assert!(service
        .read("ghost", &CancellationToken::new())
        .await
        .unwrap()
        .is_none());

    let err = service
        .apply("ghost", &base_profile(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::Transport { .. }));
    assert!(!err.state_unconfirmed());
}
