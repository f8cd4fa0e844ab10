//! Realm user-profile reconciliation
//!
//! Each call is independent: the server version, the realm feature flag and
//! the current profile are fetched fresh. Concurrent calls for the same realm
//! race at the server, which has replace semantics and no concurrency token.

use crate::domain::{
    AbsentPolicyInterpretation, Drift, ProfileComparator, UnmanagedAttributePolicy, UserProfile,
};
use crate::error::{ProfileError, Result, TransportPhase};
use crate::keycloak::user_profile::{parse_profile, realm_path, render_profile, user_profile_path};
use crate::keycloak::{
    AdminTransport, CapabilitySet, KeycloakRealm, ServerVersion, TransportError, UserProfileConfig,
};
use crate::telemetry::metrics as names;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconciles declared user profiles against a Keycloak server
pub struct UserProfileService {
    transport: Arc<dyn AdminTransport>,
    absent_policy: AbsentPolicyInterpretation,
}

impl UserProfileService {
    /// Create a new UserProfileService
    pub fn new(transport: Arc<dyn AdminTransport>) -> Self {
        Self {
            transport,
            absent_policy: AbsentPolicyInterpretation::default(),
        }
    }

    /// Set how an absent unmanaged attribute policy compares against `DISABLED`
    pub fn with_absent_policy(mut self, absent_policy: AbsentPolicyInterpretation) -> Self {
        self.absent_policy = absent_policy;
        self
    }

    /// Capabilities of the connected server
    pub async fn capabilities(&self, cancel: &CancellationToken) -> Result<CapabilitySet> {
        let raw = step(cancel, TransportPhase::Discovery, self.transport.server_version()).await?;
        let version = ServerVersion::parse(&raw);
        let caps = CapabilitySet::resolve(&version);
        debug!(%version, ?caps, "Resolved server capabilities");
        Ok(caps)
    }

    /// Make the realm's user profile match `declared`, returning the profile the
    /// server reports afterwards.
    ///
    /// Local validation failures are reported before any write. When the
    /// server already matches, nothing is written and the fetched profile is
    /// returned.
    pub async fn apply(
        &self,
        realm: &str,
        declared: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<UserProfile> {
        let started = Instant::now();
        let result = self.apply_inner(realm, declared, cancel).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome_label(),
        };
        metrics::counter!(names::RECONCILE_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(names::RECONCILE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            if e.state_unconfirmed() {
                warn!(realm, error = %e, "User profile write issued but not confirmed");
            }
        }
        result
    }

    async fn apply_inner(
        &self,
        realm: &str,
        declared: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<UserProfile> {
        let prepared = self.prepare(realm, declared, cancel).await?;

        let drift = prepared.drift();
        if let Some(current) = prepared.current {
            if drift.is_empty() {
                info!(realm, "User profile already up to date");
                return Ok(current);
            }
        }

        metrics::counter!(names::DRIFT_DETECTED_TOTAL).increment(1);
        info!(realm, changes = drift.len(), "Writing user profile");
        for d in &drift {
            debug!(realm, path = %d.path, detail = %d.detail, "drift");
        }

        let path = user_profile_path(realm);
        step(
            cancel,
            TransportPhase::Write,
            self.transport.put_json(&path, &prepared.body),
        )
        .await?;

        match self.fetch(realm, TransportPhase::FetchAfterWrite, cancel).await? {
            Some(effective) => Ok(effective),
            None => Err(ProfileError::Transport {
                phase: TransportPhase::FetchAfterWrite,
                source: TransportError::NotFound { path },
            }),
        }
    }

    /// Differences between the server and `declared`, without writing anything
    pub async fn plan(
        &self,
        realm: &str,
        declared: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<Vec<Drift>> {
        Ok(self.prepare(realm, declared, cancel).await?.drift())
    }

    /// Fetch the realm's current user profile.
    ///
    /// Returns `Ok(None)` when the realm has the feature switched off or the
    /// server has no profile document.
    pub async fn read(&self, realm: &str, cancel: &CancellationToken) -> Result<Option<UserProfile>> {
        let caps = self.capabilities(cancel).await?;
        if caps.feature_togglable_by_realm_attribute
            && !self.feature_enabled(realm, cancel).await?
        {
            info!(realm, "User profile disabled for realm, nothing to read");
            return Ok(None);
        }
        self.fetch(realm, TransportPhase::Read, cancel).await
    }

    /// Validation, capability resolution, rendering and the initial fetch
    async fn prepare(
        &self,
        realm: &str,
        declared: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<Prepared> {
        declared.validate()?;

        let caps = self.capabilities(cancel).await?;
        if caps.requires_username_email_attributes {
            let missing = declared.missing_mandatory_attributes();
            if !missing.is_empty() {
                return Err(ProfileError::MissingMandatoryAttribute { missing });
            }
        }

        let payload = render_profile(declared, &caps)?;
        let body = serde_json::to_value(&payload).map_err(|e| {
            ProfileError::MalformedConfigValue {
                path: "$".to_string(),
                message: e.to_string(),
            }
        })?;
        // What the server will hold, with unsupported fields dropped
        let intended = as_stored(parse_profile(realm, &payload));

        if caps.feature_togglable_by_realm_attribute && !self.feature_enabled(realm, cancel).await? {
            return Err(ProfileError::UserProfileFeatureDisabled {
                realm: realm.to_string(),
            });
        }

        let current = self
            .fetch(realm, TransportPhase::FetchBeforeWrite, cancel)
            .await?;

        Ok(Prepared {
            realm: realm.to_string(),
            comparator: ProfileComparator::new(caps).with_absent_policy(self.absent_policy),
            intended,
            body,
            current,
        })
    }

    async fn feature_enabled(&self, realm: &str, cancel: &CancellationToken) -> Result<bool> {
        let value = step(
            cancel,
            TransportPhase::Discovery,
            self.transport.get_json(&realm_path(realm)),
        )
        .await?;
        let realm_rep: KeycloakRealm = decode(value, TransportPhase::Discovery)?;
        Ok(realm_rep.user_profile_enabled())
    }

    async fn fetch(
        &self,
        realm: &str,
        phase: TransportPhase,
        cancel: &CancellationToken,
    ) -> Result<Option<UserProfile>> {
        let value = match step(
            cancel,
            phase,
            self.transport.get_json(&user_profile_path(realm)),
        )
        .await
        {
            Ok(Value::Null) => return Ok(None),
            Ok(value) => value,
            Err(ProfileError::Transport { source, .. }) if source.is_not_found() => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let config: UserProfileConfig = decode(value, phase)?;
        Ok(Some(parse_profile(realm, &config)))
    }
}

struct Prepared {
    realm: String,
    comparator: ProfileComparator,
    intended: UserProfile,
    body: Value,
    current: Option<UserProfile>,
}

impl Prepared {
    fn drift(&self) -> Vec<Drift> {
        let current = match &self.current {
            Some(current) => as_stored(current.clone()),
            None => UserProfile::new(self.realm.clone()),
        };
        self.comparator.diff(&current, &self.intended)
    }
}

/// Keycloak stores a `DISABLED` unmanaged attribute policy as an absent field
fn as_stored(mut profile: UserProfile) -> UserProfile {
    if profile.unmanaged_attribute_policy == Some(UnmanagedAttributePolicy::Disabled) {
        profile.unmanaged_attribute_policy = None;
    }
    profile
}

/// Run one network step, aborting if `cancel` fires first
async fn step<T, F>(cancel: &CancellationToken, phase: TransportPhase, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, TransportError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProfileError::Cancelled { phase }),
        result = fut => result.map_err(ProfileError::transport(phase)),
    }
}

fn decode<T: DeserializeOwned>(value: Value, phase: TransportPhase) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ProfileError::Transport {
        phase,
        source: TransportError::Decode(e.to_string()),
    })
}
