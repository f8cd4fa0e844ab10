//! Common test utilities

use async_trait::async_trait;
use realm_profile_sync::domain::UnmanagedAttributePolicy;
use realm_profile_sync::keycloak::{AdminTransport, TransportError, UserProfileConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// Stateful stand-in for a Keycloak server's admin API.
///
/// Mirrors the server's normalization of stored profiles: unknown fields are
/// dropped and a `DISABLED` unmanaged attribute policy reads back as absent.
pub struct InMemoryKeycloak {
    version: String,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    realms: HashMap<String, Realm>,
    gets: usize,
    puts: usize,
}

struct Realm {
    attributes: HashMap<String, String>,
    profile: Value,
}

impl InMemoryKeycloak {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Add a realm holding the default profile
    pub fn with_realm(self, realm: &str) -> Self {
        self.state.lock().unwrap().realms.insert(
            realm.to_string(),
            Realm {
                attributes: HashMap::new(),
                profile: default_profile(),
            },
        );
        self
    }

    pub fn with_realm_attribute(self, realm: &str, key: &str, value: &str) -> Self {
        if let Some(r) = self.state.lock().unwrap().realms.get_mut(realm) {
            r.attributes.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn gets(&self) -> usize {
        self.state.lock().unwrap().gets
    }

    pub fn puts(&self) -> usize {
        self.state.lock().unwrap().puts
    }

    /// The stored profile document of `realm`
    pub fn stored(&self, realm: &str) -> Value {
        self.state.lock().unwrap().realms[realm].profile.clone()
    }

    fn feature_enabled(&self, realm: &Realm) -> bool {
        let major: u32 = self
            .version
            .split('.')
            .next()
            .and_then(|m| m.parse().ok())
            .unwrap_or(u32::MAX);
        major >= 24
            || realm.attributes.get("userProfileEnabled").map(String::as_str) == Some("true")
    }
}

enum Route<'a> {
    Realm(&'a str),
    Profile(&'a str),
}

fn route(path: &str) -> Option<Route<'_>> {
    let rest = path.strip_prefix("/admin/realms/")?;
    match rest.strip_suffix("/users/profile") {
        Some(realm) => Some(Route::Profile(realm)),
        None if !rest.contains('/') => Some(Route::Realm(rest)),
        None => None,
    }
}

fn not_found(path: &str) -> TransportError {
    TransportError::NotFound {
        path: path.to_string(),
    }
}

fn default_profile() -> Value {
    json!({
        "attributes": [
            {"name": "username", "displayName": "${username}", "validations": {"length": {"min": 3, "max": 255}}, "permissions": {"view": ["admin", "user"], "edit": ["admin", "user"]}, "multivalued": false},
            {"name": "email", "displayName": "${email}", "validations": {"email": {}}, "required": {"roles": ["user"]}, "permissions": {"view": ["admin", "user"], "edit": ["admin", "user"]}, "multivalued": false},
            {"name": "firstName", "displayName": "${firstName}", "permissions": {"view": ["admin", "user"], "edit": ["admin", "user"]}, "multivalued": false},
            {"name": "lastName", "displayName": "${lastName}", "permissions": {"view": ["admin", "user"], "edit": ["admin", "user"]}, "multivalued": false}
        ],
        "groups": [
            {"name": "user-metadata", "displayHeader": "User metadata", "displayDescription": "Attributes, which refer to user metadata"}
        ]
    })
}

/// Round-trip through the wire types, as the server's own model would
fn normalize(body: &Value) -> Result<Value, TransportError> {
    let mut config: UserProfileConfig = serde_json::from_value(body.clone()).map_err(|e| {
        TransportError::Status {
            status: 400,
            body: e.to_string(),
        }
    })?;
    if config.unmanaged_attribute_policy == Some(UnmanagedAttributePolicy::Disabled) {
        config.unmanaged_attribute_policy = None;
    }
    if config.groups.is_none() {
        config.groups = Some(Vec::new());
    }
    serde_json::to_value(&config).map_err(|e| TransportError::Status {
        status: 500,
        body: e.to_string(),
    })
}

#[async_trait]
impl AdminTransport for InMemoryKeycloak {
    async fn server_version(&self) -> Result<String, TransportError> {
        Ok(self.version.clone())
    }

    async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        match route(path) {
            Some(Route::Realm(name)) => {
                let realm = state.realms.get(name).ok_or_else(|| not_found(path))?;
                Ok(json!({"realm": name, "attributes": realm.attributes}))
            }
            Some(Route::Profile(name)) => {
                let realm = state.realms.get(name).ok_or_else(|| not_found(path))?;
                if !self.feature_enabled(realm) {
                    return Err(not_found(path));
                }
                Ok(realm.profile.clone())
            }
            None => Err(not_found(path)),
        }
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.puts += 1;
        let Some(Route::Profile(name)) = route(path) else {
            return Err(not_found(path));
        };
        let enabled = match state.realms.get(name) {
            Some(realm) => self.feature_enabled(realm),
            None => return Err(not_found(path)),
        };
        if !enabled {
            return Err(TransportError::Status {
                status: 400,
                body: "User Profile is disabled".to_string(),
            });
        }

        let attributes = body["attributes"].as_array().cloned().unwrap_or_default();
        for required in ["username", "email"] {
            if !attributes.iter().any(|a| a["name"] == required) && !self.version.starts_with("22") {
                return Err(TransportError::Status {
                    status: 400,
                    body: format!("The attributes '{}' is required", required),
                });
            }
        }

        let profile = normalize(body)?;
        if let Some(realm) = state.realms.get_mut(name) {
            realm.profile = profile;
        }
        Ok(())
    }
}
