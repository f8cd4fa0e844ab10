//! Dynamic configuration values carried by validators and annotations
//!
//! Keycloak treats validator configuration and annotations as opaque JSON. They
//! are modelled here as a closed set of variants so that the JSON text codec is
//! exhaustive, and so that integral numbers survive a round trip as integers.

use crate::error::{ProfileError, Result};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Mapping from configuration key to value. Key order is not significant.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A loosely typed JSON value embedded in validator or annotation config
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(ConfigMap),
}

impl ConfigValue {
    /// Convert a parsed JSON value.
    ///
    /// Integral numbers that fit in an `i64` become [`ConfigValue::Integer`];
    /// every other number becomes [`ConfigValue::Float`].
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ConfigValue::String(s.clone()),
            Value::Array(items) => ConfigValue::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => ConfigValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to a JSON value, reporting the first unrepresentable number.
    ///
    /// `path` names the location of `self` and is extended for nested values.
    pub fn to_json_at(&self, path: &str) -> Result<Value> {
        Ok(match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Integer(i) => Value::Number((*i).into()),
            ConfigValue::Float(f) => {
                Value::Number(Number::from_f64(*f).ok_or_else(|| {
                    ProfileError::MalformedConfigValue {
                        path: path.to_string(),
                        message: format!("{} is not a finite number", f),
                    }
                })?)
            }
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| v.to_json_at(&format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ConfigValue::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json_at(&format!("{}.{}", path, k))?);
                }
                Value::Object(out)
            }
        })
    }

    /// Value equality where integers and floats compare numerically
    pub fn same_value(&self, other: &ConfigValue) -> bool {
        match (self, other) {
            (ConfigValue::Integer(a), ConfigValue::Float(b))
            | (ConfigValue::Float(b), ConfigValue::Integer(a)) => {
                // Both casts must agree so that equality stays transitive
                b.fract() == 0.0 && (*b as i64) == *a && (*a as f64) == *b
            }
            (ConfigValue::Array(a), ConfigValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (ConfigValue::Object(a), ConfigValue::Object(b)) => same_map(a, b),
            _ => self == other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Key-set and per-key value equality between two config maps
pub fn same_map(a: &ConfigMap, b: &ConfigMap) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.get(k).is_some_and(|other| v.same_value(other)))
}

/// Render a value as canonical JSON text
pub fn encode(value: &ConfigValue) -> Result<String> {
    encode_at("$", value)
}

/// Render a value as canonical JSON text, reporting errors against `path`
pub fn encode_at(path: &str, value: &ConfigValue) -> Result<String> {
    let json = value.to_json_at(path)?;
    serde_json::to_string(&json).map_err(|e| ProfileError::MalformedConfigValue {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Parse JSON text into a value
pub fn decode(text: &str) -> Result<ConfigValue> {
    decode_at("$", text)
}

/// Parse JSON text into a value, reporting errors against `path`
pub fn decode_at(path: &str, text: &str) -> Result<ConfigValue> {
    let json: Value =
        serde_json::from_str(text).map_err(|e| ProfileError::MalformedConfigValue {
            path: path.to_string(),
            message: e.to_string(),
        })?;
    Ok(ConfigValue::from_json(&json))
}

/// Decode every entry of a map of JSON texts, keyed under `path`
pub fn decode_map_at<'a, I>(path: &str, entries: I) -> Result<ConfigMap>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    entries
        .into_iter()
        .map(|(k, text)| Ok((k.clone(), decode_at(&format!("{}.{}", path, k), text)?)))
        .collect()
}

/// Convert a config map into a JSON object, keyed under `path`
pub fn map_to_json_at(path: &str, map: &ConfigMap) -> Result<Map<String, Value>> {
    let mut out = Map::with_capacity(map.len());
    for (k, v) in map {
        out.insert(k.clone(), v.to_json_at(&format!("{}.{}", path, k))?);
    }
    Ok(out)
}

/// Convert a JSON object into a config map
pub fn map_from_json(map: &Map<String, Value>) -> ConfigMap {
    map.iter()
        .map(|(k, v)| (k.clone(), ConfigValue::from_json(v)))
        .collect()
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}
