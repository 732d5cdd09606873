//! Tagged configuration values
//!
//! Topology documents are loosely typed. [`Value`] keeps the handful of shapes
//! a config entry may take and offers fallible accessors, so a lookup never
//! panics on an unexpected type.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// A mapping of lowercased config keys to values
pub type ConfigMap = BTreeMap<String, Value>;

/// One configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Map(ConfigMap),
}

impl Value {
    /// Convert a YAML node into a value
    ///
    /// Returns `Ok(None)` for null so that `key:` with no value behaves like
    /// an absent key. Sequences and tagged nodes are rejected.
    pub fn from_yaml(key: &str, node: &serde_yaml::Value) -> Result<Option<Self>> {
        use serde_yaml::Value as Yaml;

        let value = match node {
            Yaml::Null => return Ok(None),
            Yaml::Bool(b) => Self::Bool(*b),
            Yaml::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    return Err(Error::UnsupportedValueType(key.to_string()));
                }
            }
            Yaml::String(s) => Self::Str(s.clone()),
            Yaml::Mapping(mapping) => Self::Map(map_from_yaml(mapping)?),
            Yaml::Sequence(_) | Yaml::Tagged(_) => {
                return Err(Error::UnsupportedValueType(key.to_string()));
            }
        };
        Ok(Some(value))
    }

    /// Borrow the string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, coercing numeric strings
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view, coercing boolean strings
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(s) => parse_bool(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Render a scalar as the string written into service config files
    ///
    /// Maps have no scalar rendering.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Map(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map(m) => write!(f, "{{{} keys}}", m.len()),
            other => f.write_str(&other.to_scalar_string().unwrap_or_default()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Convert a YAML mapping into a [`ConfigMap`], lowercasing keys and
/// dropping null entries
pub fn map_from_yaml(mapping: &serde_yaml::Mapping) -> Result<ConfigMap> {
    let mut out = ConfigMap::new();
    for (k, v) in mapping {
        let key = match k {
            serde_yaml::Value::String(s) => s.to_lowercase(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => return Err(Error::UnsupportedValueType(format!("{k:?}"))),
        };
        if let Some(value) = Value::from_yaml(&key, v)? {
            out.insert(key, value);
        }
    }
    Ok(out)
}

/// Parse the boolean spellings accepted in topology files
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_coerces_numeric_string() {
        assert_eq!(Value::from("6700").as_int(), Some(6700));
        assert_eq!(Value::from(" 42 ").as_int(), Some(42));
        assert_eq!(Value::from("abc").as_int(), None);
        assert_eq!(Value::Bool(true).as_int(), None);
    }

    #[test]
    fn test_bool_coerces_string() {
        assert_eq!(Value::from("true").as_bool(), Some(true));
        assert_eq!(Value::from("F").as_bool(), Some(false));
        assert_eq!(Value::from("yes").as_bool(), None);
    }

    #[test]
    fn test_scalar_string() {
        assert_eq!(Value::Int(3).to_scalar_string().as_deref(), Some("3"));
        assert_eq!(Value::Bool(false).to_scalar_string().as_deref(), Some("false"));
        assert_eq!(Value::Map(ConfigMap::new()).to_scalar_string(), None);
    }

    #[test]
    fn test_from_yaml_lowercases_and_drops_null() {
        let yaml: serde_yaml::Mapping =
            serde_yaml::from_str("Log_Dir: /logs\nempty:\nnested:\n  A: 1\n").unwrap();
        let map = map_from_yaml(&yaml).unwrap();

        assert_eq!(map.get("log_dir"), Some(&Value::from("/logs")));
        assert!(!map.contains_key("empty"));
        let nested = map.get("nested").and_then(Value::as_map).unwrap();
        assert_eq!(nested.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_from_yaml_rejects_sequence() {
        let yaml: serde_yaml::Mapping = serde_yaml::from_str("hosts: [a, b]").unwrap();
        assert!(matches!(
            map_from_yaml(&yaml),
            Err(Error::UnsupportedValueType(key)) if key == "hosts"
        ));
    }
}
