//! Keyword dictionaries backed by JSON objects.
//!
//! Case data (`fvSchemes`, `fvSolution`, field and model dictionaries) is held
//! as [`Dictionary`] values; typed entries are pulled out with
//! [`Dictionary::lookup`] and fail with a [`ConfigError`] naming the scope and
//! keyword.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    /// Dotted path used in error messages, e.g. `boundaryField.inlet`.
    scope: String,
    entries: Map<String, Value>,
}

impl Dictionary {
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            entries: Map::new(),
        }
    }

    pub fn from_value(scope: &str, value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(entries) => Ok(Self {
                scope: scope.to_string(),
                entries,
            }),
            other => Err(ConfigError::InvalidEntry {
                scope: scope.to_string(),
                key: String::new(),
                reason: format!("expected a dictionary, found {}", json_kind(&other)),
            }),
        }
    }

    pub fn parse(scope: &str, text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            source: scope.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(scope, value)
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&path.display().to_string(), &text)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn found(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn entry(&self, key: &str) -> Result<&Value, ConfigError> {
        self.entries.get(key).ok_or_else(|| ConfigError::MissingEntry {
            scope: self.scope.clone(),
            key: key.to_string(),
        })
    }

    pub fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.entry(key)?;
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidEntry {
            scope: self.scope.clone(),
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn lookup_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        if self.found(key) {
            self.lookup(key)
        } else {
            Ok(default)
        }
    }

    pub fn sub_dict(&self, key: &str) -> Result<Dictionary, ConfigError> {
        let scope = self.child_scope(key);
        Self::from_value(&scope, self.entry(key)?.clone())
    }

    pub fn sub_dict_or_empty(&self, key: &str) -> Result<Dictionary, ConfigError> {
        if self.found(key) {
            self.sub_dict(key)
        } else {
            Ok(Self::new(&self.child_scope(key)))
        }
    }

    /// Deserializes the whole dictionary into a typed control struct.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(Value::Object(self.entries.clone())).map_err(|e| {
            ConfigError::InvalidEntry {
                scope: self.scope.clone(),
                key: String::new(),
                reason: e.to_string(),
            }
        })
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }

    fn child_scope(&self, key: &str) -> String {
        if self.scope.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.scope, key)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a dictionary",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingEntry {
        scope: String,
        key: String,
    },
    InvalidEntry {
        scope: String,
        key: String,
        reason: String,
    },
    UnknownType {
        what: &'static str,
        name: String,
        valid: Vec<String>,
    },
    Io {
        path: String,
        message: String,
    },
    Parse {
        source: String,
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEntry { scope, key } => {
                write!(f, "keyword {} is undefined in dictionary {}", key, scope)
            }
            ConfigError::InvalidEntry { scope, key, reason } => {
                if key.is_empty() {
                    write!(f, "invalid dictionary {}: {}", scope, reason)
                } else {
                    write!(f, "invalid entry {} in dictionary {}: {}", key, scope, reason)
                }
            }
            ConfigError::UnknownType { what, name, valid } => write!(
                f,
                "unknown {} type {}; valid {} types are: ({})",
                what,
                name,
                what,
                valid.join(" ")
            ),
            ConfigError::Io { path, message } => {
                write!(f, "cannot read {}: {}", path, message)
            }
            ConfigError::Parse { source, message } => {
                write!(f, "cannot parse {}: {}", source, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn missing_entry_names_scope_and_key() {
        let dict = Dictionary::parse("fvSolution", r#"{"solvers": {"p": {"solver": "PCG"}}}"#).unwrap();
        let p = dict.sub_dict("solvers").unwrap().sub_dict("p").unwrap();
        assert_eq!(p.scope(), "fvSolution.solvers.p");

        let err = p.lookup::<f64>("tolerance").unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingEntry {
                scope: "fvSolution.solvers.p".into(),
                key: "tolerance".into()
            }
        );
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn typed_lookup() {
        #[derive(Deserialize)]
        struct Controls {
            n: usize,
        }
        let dict = Dictionary::parse("c", r#"{"n": 3, "alpha": "x"}"#).unwrap();
        let c: Controls = dict.to_typed().unwrap();
        assert_eq!(c.n, 3);
        assert!(matches!(
            dict.lookup::<f64>("alpha"),
            Err(ConfigError::InvalidEntry { .. })
        ));
        assert_eq!(dict.lookup_or("beta", 0.5).unwrap(), 0.5);
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(Dictionary::parse("x", "[1, 2]").is_err());
        assert!(matches!(
            Dictionary::parse("x", "{oops"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
