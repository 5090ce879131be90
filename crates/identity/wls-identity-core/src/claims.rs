//! Typed access to the claims payload returned by the identity provider.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("claims payload is not a JSON object")]
    NotAnObject,

    #[error("missing claim: {0}")]
    Missing(String),

    #[error("claim '{key}' is not a {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// Identity attributes the provider asserts about the resource owner.
///
/// Some providers nest the interesting fields under a `"user"` envelope;
/// [`Claims::from_value`] unwraps that before any lookup, so callers never
/// see the difference.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    fields: Map<String, Value>,
}

impl Claims {
    /// Build a claim set from the raw provider payload.
    pub fn from_value(value: Value) -> Result<Self, ClaimsError> {
        let mut fields = match value {
            Value::Object(map) => map,
            _ => return Err(ClaimsError::NotAnObject),
        };

        if matches!(fields.get("user"), Some(Value::Object(_))) {
            if let Some(Value::Object(inner)) = fields.remove("user") {
                fields = inner;
            }
        }

        Ok(Self { fields })
    }

    /// Raw access for rule evaluation; prefer the typed accessors.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// A string-valued claim; absent or null keys are reported as missing.
    pub fn str_claim(&self, key: &str) -> Result<&str, ClaimsError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Err(ClaimsError::Missing(key.to_string())),
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(ClaimsError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    pub fn bool_claim(&self, key: &str) -> Result<bool, ClaimsError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Err(ClaimsError::Missing(key.to_string())),
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(ClaimsError::WrongType {
                key: key.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// A claim holding an array of strings, e.g. a role list.
    pub fn str_list_claim(&self, key: &str) -> Result<Vec<String>, ClaimsError> {
        let items = match self.fields.get(key) {
            None | Some(Value::Null) => return Err(ClaimsError::Missing(key.to_string())),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ClaimsError::WrongType {
                    key: key.to_string(),
                    expected: "array of strings",
                });
            }
        };

        items
            .iter()
            .map(|item| match item {
                Value::String(value) => Ok(value.clone()),
                _ => Err(ClaimsError::WrongType {
                    key: key.to_string(),
                    expected: "array of strings",
                }),
            })
            .collect()
    }

    /// True only when the claim is present and exactly boolean `true`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(Value::Bool(true)))
    }
}
