//! Declared tool parameters and argument validation.
//!
//! A [`ParameterSchema`] is a flat list of named, typed parameters. It can
//! be rendered as JSON Schema for prompts and used to check an argument
//! object before a tool is invoked. Validation is the only way to obtain
//! [`ValidatedArgs`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::tool::FailureReason;

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
    /// Closed set of accepted string values, empty when unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

/// Argument object rejected by a [`ParameterSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("arguments must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
    #[error("missing required parameter '{field}'")]
    MissingField { field: String },
    #[error("parameter '{field}' must be of type {expected}, got {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("parameter '{field}' must be one of [{allowed}], got '{value}'")]
    NotAllowed {
        field: String,
        value: String,
        allowed: String,
    },
    #[error("unknown parameter '{field}'")]
    UnknownField { field: String },
}

/// The parameters a tool accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    params: Vec<ParamSpec>,
    allow_additional: bool,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.push(name, kind, description, true, Vec::new())
    }

    pub fn optional(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.push(name, kind, description, false, Vec::new())
    }

    /// Required string restricted to `allowed`.
    pub fn one_of(self, name: &str, allowed: &[&str], description: &str) -> Self {
        let allowed = allowed.iter().map(|s| s.to_string()).collect();
        self.push(name, ParamKind::String, description, true, allowed)
    }

    /// Accept keys that are not declared.
    pub fn allow_additional(mut self) -> Self {
        self.allow_additional = true;
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    fn push(
        mut self,
        name: &str,
        kind: ParamKind,
        description: &str,
        required: bool,
        allowed: Vec<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required,
            allowed,
        });
        self
    }

    /// Render as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.params {
            let mut prop = json!({
                "type": spec.kind.as_str(),
                "description": spec.description,
            });
            if !spec.allowed.is_empty() {
                prop["enum"] = json!(spec.allowed);
            }
            properties.insert(spec.name.clone(), prop);
            if spec.required {
                required.push(Value::String(spec.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": self.allow_additional,
        })
    }

    /// Check `args` against the declared parameters.
    ///
    /// `null` is treated as an empty object so tools without parameters can
    /// be called with no arguments at all. Explicit `null` values for
    /// optional parameters are dropped.
    pub fn validate(&self, args: &Value) -> Result<ValidatedArgs, ValidationError> {
        let mut map = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ValidationError::NotAnObject {
                    found: type_name(other),
                });
            }
        };

        for spec in &self.params {
            if !spec.required && map.get(&spec.name).is_some_and(Value::is_null) {
                map.remove(&spec.name);
            }
            let Some(value) = map.get(&spec.name) else {
                if spec.required {
                    return Err(ValidationError::MissingField {
                        field: spec.name.clone(),
                    });
                }
                continue;
            };
            if !spec.kind.matches(value) {
                return Err(ValidationError::WrongType {
                    field: spec.name.clone(),
                    expected: spec.kind.as_str(),
                    found: type_name(value),
                });
            }
            if !spec.allowed.is_empty() {
                let text = value.as_str().unwrap_or_default();
                if !spec.allowed.iter().any(|a| a == text) {
                    return Err(ValidationError::NotAllowed {
                        field: spec.name.clone(),
                        value: text.to_string(),
                        allowed: spec.allowed.join(", "),
                    });
                }
            }
        }

        if !self.allow_additional {
            if let Some(unknown) = map
                .keys()
                .find(|key| !self.params.iter().any(|spec| &spec.name == *key))
            {
                return Err(ValidationError::UnknownField {
                    field: unknown.clone(),
                });
            }
        }

        Ok(ValidatedArgs(map))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Arguments that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// A string argument the tool cannot work without.
    pub fn str_arg(&self, key: &str) -> Result<&str, FailureReason> {
        self.get_str(key)
            .ok_or_else(|| FailureReason::invalid_input(format!("'{key}' must be a string")))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}
