//! Argument schemas for tool inputs
//!
//! A schema is an ordered list of parameters. Validation turns a raw JSON
//! argument object into typed, defaulted `Arguments` or reports the first
//! offending parameter. Missing required parameters are checked across the
//! whole schema before any type check runs.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{FailureKind, ToolFailure, ValidationError};

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Mapping,
}

impl ParamType {
    fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Mapping => "object",
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            ParamType::String => "a string",
            ParamType::Integer => "an integer",
            ParamType::Boolean => "a boolean",
            ParamType::Mapping => "an object",
        }
    }

    /// Lax coercion of a raw JSON value; `None` on mismatch
    fn coerce(&self, raw: &Value) -> Option<ArgValue> {
        match (self, raw) {
            (ParamType::String, Value::String(s)) => Some(ArgValue::String(s.clone())),
            (ParamType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(ArgValue::Integer),
            (ParamType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(ArgValue::Integer)
            }
            (ParamType::Boolean, Value::Bool(b)) => Some(ArgValue::Boolean(*b)),
            (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(ArgValue::Boolean(true)),
                "false" | "0" | "no" | "off" => Some(ArgValue::Boolean(false)),
                _ => None,
            },
            (ParamType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(1) => Some(ArgValue::Boolean(true)),
                Some(0) => Some(ArgValue::Boolean(false)),
                _ => None,
            },
            (ParamType::Mapping, Value::Object(map)) => Some(ArgValue::Mapping(map.clone())),
            _ => None,
        }
    }
}

/// A validated argument value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Mapping(Map<String, Value>),
}

impl ArgValue {
    fn param_type(&self) -> ParamType {
        match self {
            ArgValue::String(_) => ParamType::String,
            ArgValue::Integer(_) => ParamType::Integer,
            ArgValue::Boolean(_) => ParamType::Boolean,
            ArgValue::Mapping(_) => ParamType::Mapping,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ArgValue::String(s) => Value::String(s.clone()),
            ArgValue::Integer(i) => Value::from(*i),
            ArgValue::Boolean(b) => Value::Bool(*b),
            ArgValue::Mapping(m) => Value::Object(m.clone()),
        }
    }
}

/// Structural check run on a coerced value; `Err` carries the reason
pub type Constraint = fn(&ArgValue) -> Result<(), String>;

/// One declared parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub constraint: Option<Constraint>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            required: true,
            default: None,
            constraint: None,
            description,
        }
    }

    pub fn optional(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, value: ArgValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// Ordered parameter list for one tool
#[derive(Debug, Clone, Default)]
pub struct ArgumentSchema {
    params: Vec<ParamSpec>,
}

impl ArgumentSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Check the schema's own invariants
    pub fn check(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for param in &self.params {
            if !seen.insert(param.name) {
                return Err(format!("parameter '{}' declared twice", param.name));
            }
            match (&param.default, param.required) {
                (Some(_), true) => {
                    return Err(format!(
                        "required parameter '{}' must not have a default",
                        param.name
                    ))
                }
                (Some(default), false) if default.param_type() != param.param_type => {
                    return Err(format!(
                        "default for '{}' is not {}",
                        param.name,
                        param.param_type.expected()
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate and coerce a raw argument payload
    pub fn validate(&self, raw: &Value) -> Result<Arguments, ValidationError> {
        let empty = Map::new();
        let supplied = match raw {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => {
                return Err(ValidationError::TypeMismatch {
                    param: "arguments".into(),
                    expected: "an object",
                })
            }
        };

        for param in self.params.iter().filter(|p| p.required) {
            if matches!(supplied.get(param.name), None | Some(Value::Null)) {
                return Err(ValidationError::MissingParameter(param.name.into()));
            }
        }

        let mut values = BTreeMap::new();
        for param in &self.params {
            let raw_value = match supplied.get(param.name) {
                // An explicit null only stands in for "absent" when there is no default
                Some(Value::Null) if param.default.is_none() => None,
                other => other,
            };

            let value = match raw_value {
                Some(raw_value) => param.param_type.coerce(raw_value).ok_or_else(|| {
                    ValidationError::TypeMismatch {
                        param: param.name.into(),
                        expected: param.param_type.expected(),
                    }
                })?,
                None => match &param.default {
                    Some(default) => default.clone(),
                    None => continue,
                },
            };

            if let Some(constraint) = param.constraint {
                constraint(&value).map_err(|reason| ValidationError::ConstraintViolation {
                    param: param.name.into(),
                    reason,
                })?;
            }

            values.insert(param.name, value);
        }

        for extra in supplied.keys() {
            if !self.params.iter().any(|p| p.name == extra.as_str()) {
                debug!("Ignoring undeclared argument '{extra}'");
            }
        }

        Ok(Arguments { values })
    }

    /// Render as a JSON Schema object for tool listings
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type.json_type()));
            prop.insert("description".into(), json!(param.description));
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.to_json());
            }
            properties.insert(param.name.into(), Value::Object(prop));
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Validated, typed, defaulted arguments for one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<&'static str, ArgValue>,
}

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(ArgValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn opt_mapping(&self, name: &str) -> Option<&Map<String, Value>> {
        match self.get(name) {
            Some(ArgValue::Mapping(m)) => Some(m),
            _ => None,
        }
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolFailure> {
        self.opt_str(name).ok_or_else(|| unvalidated(name))
    }

    pub fn int(&self, name: &str) -> Result<i64, ToolFailure> {
        match self.get(name) {
            Some(ArgValue::Integer(i)) => Ok(*i),
            _ => Err(unvalidated(name)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolFailure> {
        match self.get(name) {
            Some(ArgValue::Boolean(b)) => Ok(*b),
            _ => Err(unvalidated(name)),
        }
    }
}

fn unvalidated(name: &str) -> ToolFailure {
    ToolFailure::new(
        FailureKind::UnexpectedFault,
        format!("Error: argument '{name}' was not validated"),
    )
}
