//! Typed imputer options and their declared parameters

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ImputeBenchError, Result};

/// Declared parameter with its default rendered as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmParameter {
    pub name: String,
    /// Default value
    pub value: String,
    pub value_type: ParameterType,
    pub constraints: Option<ParameterConstraints>,
    pub description: String,
}

impl AlgorithmParameter {
    pub fn new(
        name: &str,
        value: impl ToString,
        value_type: ParameterType,
        description: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            value_type,
            constraints: None,
            description: description.to_string(),
        }
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints = Some(ParameterConstraints {
            min,
            max,
            allowed_values: None,
        });
        self
    }

    /// Default as a typed option value
    pub fn default_value(&self) -> Result<OptionValue> {
        let invalid = |reason: String| ImputeBenchError::InvalidParameter {
            name: self.name.clone(),
            reason,
        };
        match &self.value_type {
            ParameterType::Integer => self
                .value
                .parse::<i64>()
                .map(OptionValue::Integer)
                .map_err(|e| invalid(e.to_string())),
            ParameterType::Float => self
                .value
                .parse::<f64>()
                .map(OptionValue::Float)
                .map_err(|e| invalid(e.to_string())),
            ParameterType::Boolean => self
                .value
                .parse::<bool>()
                .map(OptionValue::Bool)
                .map_err(|e| invalid(e.to_string())),
            ParameterType::String | ParameterType::Enum(_) => Ok(OptionValue::Text(self.value.clone())),
        }
    }

    fn check(&self, value: &OptionValue) -> Result<()> {
        let invalid = |reason: String| ImputeBenchError::InvalidParameter {
            name: self.name.clone(),
            reason,
        };
        let numeric = match (&self.value_type, value) {
            (ParameterType::Integer, OptionValue::Integer(i)) => Some(*i as f64),
            (ParameterType::Float, OptionValue::Integer(i)) => Some(*i as f64),
            (ParameterType::Float, OptionValue::Float(f)) => Some(*f),
            (ParameterType::Boolean, OptionValue::Bool(_)) => None,
            (ParameterType::String, OptionValue::Text(_)) => None,
            (ParameterType::Enum(choices), OptionValue::Text(t)) => {
                if !choices.contains(t) {
                    return Err(invalid(format!("{} is not one of {:?}", t, choices)));
                }
                None
            }
            (expected, got) => {
                return Err(invalid(format!("expected {:?}, got {}", expected, got)));
            }
        };

        if let Some(constraints) = &self.constraints {
            if let Some(x) = numeric {
                if !x.is_finite() {
                    return Err(invalid(format!("{} is not finite", x)));
                }
                if constraints.min.map_or(false, |min| x < min) {
                    return Err(invalid(format!("{} is below {:?}", x, constraints.min)));
                }
                if constraints.max.map_or(false, |max| x > max) {
                    return Err(invalid(format!("{} is above {:?}", x, constraints.max)));
                }
            }
            if let (Some(allowed), OptionValue::Text(t)) = (&constraints.allowed_values, value) {
                if !allowed.contains(t) {
                    return Err(invalid(format!("{} is not one of {:?}", t, allowed)));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    Integer,
    Float,
    String,
    Boolean,
    Enum(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterConstraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allowed_values: Option<Vec<String>>,
}

/// Single option value as written in a sweep config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(t) => f.write_str(t),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Per-algorithm key/value options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImputerOptions {
    values: BTreeMap<String, OptionValue>,
}

impl ImputerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.values.get(name) {
            None => Ok(default),
            Some(OptionValue::Integer(i)) if *i >= 0 => Ok(*i as usize),
            Some(other) => Err(ImputeBenchError::InvalidParameter {
                name: name.to_string(),
                reason: format!("{} is not a non-negative integer", other),
            }),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.values.get(name) {
            None => Ok(default),
            Some(OptionValue::Integer(i)) => Ok(*i as f64),
            Some(OptionValue::Float(x)) => Ok(*x),
            Some(other) => Err(ImputeBenchError::InvalidParameter {
                name: name.to_string(),
                reason: format!("{} is not a number", other),
            }),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.values.get(name) {
            None => Ok(default),
            Some(OptionValue::Text(t)) => Ok(t.as_str()),
            Some(other) => Err(ImputeBenchError::InvalidParameter {
                name: name.to_string(),
                reason: format!("{} is not text", other),
            }),
        }
    }

    /// Rejects unknown names, mistyped values and constraint violations
    pub fn validate(&self, parameters: &[AlgorithmParameter]) -> Result<()> {
        for (name, value) in &self.values {
            let parameter = parameters.iter().find(|p| &p.name == name).ok_or_else(|| {
                ImputeBenchError::InvalidParameter {
                    name: name.clone(),
                    reason: "not a parameter of this algorithm".into(),
                }
            })?;
            parameter.check(value)?;
        }
        Ok(())
    }

    /// Options with every declared default filled in
    pub fn resolved(&self, parameters: &[AlgorithmParameter]) -> Result<Self> {
        let mut resolved = self.clone();
        for parameter in parameters {
            if !resolved.values.contains_key(&parameter.name) {
                resolved
                    .values
                    .insert(parameter.name.clone(), parameter.default_value()?);
            }
        }
        Ok(resolved)
    }
}
