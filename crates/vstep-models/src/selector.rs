//! Selectors and literal-or-reference parameters.
//!
//! A selector is a reference string that stands in for a literal value:
//!
//! - `$inputs.<name>` points to a workflow input
//! - `$steps.<step>.<output>` points to an output of a sibling step
//!
//! Segments may only contain ASCII letters, digits, `_` and `-`.

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject, SubschemaValidation};
use schemars::JsonSchema;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix shared by every selector.
pub const SELECTOR_PREFIX: char = '$';

/// Regular expression published in JSON Schema for selector strings.
pub const SELECTOR_PATTERN: &str =
    r"^\$(inputs\.[A-Za-z0-9_\-]+|steps\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+)$";

const INPUTS_ROOT: &str = "inputs";
const STEPS_ROOT: &str = "steps";

/// A parsed reference to a workflow input or a step output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// `$inputs.<name>`
    Input { name: String },
    /// `$steps.<step>.<output>`
    StepOutput { step: String, output: String },
}

impl Selector {
    /// Build an input selector.
    pub fn input(name: impl Into<String>) -> Self {
        Selector::Input { name: name.into() }
    }

    /// Build a step output selector.
    pub fn step_output(step: impl Into<String>, output: impl Into<String>) -> Self {
        Selector::StepOutput {
            step: step.into(),
            output: output.into(),
        }
    }

    /// Returns true for strings that should be treated as selectors
    /// rather than literal values.
    pub fn looks_like_selector(raw: &str) -> bool {
        raw.starts_with(SELECTOR_PREFIX)
    }

    /// Name of the input or step this selector points at.
    pub fn root_name(&self) -> &str {
        match self {
            Selector::Input { name } => name,
            Selector::StepOutput { step, .. } => step,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Selector::Input { .. })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Input { name } => write!(f, "$inputs.{}", name),
            Selector::StepOutput { step, output } => write!(f, "$steps.{}.{}", step, output),
        }
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(SELECTOR_PREFIX)
            .ok_or_else(|| SelectorError::MissingPrefix(s.to_string()))?;

        let parts: Vec<&str> = body.split('.').collect();
        for part in &parts {
            if !is_valid_segment(part) {
                return Err(SelectorError::InvalidSegment {
                    selector: s.to_string(),
                    segment: part.to_string(),
                });
            }
        }

        match parts.as_slice() {
            [INPUTS_ROOT, name] => Ok(Selector::input(*name)),
            [STEPS_ROOT, step, output] => Ok(Selector::step_output(*step, *output)),
            _ => Err(SelectorError::InvalidShape(s.to_string())),
        }
    }
}

/// Check that a name can be used as a single selector segment.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Selector parsing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Selector '{0}' must start with '$'")]
    MissingPrefix(String),

    #[error("Selector '{selector}' has invalid segment '{segment}'")]
    InvalidSegment { selector: String, segment: String },

    #[error("Selector '{0}' must be '$inputs.<name>' or '$steps.<step>.<output>'")]
    InvalidShape(String),
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

impl JsonSchema for Selector {
    fn schema_name() -> String {
        "Selector".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            ..Default::default()
        };
        schema.string().pattern = Some(SELECTOR_PATTERN.to_string());
        schema.into()
    }
}

/// A step parameter that is either a literal value or a selector.
#[derive(Debug, Clone, PartialEq)]
pub enum Param<T> {
    Literal(T),
    Selector(Selector),
}

impl<T> Param<T> {
    /// The literal value, if this parameter is not a reference.
    pub fn literal(&self) -> Option<&T> {
        match self {
            Param::Literal(value) => Some(value),
            Param::Selector(_) => None,
        }
    }

    pub fn selector(&self) -> Option<&Selector> {
        match self {
            Param::Literal(_) => None,
            Param::Selector(selector) => Some(selector),
        }
    }

    pub fn is_selector(&self) -> bool {
        matches!(self, Param::Selector(_))
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Param::Literal(value)
    }
}

impl From<&str> for Param<String> {
    fn from(value: &str) -> Self {
        Param::Literal(value.to_string())
    }
}

impl<T: Serialize> Serialize for Param<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Param::Literal(value) => value.serialize(serializer),
            Param::Selector(selector) => selector.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Param<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let serde_json::Value::String(raw) = &value {
            if Selector::looks_like_selector(raw) {
                return raw
                    .parse()
                    .map(Param::Selector)
                    .map_err(D::Error::custom);
            }
        }

        serde_json::from_value(value)
            .map(Param::Literal)
            .map_err(D::Error::custom)
    }
}

impl<T: JsonSchema> JsonSchema for Param<T> {
    fn schema_name() -> String {
        format!("Param_for_{}", T::schema_name())
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            subschemas: Some(Box::new(SubschemaValidation {
                any_of: Some(vec![gen.subschema_for::<T>(), gen.subschema_for::<Selector>()]),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
