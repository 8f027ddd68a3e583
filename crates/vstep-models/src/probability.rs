//! Thresholds restricted to the closed interval [0, 1].

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A probability-like threshold in `[0.0, 1.0]`.
///
/// Used for detection confidence, NMS IoU and keypoint confidence.
/// Out-of-range values are rejected both programmatically and on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    pub const ZERO: Probability = Probability(0.0);
    pub const ONE: Probability = Probability(1.0);

    /// Create a probability, rejecting NaN and values outside `[0, 1]`.
    pub fn new(value: f64) -> Result<Self, ProbabilityError> {
        if value.is_nan() {
            return Err(ProbabilityError::NotANumber);
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ProbabilityError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Build from a constant already known to be in range.
    pub(crate) const fn from_const(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Probability {
    type Error = ProbabilityError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(value: Probability) -> Self {
        value.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbabilityError {
    #[error("Value must be a number in [0, 1], got NaN")]
    NotANumber,

    #[error("Value must be in [0, 1], got {0}")]
    OutOfRange(f64),
}

impl JsonSchema for Probability {
    fn schema_name() -> String {
        "Probability".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::Number.into()),
            ..Default::default()
        };
        schema.number().minimum = Some(0.0);
        schema.number().maximum = Some(1.0);
        schema.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        assert_eq!(Probability::new(0.0).unwrap(), Probability::ZERO);
        assert_eq!(Probability::new(1.0).unwrap(), Probability::ONE);
        assert_eq!(Probability::new(0.3).unwrap().value(), 0.3);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(Probability::new(1.01), Err(ProbabilityError::OutOfRange(1.01)));
        assert_eq!(Probability::new(-0.1), Err(ProbabilityError::OutOfRange(-0.1)));
        assert_eq!(Probability::new(f64::NAN), Err(ProbabilityError::NotANumber));
    }

    #[test]
    fn test_deserialize_checks_range() {
        let p: Probability = serde_json::from_str("0.45").unwrap();
        assert_eq!(p.value(), 0.45);
        assert!(serde_json::from_str::<Probability>("1.5").is_err());
        assert!(serde_json::from_str::<Probability>("1").is_ok());
    }
}
