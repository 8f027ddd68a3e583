//! Closed set of step manifests, dispatched on the `type` field.

use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::crop::{Crop, CROP_STEP_TYPE};
use crate::keypoints::{KeypointsDetectionModel, ManifestError, KEYPOINTS_DETECTION_STEP_TYPE};
use crate::selector::Selector;

/// Known step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepType {
    KeypointsDetectionModel,
    Crop,
}

impl StepType {
    pub const ALL: &'static [StepType] = &[StepType::KeypointsDetectionModel, StepType::Crop];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::KeypointsDetectionModel => KEYPOINTS_DETECTION_STEP_TYPE,
            StepType::Crop => CROP_STEP_TYPE,
        }
    }

    fn from_type_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A step of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum StepManifest {
    KeypointsDetectionModel(KeypointsDetectionModel),
    Crop(Crop),
}

impl StepManifest {
    pub fn name(&self) -> &str {
        match self {
            StepManifest::KeypointsDetectionModel(step) => &step.name,
            StepManifest::Crop(step) => &step.name,
        }
    }

    pub fn step_type(&self) -> StepType {
        match self {
            StepManifest::KeypointsDetectionModel(_) => StepType::KeypointsDetectionModel,
            StepManifest::Crop(_) => StepType::Crop,
        }
    }

    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            StepManifest::KeypointsDetectionModel(_) => KeypointsDetectionModel::OUTPUTS,
            StepManifest::Crop(_) => Crop::OUTPUTS,
        }
    }

    pub fn has_output(&self, output: &str) -> bool {
        self.outputs().contains(&output)
    }

    pub fn selectors(&self) -> Vec<(&'static str, &Selector)> {
        match self {
            StepManifest::KeypointsDetectionModel(step) => step.selectors(),
            StepManifest::Crop(step) => step.selectors(),
        }
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        match self {
            StepManifest::KeypointsDetectionModel(step) => step.validate(),
            StepManifest::Crop(step) => step.validate(),
        }
    }

    pub fn as_keypoints(&self) -> Option<&KeypointsDetectionModel> {
        match self {
            StepManifest::KeypointsDetectionModel(step) => Some(step),
            StepManifest::Crop(_) => None,
        }
    }
}

impl From<KeypointsDetectionModel> for StepManifest {
    fn from(step: KeypointsDetectionModel) -> Self {
        StepManifest::KeypointsDetectionModel(step)
    }
}

impl From<Crop> for StepManifest {
    fn from(step: Crop) -> Self {
        StepManifest::Crop(step)
    }
}

impl<'de> Deserialize<'de> for StepManifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;

        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| D::Error::missing_field("type"))?;

        let step_type = StepType::from_type_tag(tag).ok_or_else(|| {
            let known: Vec<&str> = StepType::ALL.iter().map(StepType::as_str).collect();
            D::Error::custom(format!(
                "unknown step type '{}', expected one of: {}",
                tag,
                known.join(", ")
            ))
        })?;

        match step_type {
            StepType::KeypointsDetectionModel => serde_json::from_value(value)
                .map(StepManifest::KeypointsDetectionModel)
                .map_err(D::Error::custom),
            StepType::Crop => serde_json::from_value(value)
                .map(StepManifest::Crop)
                .map_err(D::Error::custom),
        }
    }
}
