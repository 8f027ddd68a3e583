//! `KeypointsDetectionModel` step manifest.
//!
//! Runs a keypoint (pose) detection model against an image and emits one
//! prediction per detected object, each carrying its keypoints.
//!
//! Every tunable parameter accepts either a literal or a selector. Omitted
//! parameters are left to the inference server, except `iou_threshold`
//! which falls back to [`DEFAULT_IOU_THRESHOLD`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outputs::{
    OUTPUT_IMAGE, OUTPUT_PARENT_ID, OUTPUT_PREDICTIONS, OUTPUT_PREDICTION_TYPE,
};
use crate::probability::Probability;
use crate::selector::{is_valid_segment, Param, Selector};

/// Value of the `type` discriminator.
pub const KEYPOINTS_DETECTION_STEP_TYPE: &str = "KeypointsDetectionModel";

/// IoU threshold used for NMS when the manifest leaves it out.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

pub(crate) const DEFAULT_IOU: Probability = Probability::from_const(DEFAULT_IOU_THRESHOLD);

/// Step output a keypoint step may take its image from.
pub const CROPS_OUTPUT: &str = "crops";

/// Single-valued discriminator. Any other `type` fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum KeypointsDetectionModelType {
    #[default]
    KeypointsDetectionModel,
}

/// Configuration of a keypoint detection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct KeypointsDetectionModel {
    /// Step type discriminator, always `"KeypointsDetectionModel"`
    #[serde(rename = "type")]
    pub step_type: KeypointsDetectionModelType,

    /// Unique step name among sibling steps
    pub name: String,

    /// Model identifier, e.g. `"coco-pose/3"`
    pub model_id: Param<String>,

    /// Image input or a cropping step's `crops` output
    pub image: Selector,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_active_learning: Option<Param<bool>>,

    /// Minimum detection confidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Param<Probability>>,

    /// Run NMS across classes instead of per class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_agnostic_nms: Option<Param<bool>>,

    /// Keep only predictions of these classes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_filter: Option<Param<Vec<String>>>,

    /// NMS IoU threshold (defaults to 0.3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iou_threshold: Option<Param<Probability>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_detections: Option<Param<u32>>,

    /// Maximum number of candidates fed into NMS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<Param<u32>>,

    /// Minimum confidence for an individual keypoint to be reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoint_confidence: Option<Param<Probability>>,
}

impl KeypointsDetectionModel {
    /// Declared outputs, in the order they appear in the output record.
    pub const OUTPUTS: &'static [&'static str] = &[
        OUTPUT_PREDICTIONS,
        OUTPUT_IMAGE,
        OUTPUT_PARENT_ID,
        OUTPUT_PREDICTION_TYPE,
    ];

    /// Create a manifest with only the required fields set.
    pub fn new(name: impl Into<String>, model_id: impl Into<Param<String>>, image: Selector) -> Self {
        Self {
            step_type: KeypointsDetectionModelType::KeypointsDetectionModel,
            name: name.into(),
            model_id: model_id.into(),
            image,
            disable_active_learning: None,
            confidence: None,
            class_agnostic_nms: None,
            class_filter: None,
            iou_threshold: None,
            max_detections: None,
            max_candidates: None,
            keypoint_confidence: None,
        }
    }

    /// Parse a single manifest from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Effective NMS IoU threshold.
    ///
    /// Returns the default when omitted and `None` when the value is only
    /// known once the selector is resolved.
    pub fn effective_iou_threshold(&self) -> Option<f64> {
        match &self.iou_threshold {
            None => Some(DEFAULT_IOU_THRESHOLD),
            Some(Param::Literal(p)) => Some(p.value()),
            Some(Param::Selector(_)) => None,
        }
    }

    /// Whether `output` is one of this step's declared outputs.
    pub fn has_output(output: &str) -> bool {
        Self::OUTPUTS.contains(&output)
    }

    /// Every selector held by the manifest, paired with its field name.
    pub fn selectors(&self) -> Vec<(&'static str, &Selector)> {
        let mut found = vec![("image", &self.image)];
        if let Some(s) = self.model_id.selector() {
            found.push(("model_id", s));
        }

        let optional: [(&'static str, Option<&Selector>); 8] = [
            (
                "disable_active_learning",
                self.disable_active_learning.as_ref().and_then(Param::selector),
            ),
            ("confidence", self.confidence.as_ref().and_then(Param::selector)),
            (
                "class_agnostic_nms",
                self.class_agnostic_nms.as_ref().and_then(Param::selector),
            ),
            ("class_filter", self.class_filter.as_ref().and_then(Param::selector)),
            ("iou_threshold", self.iou_threshold.as_ref().and_then(Param::selector)),
            ("max_detections", self.max_detections.as_ref().and_then(Param::selector)),
            ("max_candidates", self.max_candidates.as_ref().and_then(Param::selector)),
            (
                "keypoint_confidence",
                self.keypoint_confidence.as_ref().and_then(Param::selector),
            ),
        ];
        found.extend(
            optional
                .into_iter()
                .filter_map(|(field, selector)| selector.map(|s| (field, s))),
        );
        found
    }

    /// Check the manifest in isolation.
    ///
    /// Cross-step rules (name uniqueness, what a selector actually points
    /// at) are checked by [`crate::workflow::WorkflowDefinition::validate`].
    pub fn validate(&self) -> Result<(), ManifestError> {
        validate_step_name(&self.name)?;

        if let Param::Literal(model_id) = &self.model_id {
            if model_id.trim().is_empty() {
                return Err(ManifestError::EmptyModelId {
                    step: self.name.clone(),
                });
            }
        }

        if let Selector::StepOutput { output, .. } = &self.image {
            if output != CROPS_OUTPUT {
                return Err(ManifestError::InvalidImageSelector {
                    step: self.name.clone(),
                    selector: self.image.to_string(),
                });
            }
        }

        if let Some(Param::Literal(classes)) = &self.class_filter {
            if classes.iter().any(|c| c.trim().is_empty()) {
                return Err(ManifestError::EmptyClassName {
                    step: self.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Check a step name: non-empty and usable as a selector segment.
pub fn validate_step_name(name: &str) -> Result<(), ManifestError> {
    if name.is_empty() {
        return Err(ManifestError::EmptyName);
    }
    if !is_valid_segment(name) {
        return Err(ManifestError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Errors found when checking a single step manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("Step name cannot be empty")]
    EmptyName,

    #[error("Step name '{0}' may only contain letters, digits, '_' and '-'")]
    InvalidName(String),

    #[error("Step '{step}': model_id cannot be empty")]
    EmptyModelId { step: String },

    #[error("Step '{step}': image must be '$inputs.<name>' or '$steps.<step>.crops', got '{selector}'")]
    InvalidImageSelector { step: String, selector: String },

    #[error("Step '{step}': class_filter cannot contain empty class names")]
    EmptyClassName { step: String },
}
