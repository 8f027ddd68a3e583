//! Binding a keypoint step's parameters to concrete values.
//!
//! Literals are taken as-is and `$inputs.*` selectors are looked up in the
//! runtime inputs, falling back to the input's declared default. Step output
//! selectors cannot be bound without executing the workflow and are rejected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::keypoints::{KeypointsDetectionModel, DEFAULT_IOU};
use crate::probability::Probability;
use crate::selector::{Param, Selector};
use crate::workflow::InputDeclaration;

/// Values supplied for workflow inputs at run time, keyed by input name.
pub type RuntimeInputs = HashMap<String, serde_json::Value>;

/// Concrete parameters of one keypoint detection call.
///
/// `None` means the server default applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointsInferenceParameters {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_active_learning: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Probability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_agnostic_nms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_filter: Option<Vec<String>>,
    pub iou_threshold: Probability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_detections: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_candidates: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoint_confidence: Option<Probability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("Field '{field}': no value supplied for input '{input}' and no default declared")]
    MissingInput { field: &'static str, input: String },

    #[error("Field '{field}': value of input '{input}' is invalid: {reason}")]
    InvalidValue {
        field: &'static str,
        input: String,
        reason: String,
    },

    #[error("Field '{field}': step output '{selector}' can only be resolved while the workflow runs")]
    StepOutputUnsupported { field: &'static str, selector: String },
}

struct Binder<'a> {
    runtime: &'a RuntimeInputs,
    declarations: &'a [InputDeclaration],
}

impl Binder<'_> {
    fn resolve<T: DeserializeOwned + Clone>(
        &self,
        field: &'static str,
        param: &Param<T>,
    ) -> Result<T, BindError> {
        let name = match param {
            Param::Literal(value) => return Ok(value.clone()),
            Param::Selector(Selector::Input { name }) => name,
            Param::Selector(selector @ Selector::StepOutput { .. }) => {
                return Err(BindError::StepOutputUnsupported {
                    field,
                    selector: selector.to_string(),
                })
            }
        };

        let value = self
            .runtime
            .get(name)
            .or_else(|| {
                self.declarations
                    .iter()
                    .find(|d| d.name() == name)
                    .and_then(InputDeclaration::default_value)
            })
            .ok_or_else(|| BindError::MissingInput {
                field,
                input: name.clone(),
            })?;

        serde_json::from_value(value.clone()).map_err(|e| BindError::InvalidValue {
            field,
            input: name.clone(),
            reason: e.to_string(),
        })
    }

    fn resolve_opt<T: DeserializeOwned + Clone>(
        &self,
        field: &'static str,
        param: &Option<Param<T>>,
    ) -> Result<Option<T>, BindError> {
        param.as_ref().map(|p| self.resolve(field, p)).transpose()
    }
}

impl KeypointsDetectionModel {
    /// Bind every parameter to a concrete value.
    ///
    /// The image is not bound; callers supply the image payload themselves.
    pub fn bind(
        &self,
        runtime: &RuntimeInputs,
        declarations: &[InputDeclaration],
    ) -> Result<KeypointsInferenceParameters, BindError> {
        let binder = Binder {
            runtime,
            declarations,
        };

        Ok(KeypointsInferenceParameters {
            model_id: binder.resolve("model_id", &self.model_id)?,
            disable_active_learning: binder
                .resolve_opt("disable_active_learning", &self.disable_active_learning)?,
            confidence: binder.resolve_opt("confidence", &self.confidence)?,
            class_agnostic_nms: binder.resolve_opt("class_agnostic_nms", &self.class_agnostic_nms)?,
            class_filter: binder.resolve_opt("class_filter", &self.class_filter)?,
            iou_threshold: binder
                .resolve_opt("iou_threshold", &self.iou_threshold)?
                .unwrap_or(DEFAULT_IOU),
            max_detections: binder.resolve_opt("max_detections", &self.max_detections)?,
            max_candidates: binder.resolve_opt("max_candidates", &self.max_candidates)?,
            keypoint_confidence: binder
                .resolve_opt("keypoint_confidence", &self.keypoint_confidence)?,
        })
    }
}
