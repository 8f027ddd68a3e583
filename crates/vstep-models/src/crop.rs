//! `Crop` step manifest.
//!
//! Only the schema is defined here. It is what a keypoint step's `image`
//! may reference through `$steps.<crop>.crops`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::keypoints::{validate_step_name, ManifestError, CROPS_OUTPUT};
use crate::outputs::OUTPUT_PARENT_ID;
use crate::selector::Selector;

pub const CROP_STEP_TYPE: &str = "Crop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum CropType {
    #[default]
    Crop,
}

/// Crops detected regions out of an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Crop {
    #[serde(rename = "type")]
    pub step_type: CropType,
    pub name: String,
    /// Image to crop from
    pub image: Selector,
    /// Predictions of a detection step
    pub detections: Selector,
}

impl Crop {
    pub const OUTPUTS: &'static [&'static str] = &[CROPS_OUTPUT, OUTPUT_PARENT_ID];

    pub fn new(name: impl Into<String>, image: Selector, detections: Selector) -> Self {
        Self {
            step_type: CropType::Crop,
            name: name.into(),
            image,
            detections,
        }
    }

    pub fn has_output(output: &str) -> bool {
        Self::OUTPUTS.contains(&output)
    }

    pub fn selectors(&self) -> Vec<(&'static str, &Selector)> {
        vec![("image", &self.image), ("detections", &self.detections)]
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        validate_step_name(&self.name)
    }
}
