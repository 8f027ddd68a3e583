//! Output record produced by a keypoint detection step.

use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const OUTPUT_PREDICTIONS: &str = "predictions";
pub const OUTPUT_IMAGE: &str = "image";
pub const OUTPUT_PARENT_ID: &str = "parent_id";
pub const OUTPUT_PREDICTION_TYPE: &str = "prediction_type";

/// Constant value of `prediction_type` for keypoint steps.
pub const KEYPOINT_DETECTION_PREDICTION_TYPE: &str = "keypoint-detection";

/// Marker that always serializes to `"keypoint-detection"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeypointDetectionPredictionType;

impl KeypointDetectionPredictionType {
    pub fn as_str(&self) -> &'static str {
        KEYPOINT_DETECTION_PREDICTION_TYPE
    }
}

impl Serialize for KeypointDetectionPredictionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(KEYPOINT_DETECTION_PREDICTION_TYPE)
    }
}

impl<'de> Deserialize<'de> for KeypointDetectionPredictionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == KEYPOINT_DETECTION_PREDICTION_TYPE {
            Ok(Self)
        } else {
            Err(D::Error::custom(format!(
                "prediction_type must be '{}', got '{}'",
                KEYPOINT_DETECTION_PREDICTION_TYPE, raw
            )))
        }
    }
}

impl JsonSchema for KeypointDetectionPredictionType {
    fn schema_name() -> String {
        "KeypointDetectionPredictionType".to_string()
    }

    fn json_schema(_gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            const_value: Some(serde_json::Value::String(
                KEYPOINT_DETECTION_PREDICTION_TYPE.to_string(),
            )),
            ..Default::default()
        }
        .into()
    }
}

/// Size of the image the predictions refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// A single keypoint of a detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Keypoint {
    /// X coordinate in pixels
    pub x: f64,
    /// Y coordinate in pixels
    pub y: f64,
    pub confidence: f64,
    /// Keypoint class name (e.g. "left_wrist")
    pub class: String,
    pub class_id: u32,
}

/// A detected object with its bounding box and keypoints.
///
/// The box is given by its center (`x`, `y`) and size, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeypointPrediction {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    pub class: String,
    pub class_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_id: Option<String>,
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

impl KeypointPrediction {
    /// Bounding box as `[x_min, y_min, x_max, y_max]`.
    pub fn bbox_xyxy(&self) -> [f64; 4] {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        [self.x - half_w, self.y - half_h, self.x + half_w, self.y + half_h]
    }
}

/// Result of one `KeypointsDetectionModel` invocation.
///
/// Serializes to exactly four fields: `predictions`, `image`, `parent_id`
/// and `prediction_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct KeypointsDetectionOutput {
    pub predictions: Vec<KeypointPrediction>,
    pub image: ImageDimensions,
    /// Identifier of the image (or crop) the predictions belong to
    pub parent_id: String,
    pub prediction_type: KeypointDetectionPredictionType,
}

impl KeypointsDetectionOutput {
    pub fn new(
        predictions: Vec<KeypointPrediction>,
        image: ImageDimensions,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            predictions,
            image,
            parent_id: parent_id.into(),
            prediction_type: KeypointDetectionPredictionType,
        }
    }

    /// Number of keypoints across all predictions.
    pub fn total_keypoints(&self) -> usize {
        self.predictions.iter().map(|p| p.keypoints.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_prediction() -> KeypointPrediction {
        KeypointPrediction {
            x: 50.0,
            y: 40.0,
            width: 20.0,
            height: 60.0,
            confidence: 0.91,
            class: "person".to_string(),
            class_id: 0,
            detection_id: Some("d-1".to_string()),
            keypoints: vec![Keypoint {
                x: 48.0,
                y: 15.0,
                confidence: 0.88,
                class: "nose".to_string(),
                class_id: 0,
            }],
        }
    }

    #[test]
    fn test_output_has_exactly_four_fields() {
        let output = KeypointsDetectionOutput::new(
            vec![sample_prediction()],
            ImageDimensions { width: 640, height: 480 },
            "image",
        );
        let value = serde_json::to_value(&output).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["image", "parent_id", "prediction_type", "predictions"]);
        assert_eq!(object["prediction_type"], "keypoint-detection");
        assert_eq!(output.total_keypoints(), 1);
    }

    #[test]
    fn test_rejects_other_prediction_type() {
        let json = r#"{
            "predictions": [],
            "image": {"width": 10, "height": 10},
            "parent_id": "image",
            "prediction_type": "object-detection"
        }"#;
        assert!(serde_json::from_str::<KeypointsDetectionOutput>(json).is_err());

        let ok = json.replace("object-detection", "keypoint-detection");
        let output: KeypointsDetectionOutput = serde_json::from_str(&ok).unwrap();
        assert_eq!(output.prediction_type.as_str(), KEYPOINT_DETECTION_PREDICTION_TYPE);
    }

    #[test]
    fn test_bbox_conversion() {
        assert_eq!(sample_prediction().bbox_xyxy(), [40.0, 10.0, 60.0, 70.0]);
    }

    #[test]
    fn test_prediction_without_keypoints_field() {
        let p: KeypointPrediction = serde_json::from_str(
            r#"{"x": 1, "y": 2, "width": 3, "height": 4, "confidence": 0.5, "class": "person", "class_id": 0}"#,
        )
        .unwrap();
        assert!(p.keypoints.is_empty());
        assert!(p.detection_id.is_none());
    }
}
