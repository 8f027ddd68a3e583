//! JSON Schema documents for step manifests and workflow definitions.

use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::crop::Crop;
use crate::keypoints::KeypointsDetectionModel;
use crate::outputs::KeypointsDetectionOutput;
use crate::workflow::WorkflowDefinition;

pub fn keypoints_manifest_schema() -> RootSchema {
    schema_for!(KeypointsDetectionModel)
}

pub fn crop_manifest_schema() -> RootSchema {
    schema_for!(Crop)
}

pub fn keypoints_output_schema() -> RootSchema {
    schema_for!(KeypointsDetectionOutput)
}

pub fn workflow_schema() -> RootSchema {
    schema_for!(WorkflowDefinition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_keypoints_schema_shape() {
        let schema = serde_json::to_value(keypoints_manifest_schema()).unwrap();

        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        for field in ["type", "name", "model_id", "image"] {
            assert!(required.contains(&field), "{field} should be required");
        }
        assert!(!required.contains(&"iou_threshold"));
        assert_eq!(schema["additionalProperties"], Value::Bool(false));

        let probability = &schema["definitions"]["Probability"];
        assert_eq!(probability["minimum"], 0.0);
        assert_eq!(probability["maximum"], 1.0);
    }

    #[test]
    fn test_output_schema_pins_prediction_type() {
        let schema = serde_json::to_value(keypoints_output_schema()).unwrap();
        let prediction_type = &schema["definitions"]["KeypointDetectionPredictionType"];
        assert_eq!(prediction_type["const"], "keypoint-detection");
    }

    #[test]
    fn test_workflow_schema_lists_step_types() {
        let schema = serde_json::to_string(&workflow_schema()).unwrap();
        assert!(schema.contains("KeypointsDetectionModel"));
        assert!(schema.contains("Crop"));
        assert!(schema.contains("InferenceImage"));
    }
}
