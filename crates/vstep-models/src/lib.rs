//! Shared data models for vision workflow steps.
//!
//! This crate provides Serde-serializable types for:
//! - Selectors and literal-or-reference step parameters
//! - The `KeypointsDetectionModel` and `Crop` step manifests
//! - Static validation of workflow definitions
//! - Binding keypoint parameters to concrete values
//! - The keypoint detection output record
//! - JSON Schema generation

pub mod binding;
pub mod crop;
pub mod keypoints;
pub mod outputs;
pub mod probability;
pub mod schema;
pub mod selector;
pub mod step;
pub mod workflow;

// Re-export common types
pub use binding::{BindError, KeypointsInferenceParameters, RuntimeInputs};
pub use crop::Crop;
pub use keypoints::{
    KeypointsDetectionModel, ManifestError, DEFAULT_IOU_THRESHOLD, KEYPOINTS_DETECTION_STEP_TYPE,
};
pub use outputs::{
    ImageDimensions, Keypoint, KeypointPrediction, KeypointsDetectionOutput,
    KEYPOINT_DETECTION_PREDICTION_TYPE,
};
pub use probability::{Probability, ProbabilityError};
pub use selector::{Param, Selector, SelectorError};
pub use step::{StepManifest, StepType};
pub use workflow::{
    DefinitionError, InputDeclaration, JsonField, WorkflowDefinition, WorkflowError,
    WorkflowValidationError,
};
