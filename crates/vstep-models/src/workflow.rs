//! Workflow definitions and their static validation.
//!
//! A definition declares inputs, steps and outputs. Validation checks that
//! names are unique and that every selector points at something declared
//! with the right kind. Nothing is executed here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::keypoints::{ManifestError, CROPS_OUTPUT};
use crate::outputs::OUTPUT_PREDICTIONS;
use crate::selector::{is_valid_segment, Selector};
use crate::step::{StepManifest, StepType};

/// Definition format version written by default.
pub const DEFAULT_DEFINITION_VERSION: &str = "1.0";

fn default_version() -> String {
    DEFAULT_DEFINITION_VERSION.to_string()
}

/// A declared workflow input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum InputDeclaration {
    /// An image supplied at run time
    InferenceImage { name: String },
    /// A scalar or structured parameter supplied at run time
    InferenceParameter {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<serde_json::Value>,
    },
}

impl InputDeclaration {
    pub fn name(&self) -> &str {
        match self {
            InputDeclaration::InferenceImage { name } => name,
            InputDeclaration::InferenceParameter { name, .. } => name,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, InputDeclaration::InferenceImage { .. })
    }

    pub fn default_value(&self) -> Option<&serde_json::Value> {
        match self {
            InputDeclaration::InferenceImage { .. } => None,
            InputDeclaration::InferenceParameter { default_value, .. } => default_value.as_ref(),
        }
    }
}

/// A named workflow output taken from a selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JsonField {
    pub name: String,
    pub selector: Selector,
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowDefinition {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub inputs: Vec<InputDeclaration>,
    pub steps: Vec<StepManifest>,
    #[serde(default)]
    pub outputs: Vec<JsonField>,
}

impl WorkflowDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|source| DefinitionError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn step(&self, name: &str) -> Option<&StepManifest> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub fn input(&self, name: &str) -> Option<&InputDeclaration> {
        self.inputs.iter().find(|i| i.name() == name)
    }

    /// Validate the whole definition, collecting every problem found.
    pub fn validate(&self) -> Result<(), WorkflowValidationError> {
        let mut errors = Vec::new();

        let inputs = index_unique(
            self.inputs.iter().map(|i| (i.name(), i)),
            WorkflowError::DuplicateInput,
            &mut errors,
        );
        let steps = index_unique(
            self.steps.iter().map(|s| (s.name(), s)),
            WorkflowError::DuplicateStep,
            &mut errors,
        );
        index_unique(
            self.outputs.iter().map(|o| (o.name.as_str(), o)),
            WorkflowError::DuplicateOutput,
            &mut errors,
        );

        for input in &self.inputs {
            if !is_valid_segment(input.name()) {
                errors.push(WorkflowError::InvalidInputName(input.name().to_string()));
            }
        }

        let context = Context { inputs, steps };

        for step in &self.steps {
            let mut image_rejected = false;
            if let Err(e) = step.validate() {
                image_rejected = matches!(e, ManifestError::InvalidImageSelector { .. });
                errors.push(WorkflowError::Manifest(e));
            }
            let location = Location::Step(step.name().to_string());
            for (field, selector) in step.selectors() {
                if let Some(e) = context.check_reference(&location, field, selector) {
                    errors.push(e);
                    continue;
                }
                if field == "image" && image_rejected {
                    continue;
                }
                if let Some(e) = context.check_kind(step, field, selector) {
                    errors.push(e);
                }
            }
        }

        for output in &self.outputs {
            let location = Location::Output(output.name.clone());
            if let Some(e) = context.check_reference(&location, "selector", &output.selector) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorkflowValidationError(errors))
        }
    }
}

fn index_unique<'a, T>(
    items: impl Iterator<Item = (&'a str, &'a T)>,
    duplicate: fn(String) -> WorkflowError,
    errors: &mut Vec<WorkflowError>,
) -> HashMap<&'a str, &'a T> {
    let mut index = HashMap::new();
    let mut reported = HashSet::new();
    for (name, item) in items {
        if index.insert(name, item).is_some() && reported.insert(name) {
            errors.push(duplicate(name.to_string()));
        }
    }
    index
}

struct Context<'a> {
    inputs: HashMap<&'a str, &'a InputDeclaration>,
    steps: HashMap<&'a str, &'a StepManifest>,
}

impl Context<'_> {
    /// Does the selector point at something that exists?
    fn check_reference(
        &self,
        location: &Location,
        field: &'static str,
        selector: &Selector,
    ) -> Option<WorkflowError> {
        match selector {
            Selector::Input { name } => (!self.inputs.contains_key(name.as_str())).then(|| {
                WorkflowError::UndefinedInput {
                    location: location.clone(),
                    field,
                    input: name.clone(),
                }
            }),
            Selector::StepOutput { step, output } => {
                if let Location::Step(own) = location {
                    if own == step {
                        return Some(WorkflowError::SelfReference {
                            step: own.clone(),
                            field,
                        });
                    }
                }
                match self.steps.get(step.as_str()) {
                    None => Some(WorkflowError::UndefinedStep {
                        location: location.clone(),
                        field,
                        step: step.clone(),
                    }),
                    Some(target) if !target.has_output(output) => Some(WorkflowError::UnknownOutput {
                        location: location.clone(),
                        field,
                        selector: selector.to_string(),
                        step_type: target.step_type(),
                    }),
                    Some(_) => None,
                }
            }
        }
    }

    /// Does the selector point at something of the kind the field needs?
    fn check_kind(
        &self,
        step: &StepManifest,
        field: &'static str,
        selector: &Selector,
    ) -> Option<WorkflowError> {
        let step_name = step.name();
        match (step, field) {
            (_, "image") => self.check_image(step_name, selector),
            (StepManifest::Crop(_), "detections") => self.check_detections(step_name, selector),
            _ => match selector {
                Selector::Input { name } => {
                    let is_image = self.inputs.get(name.as_str()).is_some_and(|i| i.is_image());
                    is_image.then(|| WorkflowError::ParameterFromImage {
                        step: step_name.to_string(),
                        field,
                        input: name.clone(),
                    })
                }
                Selector::StepOutput { .. } => None,
            },
        }
    }

    fn check_image(&self, step: &str, selector: &Selector) -> Option<WorkflowError> {
        let valid = match selector {
            Selector::Input { name } => self.inputs.get(name.as_str()).is_some_and(|i| i.is_image()),
            Selector::StepOutput { step: source, output } => {
                output == CROPS_OUTPUT
                    && self
                        .steps
                        .get(source.as_str())
                        .is_some_and(|s| s.step_type() == StepType::Crop)
            }
        };
        (!valid).then(|| WorkflowError::InvalidImageSource {
            step: step.to_string(),
            selector: selector.to_string(),
        })
    }

    fn check_detections(&self, step: &str, selector: &Selector) -> Option<WorkflowError> {
        let valid = match selector {
            Selector::StepOutput { step: source, output } => {
                output == OUTPUT_PREDICTIONS
                    && self
                        .steps
                        .get(source.as_str())
                        .is_some_and(|s| s.step_type() == StepType::KeypointsDetectionModel)
            }
            Selector::Input { .. } => false,
        };
        (!valid).then(|| WorkflowError::InvalidDetectionsSource {
            step: step.to_string(),
            selector: selector.to_string(),
        })
    }
}

/// Where in a definition a selector was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Step(String),
    Output(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Step(name) => write!(f, "step '{}'", name),
            Location::Output(name) => write!(f, "output '{}'", name),
        }
    }
}

/// A single problem found in a workflow definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Input name '{0}' is declared more than once")]
    DuplicateInput(String),

    #[error("Step name '{0}' is used by more than one step")]
    DuplicateStep(String),

    #[error("Output name '{0}' is declared more than once")]
    DuplicateOutput(String),

    #[error("Input name '{0}' may only contain letters, digits, '_' and '-'")]
    InvalidInputName(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("{location}: field '{field}' references undeclared input '{input}'")]
    UndefinedInput {
        location: Location,
        field: &'static str,
        input: String,
    },

    #[error("{location}: field '{field}' references undeclared step '{step}'")]
    UndefinedStep {
        location: Location,
        field: &'static str,
        step: String,
    },

    #[error("{location}: field '{field}' references '{selector}', which {step_type} does not output")]
    UnknownOutput {
        location: Location,
        field: &'static str,
        selector: String,
        step_type: StepType,
    },

    #[error("Step '{step}': field '{field}' references the step itself")]
    SelfReference { step: String, field: &'static str },

    #[error("Step '{step}': image must reference an InferenceImage input or the 'crops' output of a Crop step, got '{selector}'")]
    InvalidImageSource { step: String, selector: String },

    #[error("Step '{step}': detections must reference the 'predictions' output of a KeypointsDetectionModel step, got '{selector}'")]
    InvalidDetectionsSource { step: String, selector: String },

    #[error("Step '{step}': parameter '{field}' cannot take image input '{input}'")]
    ParameterFromImage {
        step: String,
        field: &'static str,
        input: String,
    },
}

/// All problems found in a workflow definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct WorkflowValidationError(pub Vec<WorkflowError>);

impl WorkflowValidationError {
    pub fn errors(&self) -> &[WorkflowError] {
        &self.0
    }
}

impl fmt::Display for WorkflowValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Workflow definition has {} error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

/// Failure to load a workflow definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workflow definition: {0}")]
    Json(#[from] serde_json::Error),
}
