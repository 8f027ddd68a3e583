//! HTTP client for the inference server.
//!
//! Covers server metadata, the model registry and keypoint detection calls.
//! Failed calls map to [`ClientError`]; transient failures are retried with
//! exponential backoff.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use client::InferenceClient;
pub use config::{InferenceClientConfig, DEFAULT_API_URL};
pub use error::{ClientError, ClientResult};
pub use types::{
    has_image_extension, InferenceImage, KeypointsInferenceRequest, KeypointsInferenceResponse,
    ModelDescription, NamedImage, RegisteredModels, ServerInfo, IMAGE_EXTENSIONS,
};
