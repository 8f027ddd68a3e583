//! Request and response payloads of the inference server.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use vstep_models::{
    ImageDimensions, KeypointPrediction, KeypointsDetectionOutput, KeypointsInferenceParameters,
};

use crate::error::{ClientError, ClientResult};

/// File extensions picked up when a directory of images is loaded.
pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "jpeg", "jpg", "png", "tif", "tiff", "webp"];

/// Image payload sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum InferenceImage {
    /// Base64 encoded image bytes
    Base64(String),
    /// URL the server downloads the image from
    Url(String),
}

impl InferenceImage {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        InferenceImage::Base64(STANDARD.encode(bytes))
    }

    /// Read and encode an image file.
    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| image_error(path, e))?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        InferenceImage::Url(url.into())
    }
}

/// An image and the id its predictions are reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImage {
    pub name: String,
    pub image: InferenceImage,
}

impl NamedImage {
    pub fn new(name: impl Into<String>, image: InferenceImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    /// Load one image file, or every image of a directory sorted by file name.
    ///
    /// Each image is named after its file name. Directory entries without an
    /// image extension are skipped.
    pub async fn load(path: impl AsRef<Path>) -> ClientResult<Vec<Self>> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| image_error(path, e))?;

        let files = if metadata.is_dir() {
            image_files(path).await?
        } else {
            vec![path.to_path_buf()]
        };

        let mut images = Vec::with_capacity(files.len());
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            images.push(Self::new(name, InferenceImage::from_path(&file).await?));
        }
        Ok(images)
    }
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

async fn image_files(dir: &Path) -> ClientResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| image_error(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| image_error(dir, e))? {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| image_error(&path, e))?
            .is_file();
        if is_file && has_image_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn image_error(path: &Path, source: std::io::Error) -> ClientError {
    ClientError::Image {
        path: path.display().to_string(),
        source,
    }
}

/// Body of `POST /infer/keypoints_detection`.
#[derive(Debug, Clone, Serialize)]
pub struct KeypointsInferenceRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
    #[serde(flatten)]
    pub parameters: &'a KeypointsInferenceParameters,
    pub image: &'a InferenceImage,
}

/// Raw keypoint detection response.
#[derive(Debug, Clone, Deserialize)]
pub struct KeypointsInferenceResponse {
    pub image: ImageDimensions,
    #[serde(default)]
    pub predictions: Vec<KeypointPrediction>,
    /// Server side processing time in seconds
    #[serde(default)]
    pub time: Option<f64>,
}

impl KeypointsInferenceResponse {
    pub fn into_step_output(self, parent_id: impl Into<String>) -> KeypointsDetectionOutput {
        KeypointsDetectionOutput::new(self.predictions, self.image, parent_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub uuid: String,
}

/// A model currently loaded by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub model_id: String,
    pub task_type: String,
    /// Either a number or a textual marker such as `"dynamic"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegisteredModels {
    #[serde(default)]
    pub models: Vec<ModelDescription>,
}

impl RegisteredModels {
    pub fn contains(&self, model_id: &str) -> bool {
        self.models.iter().any(|m| m.model_id == model_id)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoadModelRequest<'a> {
    pub model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UnloadModelRequest<'a> {
    pub model_id: &'a str,
}
