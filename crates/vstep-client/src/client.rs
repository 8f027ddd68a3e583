//! Inference server HTTP client.

use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;
use vstep_models::{KeypointsDetectionOutput, KeypointsInferenceParameters};

use crate::config::InferenceClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics;
use crate::types::{
    InferenceImage, KeypointsInferenceRequest, KeypointsInferenceResponse, LoadModelRequest,
    NamedImage, RegisteredModels, ServerInfo, UnloadModelRequest,
};

const KEYPOINTS_DETECTION_PATH: &str = "infer/keypoints_detection";

/// Client for the inference server.
pub struct InferenceClient {
    http: Client,
    base_url: Url,
    config: InferenceClientConfig,
}

impl InferenceClient {
    /// Create a new client.
    pub fn new(config: InferenceClientConfig) -> ClientResult<Self> {
        config.validate()?;

        let mut base_url = Url::parse(&config.api_url)
            .map_err(|e| ClientError::InvalidConfig(format!("api_url: {}", e)))?;
        // Keep a trailing slash so joined paths stay below any base path.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(InferenceClientConfig::from_env())
    }

    pub fn config(&self) -> &InferenceClientConfig {
        &self.config
    }

    pub async fn server_info(&self) -> ClientResult<ServerInfo> {
        self.call::<(), _>("server_info", Method::GET, "info", None)
            .await
    }

    pub async fn list_loaded_models(&self) -> ClientResult<RegisteredModels> {
        self.call::<(), _>("list_loaded_models", Method::GET, "model/registry", None)
            .await
    }

    /// Ask the server to load a model. Requires an API key for private models.
    pub async fn load_model(&self, model_id: &str) -> ClientResult<RegisteredModels> {
        info!(model_id = %model_id, "Loading model");
        let body = LoadModelRequest {
            model_id,
            api_key: self.config.api_key.as_deref(),
        };
        self.call("load_model", Method::POST, "model/add", Some(&body))
            .await
    }

    pub async fn unload_model(&self, model_id: &str) -> ClientResult<RegisteredModels> {
        info!(model_id = %model_id, "Unloading model");
        let body = UnloadModelRequest { model_id };
        self.call("unload_model", Method::POST, "model/remove", Some(&body))
            .await
    }

    pub async fn unload_all_models(&self) -> ClientResult<RegisteredModels> {
        info!("Unloading all models");
        self.call::<(), _>("unload_all_models", Method::POST, "model/clear", None)
            .await
    }

    /// Run keypoint detection and shape the answer as a step output.
    ///
    /// `parent_id` identifies the image (or crop) the predictions belong to.
    pub async fn infer_keypoints(
        &self,
        parameters: &KeypointsInferenceParameters,
        image: &InferenceImage,
        parent_id: &str,
    ) -> ClientResult<KeypointsDetectionOutput> {
        let request = KeypointsInferenceRequest {
            api_key: self.config.api_key.as_deref(),
            parameters,
            image,
        };

        let response: KeypointsInferenceResponse = self
            .call(
                "infer_keypoints",
                Method::POST,
                KEYPOINTS_DETECTION_PATH,
                Some(&request),
            )
            .await?;

        debug!(
            model_id = %parameters.model_id,
            predictions = response.predictions.len(),
            server_time = ?response.time,
            "Keypoint detection completed"
        );
        let output = response.into_step_output(parent_id);
        metrics::record_detection(&parameters.model_id, &output);
        Ok(output)
    }

    /// Run keypoint detection on several images, one request per image.
    ///
    /// Outputs keep the order of `images` and carry each image's name as
    /// `parent_id`. The first failing image aborts the batch.
    pub async fn infer_keypoints_batch(
        &self,
        parameters: &KeypointsInferenceParameters,
        images: &[NamedImage],
    ) -> ClientResult<Vec<KeypointsDetectionOutput>> {
        info!(
            model_id = %parameters.model_id,
            images = images.len(),
            "Running keypoint detection batch"
        );
        let mut outputs = Vec::with_capacity(images.len());
        for named in images {
            outputs.push(
                self.infer_keypoints(parameters, &named.image, &named.name)
                    .await?,
            );
        }
        Ok(outputs)
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidConfig(format!("endpoint {}: {}", path, e)))
    }

    /// Send a request with retries and decode the JSON answer.
    async fn call<B, T>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let method = &method;
        let url = &url;

        debug!(operation, url = %url, "Sending inference server request");

        let result = self
            .with_retry(operation, move || {
                self.send_once(operation, method, url, body)
            })
            .await;
        if let Err(e) = &result {
            metrics::record_failure(operation, e);
        }
        result
    }

    async fn send_once<B, T>(
        &self,
        operation: &'static str,
        method: &Method,
        url: &Url,
        body: Option<&B>,
    ) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let result = request.send().await;
        metrics::record_attempt(
            operation,
            result.as_ref().ok().map(|r| r.status().as_u16()),
            started.elapsed(),
        );
        let response = result?;

        let response = check_status(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", operation, e)))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(
        &self,
        operation: &'static str,
        attempt_fn: F,
    ) -> ClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ClientResult<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            match attempt_fn().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Inference request failed, retrying"
                    );
                    metrics::record_retry(operation, &e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Turn a non-2xx answer into `ClientError::HttpCall`.
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    let body = response.text().await.unwrap_or_default();

    let api_message = if is_json {
        serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
    } else if body.trim().is_empty() {
        None
    } else {
        Some(body)
    };

    Err(ClientError::HttpCall {
        status: status.as_u16(),
        api_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = InferenceClientConfig::default().with_api_url("http://inference:9001/v1");
        let client = InferenceClient::new(config).unwrap();
        assert_eq!(
            client.endpoint("model/registry").unwrap().as_str(),
            "http://inference:9001/v1/model/registry"
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = InferenceClientConfig::default().with_api_url("::not-a-url");
        assert!(matches!(
            InferenceClient::new(config),
            Err(ClientError::InvalidConfig(_))
        ));
    }
}
