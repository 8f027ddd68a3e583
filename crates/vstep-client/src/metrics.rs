//! Inference call metrics.
//!
//! Every attempt against the server is counted by outcome. Keypoint calls
//! additionally record how much the model found per image.

use std::time::Duration;

use metrics::{counter, histogram};
use vstep_models::KeypointsDetectionOutput;

use crate::error::ClientError;

pub const ATTEMPTS_TOTAL: &str = "vstep_inference_attempts_total";
pub const ATTEMPT_DURATION_SECONDS: &str = "vstep_inference_attempt_duration_seconds";
pub const FAILURES_TOTAL: &str = "vstep_inference_failures_total";
pub const RETRIES_TOTAL: &str = "vstep_inference_retries_total";
pub const PREDICTIONS_PER_IMAGE: &str = "vstep_keypoint_predictions_per_image";
pub const KEYPOINTS_PER_IMAGE: &str = "vstep_keypoints_per_image";

/// One request/response exchange. `status` is `None` when no response arrived.
pub(crate) fn record_attempt(operation: &'static str, status: Option<u16>, elapsed: Duration) {
    let status = status.map_or_else(|| "none".to_string(), |s| s.to_string());
    counter!(ATTEMPTS_TOTAL, "operation" => operation, "status" => status).increment(1);
    histogram!(ATTEMPT_DURATION_SECONDS, "operation" => operation).record(elapsed.as_secs_f64());
}

/// A call that failed after all retries.
pub(crate) fn record_failure(operation: &'static str, error: &ClientError) {
    counter!(FAILURES_TOTAL, "operation" => operation, "kind" => error.kind()).increment(1);
}

pub(crate) fn record_retry(operation: &'static str, error: &ClientError) {
    counter!(RETRIES_TOTAL, "operation" => operation, "reason" => error.kind()).increment(1);
}

pub(crate) fn record_detection(model_id: &str, output: &KeypointsDetectionOutput) {
    let model_id = model_id.to_string();
    histogram!(PREDICTIONS_PER_IMAGE, "model_id" => model_id.clone())
        .record(output.predictions.len() as f64);
    histogram!(KEYPOINTS_PER_IMAGE, "model_id" => model_id).record(output.total_keypoints() as f64);
}
