//! Inference client tests against a mocked server.

use serde_json::json;
use std::time::{Duration, Instant};

use vstep_client::{ClientError, InferenceClient, InferenceClientConfig, InferenceImage, NamedImage};
use vstep_models::{KeypointsDetectionModel, Selector};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, max_retries: u32) -> InferenceClient {
    let config = InferenceClientConfig::default()
        .with_api_url(server.uri())
        .with_api_key("test-key")
        .with_max_retries(max_retries);
    InferenceClient::new(config).unwrap()
}

#[tokio::test]
async fn server_info_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Inference Server",
            "version": "0.9.1",
            "uuid": "abc-123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = client_for(&server, 0).server_info().await.unwrap();
    assert_eq!(info.version, "0.9.1");
    assert_eq!(info.uuid, "abc-123");
}

#[tokio::test]
async fn load_and_unload_models() {
    let server = MockServer::start().await;
    let registry = json!({"models": [{"model_id": "coco-pose/3", "task_type": "keypoint-detection"}]});
    Mock::given(method("POST"))
        .and(path("/model/add"))
        .and(body_json(json!({"model_id": "coco-pose/3", "api_key": "test-key"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(registry))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/model/remove"))
        .and(body_json(json!({"model_id": "coco-pose/3"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/model/clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 0);
    assert!(client.load_model("coco-pose/3").await.unwrap().contains("coco-pose/3"));
    assert!(client.unload_model("coco-pose/3").await.unwrap().models.is_empty());
    assert!(client.unload_all_models().await.unwrap().models.is_empty());
}

#[tokio::test]
async fn infer_keypoints_sends_bound_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/infer/keypoints_detection"))
        .and(body_json(json!({
            "api_key": "test-key",
            "model_id": "coco-pose/3",
            "iou_threshold": 0.3,
            "image": {"type": "url", "value": "https://images.test/person.jpg"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": {"width": 640, "height": 480},
            "predictions": [{
                "x": 320.0, "y": 240.0, "width": 100.0, "height": 200.0,
                "confidence": 0.92, "class": "person", "class_id": 0,
                "keypoints": [
                    {"x": 318.0, "y": 160.0, "confidence": 0.88, "class": "nose", "class_id": 0}
                ]
            }],
            "time": 0.041
        })))
        .expect(1)
        .mount(&server)
        .await;

    let step = KeypointsDetectionModel::new("pose", "coco-pose/3", Selector::input("image"));
    let params = step.bind(&Default::default(), &[]).unwrap();
    let image = InferenceImage::from_url("https://images.test/person.jpg");

    let output = client_for(&server, 0)
        .infer_keypoints(&params, &image, "image")
        .await
        .unwrap();

    let value = serde_json::to_value(&output).unwrap();
    let mut fields: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    fields.sort();
    assert_eq!(fields, ["image", "parent_id", "prediction_type", "predictions"]);
    assert_eq!(value["prediction_type"], "keypoint-detection");
    assert_eq!(output.total_keypoints(), 1);
}

#[tokio::test]
async fn http_errors_carry_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/model/add"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Model not found"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
        .mount(&server)
        .await;

    let client = client_for(&server, 0);
    match client.load_model("missing/1").await.unwrap_err() {
        ClientError::HttpCall {
            status,
            api_message,
        } => {
            assert_eq!(status, 404);
            assert_eq!(api_message.as_deref(), Some("Model not found"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = client.server_info().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("internal failure"));
}

#[tokio::test]
async fn retries_unavailable_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/model/registry"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/model/registry"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;

    let models = client_for(&server, 2).list_loaded_models().await.unwrap();
    assert!(models.models.is_empty());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/model/remove"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "bad id"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 2).unload_model("x").await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn undecodable_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client_for(&server, 0).server_info().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server, 2).server_info().await.unwrap_err();
    assert!(matches!(err, ClientError::HttpCall { status: 503, .. }));
}

#[tokio::test]
async fn retries_rate_limited_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/model/clear"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"message": "slow down"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/model/clear"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client_for(&server, 1).unload_all_models().await.is_ok());
}

#[tokio::test]
async fn retries_connection_failures() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = InferenceClientConfig::default()
        .with_api_url(format!("http://{addr}"))
        .with_max_retries(1);
    let client = InferenceClient::new(config).unwrap();

    let started = Instant::now();
    let err = client.server_info().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert!(err.is_retryable());
    // one backoff of 500 ms between the two attempts
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn batch_inference_sends_one_request_per_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/infer/keypoints_detection"))
        .and(body_partial_json(json!({"model_id": "coco-pose/3"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": {"width": 320, "height": 240},
            "predictions": []
        })))
        .expect(3)
        .mount(&server)
        .await;

    let step = KeypointsDetectionModel::new("pose", "coco-pose/3", Selector::input("image"));
    let params = step.bind(&Default::default(), &[]).unwrap();
    let images: Vec<_> = ["a.jpg", "b.jpg", "c.jpg"]
        .into_iter()
        .map(|name| NamedImage::new(name, InferenceImage::from_bytes(name.as_bytes())))
        .collect();

    let outputs = client_for(&server, 0)
        .infer_keypoints_batch(&params, &images)
        .await
        .unwrap();
    let parents: Vec<_> = outputs.iter().map(|o| o.parent_id.as_str()).collect();
    assert_eq!(parents, ["a.jpg", "b.jpg", "c.jpg"]);
}
