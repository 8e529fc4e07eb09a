//! Test utilities for integration tests
use std::fs;
use std::sync::{Arc, RwLock};

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

use chat_relay::api::{AppState, app};
use chat_relay::core::AppConfig;
use chat_relay::openai::OpenAiClient;

const USER_DATA: &str = r#"{
    "alice": {"password": "pw1", "role": "gpt-4o"},
    "bob": {"password": "pw2", "role": ["gpt-4o", "gpt-3.5-turbo", "gpt-4o"]},
    "carol": {"password": "pw3", "role": "admin"}
}"#;

/// Creates a test application router backed by a temporary
/// credentials file. Completion requests go to `api_hostname`.
///
/// Keep the returned directory alive for as long as the router is
/// used or the credentials file goes away with it.
pub fn test_app(api_hostname: &str) -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let user_data_path = dir.path().join("user_data.json");
    fs::write(&user_data_path, USER_DATA).expect("Failed to write user data");

    let app_config = AppConfig {
        user_data_path: user_data_path.display().to_string(),
        openai_api_hostname: api_hostname.to_string(),
        openai_api_key: String::from("test-api-key"),
        system_message: String::from("You are a helpful assistant."),
        max_tokens: 100,
        session_idle_minutes: 60,
    };
    let completion = Arc::new(OpenAiClient::new(
        &app_config.openai_api_hostname,
        &app_config.openai_api_key,
    ));
    let app_state = AppState::new(app_config, completion);

    (app(Arc::new(RwLock::new(app_state))), dir)
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub async fn body_to_json(body: Body) -> Value {
    serde_json::from_str(&body_to_string(body).await).expect("Body is not JSON")
}

/// Send a JSON request, `None` sends an empty body
pub async fn send(app: &Router, method: &str, uri: &str, json: Option<Value>) -> Response<Body> {
    let request = Request::builder().uri(uri).method(method);
    let request = match json {
        Some(json) => request
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

/// Log in and return the new session's ID
pub async fn login(app: &Router, username: &str, password: &str) -> String {
    let response = send(
        app,
        "POST",
        "/api/auth/login",
        Some(serde_json::json!({"username": username, "password": password})),
    )
    .await;
    let body = body_to_json(response.into_body()).await;
    body["session_id"].as_str().unwrap().to_string()
}
