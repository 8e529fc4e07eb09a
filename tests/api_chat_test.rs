//! Integration tests for the chat API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use chat_relay::chat::MAX_ATTACHMENT_BYTES;
    use serde_json::json;

    use crate::test_utils::{body_to_json, body_to_string, login, send, test_app};

    const SSE_RESPONSE: &str = r#"data: {"id":"chunk1","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}

data: {"id":"chunk2","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}

data: {"id":"chunk3","choices":[{"index":0,"delta":{"content":" World"},"finish_reason":null}]}

data: {"id":"chunk4","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}

data: [DONE]

"#;

    #[tokio::test]
    async fn it_starts_a_chat_with_the_selected_profile() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "bob", "pw2").await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/start"),
            Some(json!({"profile": "gpt-3.5-turbo"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["phase"], "active");
        assert_eq!(body["profile"], "gpt-3.5-turbo");
        assert_eq!(
            body["messages"],
            json!([
                "Starting chat with bob using the `gpt-3.5-turbo` chat profile.",
                "You can now start sending your messages."
            ])
        );
    }

    #[tokio::test]
    async fn it_defaults_to_the_first_profile() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "bob", "pw2").await;

        let response = send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["profile"], "gpt-4o");
    }

    #[tokio::test]
    async fn it_rejects_an_inaccessible_profile() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "alice", "pw1").await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/start"),
            Some(json!({"profile": "gpt-3.5-turbo"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn it_greets_a_user_without_profiles() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "carol", "pw3").await;

        let response = send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["profile"], json!(null));
        assert_eq!(
            body["messages"],
            json!(["Welcome carol! You do not have access to any models."])
        );

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({"message": "Hello"})),
        )
        .await;
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains(r#""type":"error""#));
        assert!(body.contains("Chat profile not found."));
    }

    #[tokio::test]
    async fn it_streams_a_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "gpt-4o",
                "max_tokens": 100,
                "stream": true,
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "Say hello"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(SSE_RESPONSE)
            .create_async()
            .await;

        let (app, _dir) = test_app(&server.url());
        let id = login(&app, "alice", "pw1").await;
        send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({"message": "Say hello"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_string(response.into_body()).await;
        mock.assert_async().await;
        assert!(body.contains(r#"{"type":"token","content":"Hello"}"#));
        assert!(body.contains(r#"{"type":"token","content":" World"}"#));
        assert!(body.contains(r#"{"type":"done","content":"Hello World"}"#));

        let response = send(&app, "GET", &format!("/api/chat/{id}"), None).await;
        let body = body_to_json(response.into_body()).await;
        assert_eq!(
            body["history"],
            json!([
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Say hello"},
                {"role": "assistant", "content": "Hello World"}
            ])
        );
    }

    #[tokio::test]
    async fn it_requires_a_file_when_asked() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "alice", "pw1").await;
        send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({"message": "Summarize this FILE"})),
        )
        .await;
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains(r#"{"type":"error","content":"Error: No file uploaded"}"#));

        // Nothing was added to the history
        let response = send(&app, "GET", &format!("/api/chat/{id}"), None).await;
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn it_sends_an_attached_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(json!({
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "Read this file file content:line one"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(SSE_RESPONSE)
            .create_async()
            .await;

        let (app, _dir) = test_app(&server.url());
        let id = login(&app, "alice", "pw1").await;
        send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({
                "message": "Read this file",
                "attachment": {
                    "name": "notes.txt",
                    "mime": "text/plain",
                    "content": STANDARD.encode("line one"),
                }
            })),
        )
        .await;
        let body = body_to_string(response.into_body()).await;

        mock.assert_async().await;
        assert!(body.contains(r#"{"type":"done","content":"Hello World"}"#));
    }

    #[tokio::test]
    async fn it_accepts_a_large_text_attachment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(SSE_RESPONSE)
            .create_async()
            .await;

        let (app, _dir) = test_app(&server.url());
        let id = login(&app, "alice", "pw1").await;
        send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;

        let text = "a".repeat(3 * 1024 * 1024);
        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({
                "message": "Summarize this file",
                "attachment": {
                    "name": "big.txt",
                    "mime": "text/plain",
                    "content": STANDARD.encode(&text),
                }
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_string(response.into_body()).await;
        mock.assert_async().await;
        assert!(body.contains(r#"{"type":"done","content":"Hello World"}"#));
    }

    #[tokio::test]
    async fn it_reports_an_attachment_over_the_size_limit() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "alice", "pw1").await;
        send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;

        let text = vec![b'a'; MAX_ATTACHMENT_BYTES as usize + 1];
        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({
                "message": "Summarize this file",
                "attachment": {
                    "name": "huge.txt",
                    "mime": "text/plain",
                    "content": STANDARD.encode(&text),
                }
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_string(response.into_body()).await;
        assert!(body.contains(r#""type":"error""#));
        assert!(body.contains(&format!(
            "Error: Failed to read file: huge.txt is {} bytes, the limit is {} bytes",
            MAX_ATTACHMENT_BYTES + 1,
            MAX_ATTACHMENT_BYTES
        )));

        // The rejected file never reached the history
        let response = send(&app, "GET", &format!("/api/chat/{id}"), None).await;
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn it_rejects_a_non_text_attachment() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "alice", "pw1").await;
        send(&app, "POST", &format!("/api/chat/{id}/start"), Some(json!({}))).await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({
                "message": "Read this file",
                "attachment": {
                    "name": "image.png",
                    "mime": "image/png",
                    "content": STANDARD.encode([0u8, 1, 2]),
                }
            })),
        )
        .await;
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("Failed to read file"));
    }

    #[tokio::test]
    async fn it_rejects_bad_attachment_encoding() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "alice", "pw1").await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/messages"),
            Some(json!({
                "message": "Read this file",
                "attachment": {"name": "a.txt", "mime": "text/plain", "content": "%%%"}
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn it_resumes_a_thread() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "bob", "pw2").await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/resume"),
            Some(json!({
                "chat_profile": "gpt-3.5-turbo",
                "steps": [
                    {"type": "user_message", "output": "Hi"},
                    {"type": "llm", "parentId": "step-1", "output": "nested"},
                    {"type": "assistant_message", "output": "Hello!"}
                ]
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["phase"], "active");
        assert_eq!(body["profile"], "gpt-3.5-turbo");
        assert_eq!(body["messages"], json!([]));

        let response = send(&app, "GET", &format!("/api/chat/{id}"), None).await;
        let body = body_to_json(response.into_body()).await;
        assert_eq!(
            body["history"],
            json!([
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello!"}
            ])
        );
    }

    #[tokio::test]
    async fn it_asks_for_a_profile_when_resuming_without_one() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "bob", "pw2").await;

        let response = send(
            &app,
            "POST",
            &format!("/api/chat/{id}/resume"),
            Some(json!({"steps": []})),
        )
        .await;
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["phase"], "profile_selection");
        assert_eq!(
            body["messages"],
            json!(["Please select a chat profile to continue."])
        );
    }

    #[tokio::test]
    async fn it_closes_a_session() {
        let (app, _dir) = test_app("http://localhost:1");
        let id = login(&app, "alice", "pw1").await;

        let response = send(&app, "DELETE", &format!("/api/chat/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "GET", &format!("/api/chat/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "DELETE", &format!("/api/chat/{id}"), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn it_returns_not_found_for_unknown_sessions() {
        let (app, _dir) = test_app("http://localhost:1");

        let response = send(
            &app,
            "POST",
            "/api/chat/missing/messages",
            Some(json!({"message": "Hello"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
