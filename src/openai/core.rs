use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// A lazy, finite sequence of text fragments from a streamed
/// completion. It can't be restarted once consumed.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// The completion backend a chat session relays to.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn completion_stream(
        &self,
        model: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<TokenStream, Error>;
}

pub type BoxedCompletionApi = std::sync::Arc<dyn CompletionApi + 'static>;

/// Client for an OpenAI compatible chat completions API.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_hostname: String,
    api_key: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str, api_key: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Request a completion in a single response instead of a stream.
    pub async fn completion(
        &self,
        model: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String, Error> {
        let payload = json!({
            "model": model,
            "messages": messages,
            "max_tokens": max_tokens,
        });
        let url = format!(
            "{}/v1/chat/completions",
            self.api_hostname.trim_end_matches("/")
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(60 * 5))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: CompletionResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Completion response had no content"))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[async_trait]
impl CompletionApi for OpenAiClient {
    async fn completion_stream(
        &self,
        model: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<TokenStream, Error> {
        completion_stream(
            self.http.clone(),
            messages,
            &self.api_hostname,
            &self.api_key,
            model,
            max_tokens,
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Delta {
    Content { content: String },

    // Reasoning models stream their thinking separately, it's not
    // part of the reply
    Reasoning {
        #[allow(dead_code)]
        reasoning: String,
    },

    Stop {},
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    choices: Vec<CompletionChunkChoice>,
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Fragment(String),
    Finished(String),
    Done,
    Skip,
}

/// Parse one complete server sent event from the completions API.
fn parse_event(event_data: &str) -> Result<SseEvent, Error> {
    let event_data = event_data.trim();
    let Some(data) = event_data.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();

    // Data can sometimes be empty. Not sure why.
    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk = serde_json::from_str::<CompletionChunk>(data).inspect_err(|e| {
        tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
    })?;
    let Some(choice) = chunk.choices.first() else {
        return Ok(SseEvent::Skip);
    };

    let content = match &choice.delta {
        Delta::Content { content } => content.clone(),
        Delta::Reasoning { .. } | Delta::Stop {} => String::new(),
    };

    if choice.finish_reason.is_some() {
        return Ok(SseEvent::Finished(content));
    }

    Ok(SseEvent::Fragment(content))
}

/// Turn an error response into an error carrying the body, which
/// usually explains what went wrong (bad key, unknown model, etc.).
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("Completion request failed ({}): {}", status, body))
}

/// Request a streamed completion and return the text fragments as
/// they arrive. Nothing is sent until the stream is first polled.
pub async fn completion_stream(
    http: reqwest::Client,
    messages: &[Message],
    api_hostname: &str,
    api_key: &str,
    model: &str,
    max_tokens: u32,
) -> Result<TokenStream, Error> {
    let payload = json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
        "stream": true,
    });
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let api_key = api_key.to_string();

    let stream: TokenStream = Box::pin(async_stream::try_stream! {
        let response = http
            .post(url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60 * 5))
            .json(&payload)
            .send()
            .await?;

        let response = check_status(response).await?;
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            // Append new data to buffer. This is necessary to handle SSE
            // fragmentation over HTTP/2 frames, which can also split a
            // multi-byte character.
            buffer.extend_from_slice(&chunk);

            // Process all complete SSE events from the buffer
            while let Some(event_end) = buffer.windows(2).position(|w| w == b"\n\n") {
                let event: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event_data = String::from_utf8_lossy(&event[..event_end]).to_string();

                match parse_event(&event_data)? {
                    SseEvent::Skip => continue,
                    SseEvent::Fragment(text) => {
                        yield text;
                    }
                    SseEvent::Finished(text) => {
                        yield text;
                        break 'outer;
                    }
                    SseEvent::Done => break 'outer,
                }
            }
        }
    });

    Ok(stream)
}
