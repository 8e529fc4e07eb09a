//! Public types for the chat API
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{Attachment, Phase};
use crate::openai::Message;
use crate::profiles::ChatProfile;

#[derive(Deserialize, Default)]
pub struct StartRequest {
    /// Profile to chat with, the first accessible one when missing
    #[serde(default)]
    pub profile: Option<String>,
}

/// State of a session after a lifecycle call along with the messages
/// the session showed the user.
#[derive(Serialize, Deserialize)]
pub struct LifecycleResponse {
    pub phase: Phase,
    pub profile: Option<String>,
    pub messages: Vec<String>,
}

/// A file sent with a message, content is base64 encoded
#[derive(Deserialize, Serialize, Clone)]
pub struct AttachmentPayload {
    pub name: String,
    pub mime: String,
    pub content: String,
}

impl AttachmentPayload {
    pub fn decode(&self) -> Result<Attachment, base64::DecodeError> {
        let bytes = STANDARD.decode(&self.content)?;
        Ok(Attachment::inline(&self.name, &self.mime, bytes))
    }
}

#[derive(Deserialize, Serialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
}

#[derive(Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub identifier: String,
    pub roles: Vec<String>,
    pub phase: Phase,
    pub profile: Option<String>,
    pub profiles: Vec<ChatProfile>,
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}
