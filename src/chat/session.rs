use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::attachment::{AttachmentError, AttachmentSource};
use super::events::{ChatEvent, EventSender};
use super::models::{ThreadRecord, Transcript};
use crate::auth::Identity;
use crate::core::{DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_MESSAGE};
use crate::openai::{CompletionApi, Message, Role};
use crate::profiles::{ChatProfile, ProfileRegistry};

const FILE_KEYWORD: &str = "file";
const FILE_PROMPT: &str = "Please upload a text file to continue.";
const SELECT_PROFILE_PROMPT: &str = "Please select a chat profile to continue.";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Authenticated, waiting for a profile to be picked
    ProfileSelection,
    /// Chat started. Without a profile the session is informational only.
    Active,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Chat profile {0} is not available to this user")]
    ProfileNotPermitted(String),
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Chat profile not found.")]
    NoProfile,

    #[error("No file uploaded")]
    NoFileUploaded,

    #[error("Failed to read file: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("{0}")]
    Completion(anyhow::Error),
}

/// Whether a message asks for a file to be included.
pub fn mentions_file(text: &str) -> bool {
    text.to_lowercase().contains(FILE_KEYWORD)
}

/// One user's conversation. Owns the selected profile and the message
/// history for as long as the conversation lasts.
///
/// Use `SessionBuilder` to construct a `Session`.
pub struct Session {
    id: String,
    identity: Identity,
    profiles: Vec<ChatProfile>,
    profile: Option<ChatProfile>,
    phase: Phase,
    transcript: Transcript,
    registry: Arc<ProfileRegistry>,
    system_message: String,
    max_tokens: u32,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Profiles this session may select
    pub fn profiles(&self) -> &[ChatProfile] {
        &self.profiles
    }

    pub fn profile(&self) -> Option<&ChatProfile> {
        self.profile.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn history(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session last started, resumed or relayed a message
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn is_idle(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        now - self.last_active >= timeout
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    fn send(tx: &EventSender, event: ChatEvent) {
        // The receiver going away (client disconnected) doesn't stop the
        // session from finishing its work
        let _ = tx.send(event);
    }

    fn accessible(&self, name: &str) -> Result<ChatProfile, SessionError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| SessionError::ProfileNotPermitted(name.to_string()))
    }

    /// Start a fresh chat. Without a selection the first accessible
    /// profile is used. A user with no accessible profiles gets a
    /// greeting and nothing else.
    pub fn start(&mut self, selected: Option<&str>, tx: &EventSender) -> Result<(), SessionError> {
        self.touch();
        let profile = match selected {
            Some(name) => Some(self.accessible(name)?),
            None => self.profiles.first().cloned(),
        };

        self.transcript = Transcript::new(&self.system_message);
        self.phase = Phase::Active;
        self.profile = profile;

        let Some(profile) = &self.profile else {
            tracing::debug!("No chat profiles for {}", self.identity.identifier);
            Self::send(
                tx,
                ChatEvent::Message(format!(
                    "Welcome {}! You do not have access to any models.",
                    self.identity.identifier
                )),
            );
            return Ok(());
        };

        tracing::debug!(
            "Session {} selected chat profile {} using model {}",
            self.id,
            profile.name,
            self.registry.resolve_model(&profile.name)
        );
        Self::send(
            tx,
            ChatEvent::Message(format!(
                "Starting chat with {} using the `{}` chat profile.",
                self.identity.identifier, profile.name
            )),
        );
        Self::send(
            tx,
            ChatEvent::Message("You can now start sending your messages.".to_string()),
        );

        Ok(())
    }

    /// Resume a recorded thread. The profile recorded on the thread wins
    /// over the one already selected. When neither is known the session
    /// goes back to profile selection.
    pub fn resume(&mut self, thread: &ThreadRecord, tx: &EventSender) -> Result<(), SessionError> {
        self.touch();
        let requested = thread
            .chat_profile
            .clone()
            .or_else(|| self.profile.as_ref().map(|p| p.name.clone()));

        let Some(name) = requested else {
            tracing::debug!("Session {} resumed without a chat profile", self.id);
            self.phase = Phase::ProfileSelection;
            Self::send(tx, ChatEvent::Message(SELECT_PROFILE_PROMPT.to_string()));
            return Ok(());
        };

        let profile = self.accessible(&name)?;
        self.transcript = Transcript::from_thread(&self.system_message, thread);
        self.profile = Some(profile);
        self.phase = Phase::Active;

        tracing::debug!(
            "Session {} resumed with {} messages",
            self.id,
            self.transcript.len()
        );
        Ok(())
    }

    /// Relay a user message to the completion API and stream the reply
    /// back over `tx`, returning the full reply.
    ///
    /// Nothing is added to the history when the message can't be sent
    /// (no profile, missing or unreadable file). Once the user message is
    /// in the history it stays there even if the completion fails, so
    /// the next message still has it as context.
    pub async fn relay(
        &mut self,
        text: &str,
        attachments: &mut dyn AttachmentSource,
        api: &dyn CompletionApi,
        tx: &EventSender,
    ) -> Result<String, RelayError> {
        self.touch();
        let profile = match (&self.phase, &self.profile) {
            (Phase::Active, Some(profile)) => profile.clone(),
            _ => return Err(RelayError::NoProfile),
        };

        let content = if mentions_file(text) {
            let attachment = attachments
                .request_attachment(FILE_PROMPT)
                .await?
                .ok_or(RelayError::NoFileUploaded)?;
            let file_text = attachment.read_text().await?;
            format!("{} file content:{}", text, file_text)
        } else {
            text.to_string()
        };

        let model = self.registry.resolve_model(&profile.name).to_string();
        self.transcript.push(Message::new(Role::User, &content));

        let mut stream = api
            .completion_stream(&model, self.transcript.messages(), self.max_tokens)
            .await
            .map_err(RelayError::Completion)?;

        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment.map_err(RelayError::Completion)?;
            if fragment.is_empty() {
                continue;
            }
            reply.push_str(&fragment);
            Self::send(tx, ChatEvent::Token(fragment));
        }

        self.transcript.push(Message::new(Role::Assistant, &reply));
        Self::send(tx, ChatEvent::Done(reply.clone()));

        Ok(reply)
    }

    /// Relay a message and report any failure to the user as a chat
    /// message instead of returning it.
    pub async fn handle_message(
        &mut self,
        text: &str,
        attachments: &mut dyn AttachmentSource,
        api: &dyn CompletionApi,
        tx: &EventSender,
    ) -> Option<String> {
        match self.relay(text, attachments, api, tx).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::error!("Relay failed for session {}: {}", self.id, e);
                Self::send(tx, ChatEvent::Error(format!("Error: {}", e)));
                None
            }
        }
    }
}

pub struct SessionBuilder {
    id: Option<String>,
    identity: Identity,
    profiles: Vec<ChatProfile>,
    registry: Arc<ProfileRegistry>,
    system_message: String,
    max_tokens: u32,
}

impl SessionBuilder {
    pub fn new(identity: Identity, registry: Arc<ProfileRegistry>) -> Self {
        Self {
            id: None,
            identity,
            profiles: Vec::new(),
            registry,
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn build(self) -> Session {
        let now = Utc::now();
        Session {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            identity: self.identity,
            profiles: self.profiles,
            profile: None,
            phase: Phase::ProfileSelection,
            transcript: Transcript::new(&self.system_message),
            registry: self.registry,
            system_message: self.system_message,
            max_tokens: self.max_tokens,
            created_at: now,
            last_active: now,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// The profiles the identity was resolved to
    pub fn profiles(mut self, profiles: Vec<ChatProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn system_message(mut self, system_message: &str) -> Self {
        self.system_message = system_message.to_string();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
