//! The core models for managing a stateful chat with an LLM.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::openai::{Message, Role};

/// Chat history replayed as context on every completion request. The
/// first message is always the system instruction and messages are only
/// ever appended.
#[derive(Clone, Serialize, Debug, Default, PartialEq)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new(system_message: &str) -> Self {
        Self(vec![Message::new(Role::System, system_message)])
    }

    /// Rebuild a transcript from a recorded thread. Only top level steps
    /// are replayed, nested steps (tool runs, intermediate output) are
    /// not part of the conversation.
    pub fn from_thread(system_message: &str, thread: &ThreadRecord) -> Self {
        let mut transcript = Self::new(system_message);
        for step in thread.steps.iter().filter(|s| s.is_top_level()) {
            transcript.push(Message::new(step.role(), step.output.as_deref().unwrap_or("")));
        }
        transcript
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }
}

// {
//     "steps": [
//         {"id": "s1", "parentId": null, "type": "user_message", "output": "hi"},
//         {"id": "s2", "parentId": null, "type": "assistant_message", "output": "hello"},
//         {"id": "s3", "parentId": "s2", "type": "llm", "output": "..."}
//     ]
// }
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ThreadStep {
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<Value>,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub output: Option<String>,
}

impl ThreadStep {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn role(&self) -> Role {
        if self.step_type == "user_message" {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

/// A previously recorded conversation handed back when a chat is
/// resumed.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct ThreadRecord {
    #[serde(default)]
    pub steps: Vec<ThreadStep>,
    /// The profile the thread was recorded with, if known
    #[serde(default)]
    pub chat_profile: Option<String>,
}
