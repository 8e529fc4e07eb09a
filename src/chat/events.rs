use serde::Serialize;
use tokio::sync::mpsc;

/// What a session shows the user. Tokens build up the in-progress reply
/// and `Done` carries the finished reply.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ChatEvent {
    Message(String),
    Token(String),
    Done(String),
    Error(String),
}

pub type EventSender = mpsc::UnboundedSender<ChatEvent>;
