//! Per-conversation session lifecycle: profile selection, history,
//! resuming recorded threads, and relaying messages to the completion
//! API.

mod attachment;
mod events;
mod models;
mod session;

pub use attachment::{
    ACCEPTED_MIME, Attachment, AttachmentError, AttachmentSource, MAX_ATTACHMENT_BYTES,
    NoAttachment,
};
pub use events::{ChatEvent, EventSender};
pub use models::{ThreadRecord, ThreadStep, Transcript};
pub use session::{Phase, RelayError, Session, SessionBuilder, SessionError, mentions_file};
