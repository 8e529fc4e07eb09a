use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub const ACCEPTED_MIME: &str = "text/plain";
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("{name} is {mime}, only {} files are accepted", ACCEPTED_MIME)]
    UnsupportedType { name: String, mime: String },

    #[error("{name} is {size} bytes, the limit is {} bytes", MAX_ATTACHMENT_BYTES)]
    TooLarge { name: String, size: u64 },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{name} is not valid UTF-8 text")]
    NotText { name: String },
}

#[derive(Clone, Debug)]
enum Content {
    Inline(Vec<u8>),
    File(PathBuf),
}

/// A file the user supplied alongside a message.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    content: Content,
}

impl Attachment {
    pub fn inline(name: &str, mime: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime: mime.to_string(),
            content: Content::Inline(bytes),
        }
    }

    /// Attach a file on disk. Only the extension is used to guess the
    /// type.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mime = match path.extension().and_then(|e| e.to_str()) {
            Some("txt") | Some("text") | Some("log") => ACCEPTED_MIME,
            _ => "application/octet-stream",
        };
        Self {
            name,
            mime: mime.to_string(),
            content: Content::File(path.to_path_buf()),
        }
    }

    async fn size(&self) -> Result<u64, AttachmentError> {
        match &self.content {
            Content::Inline(bytes) => Ok(bytes.len() as u64),
            Content::File(path) => Ok(tokio::fs::metadata(path).await?.len()),
        }
    }

    /// Read the full text content, rejecting anything that isn't plain
    /// text or is over the size limit.
    pub async fn read_text(&self) -> Result<String, AttachmentError> {
        // Ignore parameters like "; charset=utf-8"
        let essence = self.mime.split(';').next().unwrap_or_default().trim();
        if !essence.eq_ignore_ascii_case(ACCEPTED_MIME) {
            return Err(AttachmentError::UnsupportedType {
                name: self.name.clone(),
                mime: self.mime.clone(),
            });
        }

        let size = self.size().await?;
        if size > MAX_ATTACHMENT_BYTES {
            return Err(AttachmentError::TooLarge {
                name: self.name.clone(),
                size,
            });
        }

        let bytes = match &self.content {
            Content::Inline(bytes) => bytes.clone(),
            Content::File(path) => tokio::fs::read(path).await?,
        };

        String::from_utf8(bytes).map_err(|_| AttachmentError::NotText {
            name: self.name.clone(),
        })
    }
}

/// Where a session gets a file from when a message asks for one.
/// Returning `None` means the user didn't supply a file.
#[async_trait]
pub trait AttachmentSource: Send {
    async fn request_attachment(&mut self, prompt: &str)
    -> Result<Option<Attachment>, AttachmentError>;
}

/// An attachment that arrived with the request, handed over at most once.
#[async_trait]
impl AttachmentSource for Option<Attachment> {
    async fn request_attachment(
        &mut self,
        _prompt: &str,
    ) -> Result<Option<Attachment>, AttachmentError> {
        Ok(self.take())
    }
}

/// For callers that can never supply a file.
pub struct NoAttachment;

#[async_trait]
impl AttachmentSource for NoAttachment {
    async fn request_attachment(
        &mut self,
        _prompt: &str,
    ) -> Result<Option<Attachment>, AttachmentError> {
        Ok(None)
    }
}
