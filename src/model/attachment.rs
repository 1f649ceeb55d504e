//! Attachment records.
//!
//! The binary payload is held as [`Bytes`] so the image resolver can hand
//! cheap clones to worker tasks without copying.

use bytes::Bytes;

/// How an attachment is stored inside the message (PidTagAttachMethod).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachMethod {
    /// No attachment data.
    None,
    /// Binary data stored in the message (`ATTACH_BY_VALUE`).
    ByValue,
    /// A path reference to a file outside the message.
    ByReference,
    /// An embedded message stored as a sub-storage.
    EmbeddedMessage,
    /// An OLE object.
    Ole,
    /// Any other method value.
    Other(u32),
}

impl AttachMethod {
    /// Map the raw PidTagAttachMethod value.
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::None,
            1 => Self::ByValue,
            2 | 4 => Self::ByReference,
            5 => Self::EmbeddedMessage,
            6 => Self::Ole,
            other => Self::Other(other),
        }
    }
}

/// A single attachment of a message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Attachment {
    /// Content-ID used by `cid:` references in the HTML body, without angle brackets.
    pub content_id: Option<String>,

    /// Best available filename (long filename, short filename, then display name).
    pub filename: Option<String>,

    /// MIME type declared by the sender. Not trusted for inlining.
    pub mime_tag: Option<String>,

    /// Storage method.
    pub method: AttachMethod,

    /// Hidden attachments are usually inline images of the HTML body.
    pub hidden: bool,

    /// Raw binary content. Empty for embedded messages.
    #[serde(skip)]
    pub content: Bytes,
}

impl Attachment {
    /// Size of the binary content in bytes.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Filename to use when the attachment is written to disk.
    pub fn display_name(&self, index: usize) -> String {
        self.filename
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("attachment_{index}"))
    }
}
