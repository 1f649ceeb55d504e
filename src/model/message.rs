//! The in-memory view of a parsed `.msg` file.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::Attachment;

/// Recipient role (PidTagRecipientType).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
    Other,
}

impl RecipientKind {
    /// Map the raw property value. The high bits carry flags and are ignored.
    pub fn from_raw(value: u32) -> Self {
        match value & 0x0F {
            1 => Self::To,
            2 => Self::Cc,
            3 => Self::Bcc,
            _ => Self::Other,
        }
    }
}

/// A single message recipient.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Recipient {
    #[serde(flatten)]
    pub address: EmailAddress,
    pub kind: RecipientKind,
}

/// A fully materialized message, as produced by the container reader.
///
/// The rendering pipeline only ever reads it.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Message {
    /// Message class, e.g. `IPM.Note`.
    pub message_class: Option<String>,

    /// Subject line.
    pub subject: Option<String>,

    /// Sender name and address.
    pub sender: EmailAddress,

    /// Recipients in storage order.
    pub recipients: Vec<Recipient>,

    /// Client submit time, falling back to delivery time.
    pub sent_at: Option<DateTime<Utc>>,

    /// Plain-text body.
    pub body: Option<String>,

    /// Compressed RTF body (PidTagRtfCompressed), still compressed.
    #[serde(skip)]
    pub compressed_rtf: Option<Bytes>,

    /// Attachments in storage order.
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Attachments whose content-id can be referenced from the body.
    pub fn inline_candidates(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.content_id.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::AttachMethod;

    #[test]
    fn test_recipient_kind_ignores_flags() {
        assert_eq!(RecipientKind::from_raw(0x1000_0001), RecipientKind::To);
        assert_eq!(RecipientKind::from_raw(2), RecipientKind::Cc);
        assert_eq!(RecipientKind::from_raw(0), RecipientKind::Other);
    }

    #[test]
    fn test_inline_candidates() {
        let mut msg = Message::default();
        for cid in [Some("a".to_string()), None] {
            msg.attachments.push(Attachment {
                content_id: cid,
                filename: None,
                mime_tag: None,
                method: AttachMethod::ByValue,
                hidden: true,
                content: Bytes::new(),
            });
        }
        assert_eq!(msg.inline_candidates().count(), 1);
    }
}
