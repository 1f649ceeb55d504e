//! Content-id lookup over a message's attachments.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::model::message::Message;

/// Maps content-ids to attachment payloads.
///
/// Content-ids are assumed unique per message; when they are not, the first
/// attachment in storage order wins and later duplicates are ignored.
#[derive(Debug, Default, Clone)]
pub struct AttachmentIndex {
    by_content_id: HashMap<String, Bytes>,
}

impl AttachmentIndex {
    /// Index every attachment that carries a content-id.
    pub fn from_message(message: &Message) -> Self {
        let mut by_content_id = HashMap::new();
        for attachment in message.inline_candidates() {
            let Some(cid) = attachment.content_id.as_ref() else {
                continue;
            };
            if by_content_id.contains_key(cid) {
                debug!(content_id = %cid, "Duplicate content-id, keeping the first attachment");
                continue;
            }
            by_content_id.insert(cid.clone(), attachment.content.clone());
        }
        Self { by_content_id }
    }

    /// Payload of the attachment with this content-id.
    pub fn get(&self, content_id: &str) -> Option<&Bytes> {
        self.by_content_id.get(content_id)
    }

    pub fn len(&self) -> usize {
        self.by_content_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_content_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::{AttachMethod, Attachment};

    fn attachment(cid: Option<&str>, content: &'static [u8]) -> Attachment {
        Attachment {
            content_id: cid.map(String::from),
            filename: None,
            mime_tag: None,
            method: AttachMethod::ByValue,
            hidden: true,
            content: Bytes::from_static(content),
        }
    }

    #[test]
    fn test_index_skips_attachments_without_cid() {
        let mut msg = Message::default();
        msg.attachments.push(attachment(None, b"x"));
        msg.attachments.push(attachment(Some("a"), b"A"));
        let index = AttachmentIndex::from_message(&msg);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").map(|b| b.as_ref()), Some(&b"A"[..]));
        assert!(index.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_cid_first_wins() {
        let mut msg = Message::default();
        msg.attachments.push(attachment(Some("dup"), b"first"));
        msg.attachments.push(attachment(Some("dup"), b"second"));
        let index = AttachmentIndex::from_message(&msg);
        assert_eq!(index.get("dup").map(|b| b.as_ref()), Some(&b"first"[..]));
    }
}
