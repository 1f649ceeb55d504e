//! List and extract message attachments.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::MsgError;
use crate::model::attachment::{AttachMethod, Attachment};
use crate::model::message::Message;
use crate::render::ImageSniffer;

use super::{output_path, sanitize_filename_part};

/// One row of an attachment listing.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentInfo {
    pub index: usize,
    pub name: String,
    pub content_id: Option<String>,
    /// Type declared in the message.
    pub declared_type: Option<String>,
    /// Image type detected from the content, if it is an image.
    pub detected_type: Option<String>,
    pub method: AttachMethod,
    pub hidden: bool,
    pub size: u64,
}

/// Describe every attachment of `message` in storage order.
pub fn describe_attachments(message: &Message, sniffer: &dyn ImageSniffer) -> Vec<AttachmentInfo> {
    message
        .attachments
        .iter()
        .enumerate()
        .map(|(index, att)| AttachmentInfo {
            index,
            name: att.display_name(index),
            content_id: att.content_id.clone(),
            declared_type: att.mime_tag.clone(),
            detected_type: sniffer.detect(&att.content),
            method: att.method,
            hidden: att.hidden,
            size: att.size(),
        })
        .collect()
}

/// Write a single attachment to `output_dir`.
pub fn export_attachment(
    attachment: &Attachment,
    index: usize,
    output_dir: &Path,
    overwrite: bool,
) -> anyhow::Result<PathBuf> {
    let filename = sanitize_filename_part(&attachment.display_name(index), 150);
    let path = output_path(output_dir, &filename, overwrite);
    std::fs::write(&path, &attachment.content).map_err(|e| MsgError::io(&path, e))?;
    Ok(path)
}

/// Extract every attachment with binary content into `output_dir`.
///
/// Embedded messages and references carry no payload and are skipped.
pub fn export_attachments(
    message: &Message,
    output_dir: &Path,
    overwrite: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| MsgError::io(output_dir, e))?;
    let mut paths = Vec::new();

    for (index, att) in message.attachments.iter().enumerate() {
        if att.content.is_empty() {
            tracing::warn!(
                index,
                method = ?att.method,
                name = %att.display_name(index),
                "Attachment has no binary content, skipping"
            );
            continue;
        }
        paths.push(export_attachment(att, index, output_dir, overwrite)?);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SignatureSniffer;
    use bytes::Bytes;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";

    fn attachment(name: Option<&str>, method: AttachMethod, content: &'static [u8]) -> Attachment {
        Attachment {
            content_id: None,
            filename: name.map(String::from),
            mime_tag: Some("application/octet-stream".into()),
            method,
            hidden: false,
            content: Bytes::from_static(content),
        }
    }

    fn sample() -> Message {
        Message {
            attachments: vec![
                attachment(Some("logo.png"), AttachMethod::ByValue, PNG),
                attachment(Some("fwd.msg"), AttachMethod::EmbeddedMessage, b""),
                attachment(None, AttachMethod::ByValue, b"notes"),
            ],
            ..Message::default()
        }
    }

    #[test]
    fn test_describe_detects_type() {
        let rows = describe_attachments(&sample(), &SignatureSniffer);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].detected_type.as_deref(), Some("image/png"));
        assert_eq!(rows[0].declared_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(rows[2].name, "attachment_2");
        assert_eq!(rows[2].detected_type, None);
    }

    #[test]
    fn test_export_skips_empty_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let paths = export_attachments(&sample(), dir.path(), false).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read(dir.path().join("logo.png")).unwrap(), PNG);
        assert_eq!(std::fs::read(dir.path().join("attachment_2")).unwrap(), b"notes");
    }
}
