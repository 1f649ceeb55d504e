//! Resolution of `cid:` image references into `data:` URIs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use super::index::AttachmentIndex;
use super::sniff::ImageSniffer;

/// URL scheme of content-id references (RFC 2392), matched case-insensitively.
pub const CID_SCHEME: &str = "cid:";

/// Outcome of resolving one image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Replace the element's `src` with this `data:` URI.
    Inline(String),
    /// Leave the element exactly as found.
    Skip(SkipReason),
}

/// Why an image element was left unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The `src` is not a `cid:` reference (or there is no `src`).
    NotReference,
    /// No attachment carries the referenced content-id.
    MissingAttachment,
    /// The attachment payload is not a recognizable image.
    UnknownType,
    /// Resolution exceeded the per-image time limit.
    TimedOut,
    /// The resolution task failed (e.g. the sniffer panicked).
    Failed(String),
}

impl Resolution {
    /// The replacement `src`, if the element should be rewritten.
    pub fn into_data_uri(self) -> Option<String> {
        match self {
            Self::Inline(uri) => Some(uri),
            Self::Skip(_) => None,
        }
    }
}

/// Extract the content-id from a `cid:` reference.
pub fn content_id_of(src: &str) -> Option<&str> {
    let src = src.trim();
    let scheme = src.get(..CID_SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(CID_SCHEME) {
        return None;
    }
    let cid = &src[CID_SCHEME.len()..];
    (!cid.is_empty()).then_some(cid)
}

/// Resolve a single image `src` against the attachment index.
///
/// Never fails: every problem becomes a [`Resolution::Skip`].
pub fn resolve(src: &str, index: &AttachmentIndex, sniffer: &dyn ImageSniffer) -> Resolution {
    let Some(cid) = content_id_of(src) else {
        return Resolution::Skip(SkipReason::NotReference);
    };

    let Some(content) = index.get(cid) else {
        debug!(content_id = cid, "No attachment for content-id, leaving image unchanged");
        return Resolution::Skip(SkipReason::MissingAttachment);
    };

    let Some(mime) = sniffer.detect(content) else {
        debug!(
            content_id = cid,
            size = content.len(),
            "Attachment is not a recognizable image, leaving image unchanged"
        );
        return Resolution::Skip(SkipReason::UnknownType);
    };

    debug!(content_id = cid, mime = %mime, size = content.len(), "Inlining image");
    Resolution::Inline(data_uri(&mime, content))
}

/// Build a `data:<mime>;base64,<payload>` URI.
pub fn data_uri(mime: &str, content: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attachment::{AttachMethod, Attachment};
    use crate::model::message::Message;
    use crate::render::sniff::SignatureSniffer;
    use bytes::Bytes;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";

    fn index_with(cid: &str, content: &'static [u8]) -> AttachmentIndex {
        let mut msg = Message::default();
        msg.attachments.push(Attachment {
            content_id: Some(cid.to_string()),
            filename: Some("image001.png".into()),
            mime_tag: Some("image/jpeg".into()),
            method: AttachMethod::ByValue,
            hidden: true,
            content: Bytes::from_static(content),
        });
        AttachmentIndex::from_message(&msg)
    }

    #[test]
    fn test_content_id_of() {
        assert_eq!(content_id_of("cid:image001.png@01D0"), Some("image001.png@01D0"));
        assert_eq!(content_id_of("CID:abc"), Some("abc"));
        assert_eq!(content_id_of("http://example.com/a.png"), None);
        assert_eq!(content_id_of("cid:"), None);
        assert_eq!(content_id_of("ci"), None);
    }

    #[test]
    fn test_resolve_png_exact_uri() {
        let index = index_with("logo", PNG);
        let expected = format!("data:image/png;base64,{}", STANDARD.encode(PNG));
        assert_eq!(
            resolve("cid:logo", &index, &SignatureSniffer),
            Resolution::Inline(expected)
        );
    }

    #[test]
    fn test_declared_mime_tag_is_not_trusted() {
        let index = index_with("logo", PNG);
        let uri = resolve("cid:logo", &index, &SignatureSniffer)
            .into_data_uri()
            .unwrap();
        assert!(uri.starts_with("data:image/png;"));
    }

    #[test]
    fn test_non_reference_is_noop() {
        let index = index_with("logo", PNG);
        assert_eq!(
            resolve("https://example.com/logo.png", &index, &SignatureSniffer),
            Resolution::Skip(SkipReason::NotReference)
        );
    }

    #[test]
    fn test_missing_attachment() {
        let index = index_with("logo", PNG);
        assert_eq!(
            resolve("cid:other", &index, &SignatureSniffer),
            Resolution::Skip(SkipReason::MissingAttachment)
        );
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        let index = index_with("doc", b"%PDF-1.4 not an image");
        assert_eq!(
            resolve("cid:doc", &index, &SignatureSniffer),
            Resolution::Skip(SkipReason::UnknownType)
        );
    }
}
