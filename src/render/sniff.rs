//! Binary image type detection.

/// Detects the media type of an attachment payload from its leading bytes.
///
/// Implementations must be cheap to share across worker threads; the
/// renderer calls `detect` from blocking tasks.
pub trait ImageSniffer: Send + Sync {
    /// Return the image MIME type, or `None` if the bytes are not a
    /// recognizable image.
    fn detect(&self, data: &[u8]) -> Option<String>;
}

/// Magic-number sniffer backed by `infer`.
///
/// Only image signatures count; a PDF or ZIP payload yields `None` so that it
/// is never inlined as an image.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureSniffer;

impl ImageSniffer for SignatureSniffer {
    fn detect(&self, data: &[u8]) -> Option<String> {
        infer::get(data)
            .filter(|kind| matches!(kind.matcher_type(), infer::MatcherType::Image))
            .map(|kind| kind.mime_type().to_string())
    }
}
