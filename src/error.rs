//! Centralized error types for msghtml.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the msghtml library.
///
/// Only [`MsgError::InvalidContainer`] and I/O failures end a rendering run.
/// Codec failures are recovered inside the body materializer and image
/// resolution problems never surface as errors at all.
#[derive(Error, Debug)]
pub enum MsgError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("MSG file not found: {0}")]
    FileNotFound(PathBuf),

    /// The bytes are not a readable Outlook message container.
    #[error("Not a valid MSG container: {0}")]
    InvalidContainer(String),

    /// Compressed RTF or encapsulated body could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The materialized HTML could not be turned into a document tree.
    #[error("HTML document error: {0}")]
    Document(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    ExportError(String),
}

/// Failures of the rich-text decompressor and de-encapsulator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The compressed RTF header or payload is shorter than declared.
    #[error("Compressed RTF truncated: {0}")]
    Truncated(String),

    /// The compression type is neither `LZFu` nor `MELA`.
    #[error("Unknown compressed RTF type 0x{0:08X}")]
    UnknownCompression(u32),

    /// The payload checksum does not match the header.
    #[error("Compressed RTF CRC mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// The decompressed bytes are not an RTF document.
    #[error("Not an RTF document")]
    NotRtf,

    /// The RTF document does not carry an encapsulated HTML or text body.
    #[error("RTF body is not encapsulated HTML or text")]
    NotEncapsulated,
}

/// Convenience alias for `Result<T, MsgError>`.
pub type Result<T> = std::result::Result<T, MsgError>;

impl MsgError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Io { .. } | Self::FileNotFound(_) => "input",
            Self::InvalidContainer(_) => "container",
            Self::Codec(_) => "rich-text",
            Self::Document(_) => "document",
            Self::ExportError(_) => "export",
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `MsgError`
/// when no path context is available (rare, prefer `MsgError::io`).
impl From<std::io::Error> for MsgError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(MsgError::InvalidContainer("x".into()).stage(), "container");
        assert_eq!(MsgError::from(CodecError::NotRtf).stage(), "rich-text");
        assert_eq!(MsgError::FileNotFound("a.msg".into()).stage(), "input");
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::CrcMismatch {
            expected: 0xA7C7C5F1,
            actual: 0,
        };
        assert_eq!(
            err.to_string(),
            "Compressed RTF CRC mismatch: expected 0xA7C7C5F1, got 0x00000000"
        );
    }
}
