//! Body selection: encapsulated HTML first, escaped plain text otherwise.

use tracing::{debug, warn};

use crate::codepage;
use crate::error::{CodecError, Result};
use crate::model::message::Message;
use crate::rtf::{self, Encapsulated, Mode};

/// Where the materialized HTML came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodySource {
    /// HTML recovered from the compressed RTF body.
    RichTextHtml,
    /// Plain text recovered from the compressed RTF body.
    RichTextPlain,
    /// The message's plain-text body property.
    PlainText,
}

/// The body as a single HTML string, before image inlining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub html: String,
    pub source: BodySource,
}

/// Pick the best body representation of `message`.
///
/// A compressed RTF body that cannot be decompressed or de-encapsulated is
/// not an error: the plain-text body is used instead. A message with no body
/// at all yields an empty `<pre></pre>`.
pub fn materialize(message: &Message) -> Materialized {
    if let Some(blob) = message.compressed_rtf.as_deref() {
        match decode_rich_text(blob) {
            Ok(Encapsulated { mode: Mode::Html, text }) => {
                debug!(len = text.len(), "Using HTML encapsulated in RTF body");
                return Materialized {
                    html: text,
                    source: BodySource::RichTextHtml,
                };
            }
            Ok(Encapsulated { mode: Mode::Text, text }) => {
                debug!(len = text.len(), "Using plain text encapsulated in RTF body");
                return Materialized {
                    html: wrap_plain_text(&text),
                    source: BodySource::RichTextPlain,
                };
            }
            Err(e) => {
                warn!(error = %e, "RTF body unusable, falling back to plain-text body");
            }
        }
    }

    Materialized {
        html: wrap_plain_text(message.body.as_deref().unwrap_or_default()),
        source: BodySource::PlainText,
    }
}

/// Decompress and de-encapsulate a PidTagRtfCompressed payload.
pub fn decode_rich_text(blob: &[u8]) -> std::result::Result<Encapsulated, CodecError> {
    let rtf = rtf::decompress(blob)?;
    rtf::deencapsulate(&rtf, codepage::decode)
}

/// Raw RTF of the message body, or `None` when there is no RTF body.
pub fn decompressed_rtf(message: &Message) -> Result<Option<Vec<u8>>> {
    let Some(blob) = message.compressed_rtf.as_deref() else {
        return Ok(None);
    };
    Ok(Some(rtf::decompress(blob)?))
}

/// Escape text for HTML and wrap it in a preformatted block.
pub fn wrap_plain_text(text: &str) -> String {
    format!("<pre>{}</pre>", html_escape::encode_text(text))
}
