//! JSON views of a parsed message.

use serde_json::{json, Value};

use crate::model::message::Message;
use crate::render::body::decode_rich_text;

/// Compact summary: sender, recipients, subject, plain body and the
/// de-encapsulated RTF body (`null` when absent or undecodable).
pub fn summary_json(message: &Message) -> Value {
    let rtf = message
        .compressed_rtf
        .as_deref()
        .and_then(|blob| match decode_rich_text(blob) {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(error = %e, "Could not decode RTF body for summary");
                None
            }
        });

    json!({
        "sender": {
            "name": message.sender.display_name,
            "email": message.sender.address,
        },
        "recipients": message.recipients,
        "subject": message.subject,
        "body": message.body,
        "rtf": rtf,
    })
}

/// The whole message model, including attachment metadata.
pub fn full_json(message: &Message) -> serde_json::Result<Value> {
    serde_json::to_value(message)
}
