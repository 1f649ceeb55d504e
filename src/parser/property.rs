//! MAPI property plumbing for `.msg` files (MS-OXMSG).
//!
//! Variable-length properties live in their own streams named
//! `__substg1.0_<ID><TYPE>`. Fixed-width properties are packed into the
//! `__properties_version1.0` stream of each storage as 16-byte entries after a
//! header whose size depends on the storage kind.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};

use crate::codepage;

/// Name of the fixed-width property stream in every storage.
pub const PROPERTIES_STREAM: &str = "__properties_version1.0";
/// Prefix of recipient sub-storages.
pub const RECIPIENT_PREFIX: &str = "__recip_version1.0_#";
/// Prefix of attachment sub-storages.
pub const ATTACHMENT_PREFIX: &str = "__attach_version1.0_#";

/// Header size of the property stream at the message root.
pub const ROOT_HEADER_LEN: usize = 32;
/// Header size of the property stream in recipient and attachment storages.
pub const CHILD_HEADER_LEN: usize = 8;

const ENTRY_LEN: usize = 16;

/// Property types (low 16 bits of a property tag).
pub mod kind {
    pub const INTEGER32: u16 = 0x0003;
    pub const BOOLEAN: u16 = 0x000B;
    pub const STRING8: u16 = 0x001E;
    pub const UNICODE: u16 = 0x001F;
    pub const TIME: u16 = 0x0040;
    pub const BINARY: u16 = 0x0102;
}

/// Property identifiers (high 16 bits of a property tag).
pub mod id {
    pub const MESSAGE_CLASS: u16 = 0x001A;
    pub const SUBJECT: u16 = 0x0037;
    pub const CLIENT_SUBMIT_TIME: u16 = 0x0039;
    pub const SENDER_NAME: u16 = 0x0C1A;
    pub const SENDER_EMAIL_ADDRESS: u16 = 0x0C1F;
    pub const RECIPIENT_TYPE: u16 = 0x0C15;
    pub const MESSAGE_DELIVERY_TIME: u16 = 0x0E06;
    pub const BODY: u16 = 0x1000;
    pub const RTF_COMPRESSED: u16 = 0x1009;
    pub const DISPLAY_NAME: u16 = 0x3001;
    pub const EMAIL_ADDRESS: u16 = 0x3003;
    pub const ATTACH_DATA: u16 = 0x3701;
    pub const ATTACH_FILENAME: u16 = 0x3704;
    pub const ATTACH_METHOD: u16 = 0x3705;
    pub const ATTACH_LONG_FILENAME: u16 = 0x3707;
    pub const ATTACH_MIME_TAG: u16 = 0x370E;
    pub const ATTACH_CONTENT_ID: u16 = 0x3712;
    pub const SMTP_ADDRESS: u16 = 0x39FE;
    pub const INTERNET_CODEPAGE: u16 = 0x3FDE;
    pub const MESSAGE_CODEPAGE: u16 = 0x3FFD;
    pub const SENDER_SMTP_ADDRESS: u16 = 0x5D01;
    pub const ATTACHMENT_HIDDEN: u16 = 0x7FFE;
}

/// Stream name of a variable-length property.
pub fn stream_name(id: u16, kind: u16) -> String {
    format!("__substg1.0_{id:04X}{kind:04X}")
}

/// Fixed-width property values of one storage, keyed by property id.
#[derive(Debug, Default, Clone)]
pub struct FixedProperties {
    values: HashMap<u16, (u16, [u8; 8])>,
}

impl FixedProperties {
    /// Decode a `__properties_version1.0` stream.
    ///
    /// Trailing bytes that do not form a whole entry are ignored.
    pub fn parse(stream: &[u8], header_len: usize) -> Self {
        let mut values = HashMap::new();
        let body = stream.get(header_len..).unwrap_or_default();
        for entry in body.chunks_exact(ENTRY_LEN) {
            let tag = LittleEndian::read_u32(&entry[0..4]);
            let kind = (tag & 0xFFFF) as u16;
            let id = (tag >> 16) as u16;
            let mut value = [0u8; 8];
            value.copy_from_slice(&entry[8..16]);
            values.insert(id, (kind, value));
        }
        Self { values }
    }

    /// Number of decoded entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the stream held no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A 32-bit integer property.
    pub fn u32(&self, id: u16) -> Option<u32> {
        match self.values.get(&id) {
            Some((kind::INTEGER32, value)) => Some(LittleEndian::read_u32(&value[..4])),
            _ => None,
        }
    }

    /// A boolean property.
    pub fn bool(&self, id: u16) -> Option<bool> {
        match self.values.get(&id) {
            Some((kind::BOOLEAN, value)) => Some(value[0] != 0),
            _ => None,
        }
    }

    /// A FILETIME property.
    pub fn time(&self, id: u16) -> Option<DateTime<Utc>> {
        match self.values.get(&id) {
            Some((kind::TIME, value)) => filetime_to_datetime(LittleEndian::read_u64(value)),
            _ => None,
        }
    }
}

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;

/// Convert a Windows FILETIME (100 ns ticks since 1601) to UTC.
///
/// Zero means "not set" in MAPI and maps to `None`.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    if filetime == 0 {
        return None;
    }
    let secs = i64::try_from(filetime / 10_000_000).ok()? - FILETIME_UNIX_OFFSET;
    let nanos = (filetime % 10_000_000) as u32 * 100;
    DateTime::from_timestamp(secs, nanos)
}

/// Decode a `PT_UNICODE` stream (UTF-16LE, optionally NUL terminated).
pub fn decode_unicode(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16_lossy(&units);
    text.trim_end_matches('\0').to_string()
}

/// Decode a `PT_STRING8` stream in the message code page.
pub fn decode_string8(bytes: &[u8], codepage: u16) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    codepage::decode(&bytes[..end], codepage)
}
