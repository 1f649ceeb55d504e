//! Outlook `.msg` reader: OLE compound file → [`Message`].

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use cfb::CompoundFile;
use tracing::debug;

use crate::codepage::DEFAULT_CODEPAGE;
use crate::error::{MsgError, Result};
use crate::model::address::EmailAddress;
use crate::model::attachment::{AttachMethod, Attachment};
use crate::model::message::{Message, Recipient, RecipientKind};

use super::property::{
    decode_string8, decode_unicode, id, kind, stream_name, FixedProperties, ATTACHMENT_PREFIX,
    CHILD_HEADER_LEN, PROPERTIES_STREAM, RECIPIENT_PREFIX, ROOT_HEADER_LEN,
};

/// Read and parse a `.msg` file from disk.
pub fn open_msg(path: impl AsRef<Path>) -> Result<Message> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MsgError::FileNotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|e| MsgError::io(path, e))?;
    debug!(path = %path.display(), size = bytes.len(), "Read MSG file");
    parse_msg(&bytes)
}

/// Parse an in-memory `.msg` file.
///
/// Fails with [`MsgError::InvalidContainer`] when the bytes are not a
/// compound file or lack the message property stream.
pub fn parse_msg(bytes: &[u8]) -> Result<Message> {
    let cf = CompoundFile::open(Cursor::new(bytes))
        .map_err(|e| MsgError::InvalidContainer(e.to_string()))?;
    let mut reader = MsgReader { cf };

    let root = PathBuf::from("/");
    let props = reader
        .fixed(&root, ROOT_HEADER_LEN)?
        .ok_or_else(|| MsgError::InvalidContainer(format!("missing {PROPERTIES_STREAM}")))?;

    let codepage = props
        .u32(id::INTERNET_CODEPAGE)
        .or_else(|| props.u32(id::MESSAGE_CODEPAGE))
        .and_then(|cp| u16::try_from(cp).ok())
        .unwrap_or(DEFAULT_CODEPAGE);

    let sender_address = match reader.string(&root, id::SENDER_SMTP_ADDRESS, codepage)? {
        Some(smtp) => Some(smtp),
        None => reader.string(&root, id::SENDER_EMAIL_ADDRESS, codepage)?,
    };
    let sender = EmailAddress::new(reader.string(&root, id::SENDER_NAME, codepage)?, sender_address);

    let mut recipients = Vec::new();
    for storage in reader.children(&root, RECIPIENT_PREFIX)? {
        recipients.push(reader.recipient(&storage, codepage)?);
    }

    let mut attachments = Vec::new();
    for storage in reader.children(&root, ATTACHMENT_PREFIX)? {
        attachments.push(reader.attachment(&storage, codepage)?);
    }

    let message = Message {
        message_class: reader.string(&root, id::MESSAGE_CLASS, codepage)?,
        subject: reader.string(&root, id::SUBJECT, codepage)?,
        sender,
        recipients,
        sent_at: props
            .time(id::CLIENT_SUBMIT_TIME)
            .or_else(|| props.time(id::MESSAGE_DELIVERY_TIME)),
        body: reader.string(&root, id::BODY, codepage)?,
        compressed_rtf: reader.binary(&root, id::RTF_COMPRESSED)?.map(Bytes::from),
        attachments,
    };

    debug!(
        subject = message.subject.as_deref().unwrap_or(""),
        recipients = message.recipients.len(),
        attachments = message.attachments.len(),
        has_rtf = message.compressed_rtf.is_some(),
        "Parsed MSG"
    );

    Ok(message)
}

struct MsgReader<'b> {
    cf: CompoundFile<Cursor<&'b [u8]>>,
}

impl MsgReader<'_> {
    fn recipient(&mut self, storage: &Path, codepage: u16) -> Result<Recipient> {
        let props = self.fixed(storage, CHILD_HEADER_LEN)?.unwrap_or_default();
        let address = match self.string(storage, id::SMTP_ADDRESS, codepage)? {
            Some(smtp) => Some(smtp),
            None => self.string(storage, id::EMAIL_ADDRESS, codepage)?,
        };
        Ok(Recipient {
            address: EmailAddress::new(self.string(storage, id::DISPLAY_NAME, codepage)?, address),
            kind: props
                .u32(id::RECIPIENT_TYPE)
                .map_or(RecipientKind::To, RecipientKind::from_raw),
        })
    }

    fn attachment(&mut self, storage: &Path, codepage: u16) -> Result<Attachment> {
        let props = self.fixed(storage, CHILD_HEADER_LEN)?.unwrap_or_default();

        let mut filename = None;
        for property in [id::ATTACH_LONG_FILENAME, id::ATTACH_FILENAME, id::DISPLAY_NAME] {
            filename = self
                .string(storage, property, codepage)?
                .filter(|name| !name.trim().is_empty());
            if filename.is_some() {
                break;
            }
        }

        let content_id = self
            .string(storage, id::ATTACH_CONTENT_ID, codepage)?
            .map(|cid| normalize_content_id(&cid))
            .filter(|cid| !cid.is_empty());

        // Embedded messages keep their data as a sub-storage, so this is None.
        let content = self
            .binary(storage, id::ATTACH_DATA)?
            .map(Bytes::from)
            .unwrap_or_default();

        Ok(Attachment {
            content_id,
            filename,
            mime_tag: self.string(storage, id::ATTACH_MIME_TAG, codepage)?,
            method: props
                .u32(id::ATTACH_METHOD)
                .map_or(AttachMethod::ByValue, AttachMethod::from_raw),
            hidden: props.bool(id::ATTACHMENT_HIDDEN).unwrap_or(false),
            content,
        })
    }

    /// Sub-storages of `storage` whose name starts with `prefix`, in name order.
    fn children(&self, storage: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        let entries = self
            .cf
            .read_storage(storage)
            .map_err(|e| corrupt(storage, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter(|entry| entry.is_storage() && entry.name().starts_with(prefix))
            .map(|entry| entry.path().to_path_buf())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn fixed(&mut self, storage: &Path, header_len: usize) -> Result<Option<FixedProperties>> {
        let stream = self.stream(&storage.join(PROPERTIES_STREAM))?;
        Ok(stream.map(|bytes| FixedProperties::parse(&bytes, header_len)))
    }

    /// A string property, preferring the Unicode stream over the 8-bit one.
    fn string(&mut self, storage: &Path, property: u16, codepage: u16) -> Result<Option<String>> {
        if let Some(bytes) = self.stream(&storage.join(stream_name(property, kind::UNICODE)))? {
            return Ok(Some(decode_unicode(&bytes)));
        }
        let string8 = self.stream(&storage.join(stream_name(property, kind::STRING8)))?;
        Ok(string8.map(|bytes| decode_string8(&bytes, codepage)))
    }

    fn binary(&mut self, storage: &Path, property: u16) -> Result<Option<Vec<u8>>> {
        self.stream(&storage.join(stream_name(property, kind::BINARY)))
    }

    fn stream(&mut self, path: &Path) -> Result<Option<Vec<u8>>> {
        if !self.cf.is_stream(path) {
            return Ok(None);
        }
        let mut stream = self.cf.open_stream(path).map_err(|e| corrupt(path, e))?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).map_err(|e| corrupt(path, e))?;
        Ok(Some(buf))
    }
}

fn corrupt(path: &Path, err: std::io::Error) -> MsgError {
    MsgError::InvalidContainer(format!("{}: {err}", path.display()))
}

/// Strip whitespace and the `<...>` wrapping some clients store.
fn normalize_content_id(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
