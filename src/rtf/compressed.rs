//! Compressed RTF decoding (MS-OXRTFCP).
//!
//! Outlook stores the rich-text body as a small LZ77 variant called `LZFu`,
//! or occasionally uncompressed behind a `MELA` header. The layout is:
//!
//! ```text
//! u32 LE  compressed size (header bytes after this field + payload)
//! u32 LE  raw (decompressed) size
//! u32 LE  compression type: "LZFu" or "MELA"
//! u32 LE  CRC-32 of the payload (LZFu only)
//! ...     payload
//! ```

use byteorder::{ByteOrder, LittleEndian};

use crate::error::CodecError;

/// `"LZFu"` read as a little-endian u32.
const COMPRESSED: u32 = 0x7546_5A4C;
/// `"MELA"` read as a little-endian u32.
const UNCOMPRESSED: u32 = 0x414C_454D;

const HEADER_LEN: usize = 16;
const DICT_SIZE: usize = 4096;
const MAX_EXPANSION: usize = 9;

/// Dictionary prefix every compressed stream starts with.
const PREBUF: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}{\\f0\\fnil \\froman \
\\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArialTimes New RomanCourier\
{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

/// Decompress a PidTagRtfCompressed blob into raw RTF bytes.
pub fn decompress(blob: &[u8]) -> Result<Vec<u8>, CodecError> {
    if blob.len() < HEADER_LEN {
        return Err(CodecError::Truncated(format!(
            "header needs {HEADER_LEN} bytes, got {}",
            blob.len()
        )));
    }

    let comp_size = LittleEndian::read_u32(&blob[0..4]) as usize;
    let raw_size = LittleEndian::read_u32(&blob[4..8]) as usize;
    let comp_type = LittleEndian::read_u32(&blob[8..12]);
    let crc = LittleEndian::read_u32(&blob[12..16]);

    // The size field does not count itself.
    let end = comp_size.saturating_add(4);
    if end < HEADER_LEN || end > blob.len() {
        return Err(CodecError::Truncated(format!(
            "declared {} bytes, have {}",
            end,
            blob.len()
        )));
    }
    let payload = &blob[HEADER_LEN..end];

    match comp_type {
        UNCOMPRESSED => {
            let len = raw_size.min(payload.len());
            Ok(payload[..len].to_vec())
        }
        COMPRESSED => {
            let actual = crc32(payload);
            if actual != crc {
                return Err(CodecError::CrcMismatch {
                    expected: crc,
                    actual,
                });
            }
            let mut out = lzfu(payload, raw_size);
            out.truncate(raw_size);
            Ok(out)
        }
        other => Err(CodecError::UnknownCompression(other)),
    }
}

/// Run the LZFu decoder over the payload.
///
/// A payload that ends without the end-of-stream reference simply stops;
/// whatever was decoded so far is returned.
fn lzfu(payload: &[u8], raw_size: usize) -> Vec<u8> {
    let mut dict = [0u8; DICT_SIZE];
    dict[..PREBUF.len()].copy_from_slice(PREBUF);
    let mut write = PREBUF.len();

    // One control byte covers at most eight 17-byte runs, so the payload
    // bounds the output whatever the header claims.
    let mut out = Vec::with_capacity(raw_size.min(payload.len().saturating_mul(MAX_EXPANSION)));
    let mut pos = 0;

    while pos < payload.len() {
        let control = payload[pos];
        pos += 1;

        for bit in 0..8 {
            if pos >= payload.len() {
                return out;
            }

            if control & (1 << bit) == 0 {
                let byte = payload[pos];
                pos += 1;
                out.push(byte);
                dict[write] = byte;
                write = (write + 1) % DICT_SIZE;
                continue;
            }

            if pos + 1 >= payload.len() {
                return out;
            }
            let reference = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
            pos += 2;

            let offset = usize::from(reference >> 4);
            let length = usize::from(reference & 0x0F) + 2;
            if offset == write {
                return out;
            }

            // Byte by byte: the run may overlap the bytes it is producing.
            for i in 0..length {
                let byte = dict[(offset + i) % DICT_SIZE];
                out.push(byte);
                dict[write] = byte;
                write = (write + 1) % DICT_SIZE;
            }
        }
    }

    out
}

/// CRC-32 as used by MS-OXRTFCP: standard polynomial, initial value 0,
/// no final inversion.
fn crc32(data: &[u8]) -> u32 {
    let table = crc_table();
    data.iter().fold(0u32, |crc, &byte| {
        table[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}

fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (n, slot) in table.iter_mut().enumerate() {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
        }
        *slot = c;
    }
    table
}

/// Wrap raw RTF in an uncompressed (`MELA`) container.
///
/// Outlook accepts this form for PidTagRtfCompressed; it is mostly useful for
/// building test messages.
pub fn wrap_uncompressed(rtf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rtf.len() + HEADER_LEN);
    out.extend_from_slice(&((rtf.len() + 12) as u32).to_le_bytes());
    out.extend_from_slice(&(rtf.len() as u32).to_le_bytes());
    out.extend_from_slice(&UNCOMPRESSED.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(rtf);
    out
}
