//! Windows code page and RTF font charset mapping onto `encoding_rs`.

use encoding_rs::Encoding;

/// Code page used when nothing better is known.
pub const DEFAULT_CODEPAGE: u16 = 1252;

/// Look up the `encoding_rs` encoding for a Windows code page number.
pub fn encoding_for(codepage: u16) -> Option<&'static Encoding> {
    let encoding = match codepage {
        437 | 850 | 20127 | 28591 | 1252 => encoding_rs::WINDOWS_1252,
        866 => encoding_rs::IBM866,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1200 => encoding_rs::UTF_16LE,
        1201 => encoding_rs::UTF_16BE,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        10007 => encoding_rs::X_MAC_CYRILLIC,
        20866 => encoding_rs::KOI8_R,
        21866 => encoding_rs::KOI8_U,
        28592 => encoding_rs::ISO_8859_2,
        28593 => encoding_rs::ISO_8859_3,
        28594 => encoding_rs::ISO_8859_4,
        28595 => encoding_rs::ISO_8859_5,
        28596 => encoding_rs::ISO_8859_6,
        28597 => encoding_rs::ISO_8859_7,
        28598 => encoding_rs::ISO_8859_8,
        28603 => encoding_rs::ISO_8859_13,
        28605 => encoding_rs::ISO_8859_15,
        50220 | 50221 | 50222 => encoding_rs::ISO_2022_JP,
        51932 => encoding_rs::EUC_JP,
        54936 => encoding_rs::GB18030,
        65001 => encoding_rs::UTF_8,
        _ => return None,
    };
    Some(encoding)
}

/// Map an RTF `\fcharsetN` value to a code page.
///
/// Returns `None` for `DEFAULT_CHARSET` (1) and unknown values, meaning the
/// document code page applies.
pub fn codepage_for_charset(charset: i32) -> Option<u16> {
    let codepage = match charset {
        0 => 1252,
        2 => 1252, // symbol fonts carry no real text encoding
        77 => 10000,
        128 => 932,
        129 => 949,
        134 => 936,
        136 => 950,
        161 => 1253,
        162 => 1254,
        163 => 1258,
        177 => 1255,
        178 => 1256,
        186 => 1257,
        204 => 1251,
        222 => 874,
        238 => 1250,
        254 => 437,
        255 => 850,
        _ => return None,
    };
    Some(codepage)
}

/// Decode bytes in the given code page, replacing malformed sequences.
///
/// Unknown code pages fall back to windows-1252, which accepts every byte.
pub fn decode(bytes: &[u8], codepage: u16) -> String {
    let encoding = encoding_for(codepage).unwrap_or_else(|| {
        tracing::debug!(codepage, "Unknown code page, decoding as windows-1252");
        encoding_rs::WINDOWS_1252
    });
    let (decoded, _) = encoding.decode_without_bom_handling(bytes);
    decoded.into_owned()
}
