//! Recovery of HTML or plain text encapsulated in RTF (MS-OXRTFEX).
//!
//! Outlook converts HTML bodies to RTF by wrapping every original tag in a
//! `{\*\htmltag ...}` destination and marking RTF-only formatting with
//! `\htmlrtf`. Reversing that means walking the RTF token stream, emitting
//! htmltag content and unmarked text, and dropping everything else.

use std::collections::HashMap;

use crate::error::CodecError;

use crate::codepage::{codepage_for_charset, DEFAULT_CODEPAGE};

/// What the encapsulated body originally was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// `\fromhtml1`: the text is an HTML document.
    Html,
    /// `\fromtext`: the text is a plain-text body.
    Text,
}

/// A de-encapsulated body.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Encapsulated {
    pub mode: Mode,
    pub text: String,
}

/// Destinations that never contribute body text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "author",
    "buptim",
    "colortbl",
    "comment",
    "creatim",
    "doccomm",
    "footer",
    "footerf",
    "footerl",
    "footerr",
    "footnote",
    "header",
    "headerf",
    "headerl",
    "headerr",
    "info",
    "keywords",
    "listoverridetable",
    "listtable",
    "object",
    "operator",
    "pict",
    "printim",
    "revtbl",
    "revtim",
    "rsidtbl",
    "stylesheet",
    "subject",
    "title",
    "xe",
];

/// Decode `rtf` into its encapsulated body.
///
/// `decode` turns byte runs into text for a given Windows code page;
/// [`crate::codepage::decode`] is the usual choice.
pub fn deencapsulate<F>(rtf: &[u8], decode: F) -> Result<Encapsulated, CodecError>
where
    F: Fn(&[u8], u16) -> String,
{
    let start = rtf
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(rtf.len());
    let rtf = &rtf[start..];
    if !rtf.starts_with(b"{\\rtf") {
        return Err(CodecError::NotRtf);
    }

    let mut walker = Walker::new(&decode);
    for token in Tokenizer::new(rtf) {
        if walker.feed(token)? == Flow::Done {
            break;
        }
    }
    walker.finish()
}

// ── Tokenizer ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    GroupStart,
    GroupEnd,
    Word { name: &'a str, param: Option<i32> },
    Symbol(u8),
    Hex(u8),
    Text(&'a [u8]),
}

struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn control(&mut self) -> Token<'a> {
        let backslash = self.pos;
        self.pos += 1;
        let Some(&c) = self.input.get(self.pos) else {
            return Token::Text(&self.input[backslash..]);
        };

        if c.is_ascii_alphabetic() {
            let start = self.pos;
            while self.pos < self.input.len()
                && self.input[self.pos].is_ascii_alphabetic()
                && self.pos - start < 32
            {
                self.pos += 1;
            }
            let name = std::str::from_utf8(&self.input[start..self.pos]).unwrap_or("");

            let negative = self.input.get(self.pos) == Some(&b'-')
                && self
                    .input
                    .get(self.pos + 1)
                    .is_some_and(|d| d.is_ascii_digit());
            if negative {
                self.pos += 1;
            }
            let digits = self.pos;
            while self.pos < self.input.len()
                && self.input[self.pos].is_ascii_digit()
                && self.pos - digits < 10
            {
                self.pos += 1;
            }
            let param = (self.pos > digits).then(|| {
                let value = std::str::from_utf8(&self.input[digits..self.pos])
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(0);
                let value = if negative { -value } else { value };
                i32::try_from(value).unwrap_or(if negative { i32::MIN } else { i32::MAX })
            });

            // A single space delimits the control word and is not text.
            if self.input.get(self.pos) == Some(&b' ') {
                self.pos += 1;
            }
            return Token::Word { name, param };
        }

        self.pos += 1;
        match c {
            b'\'' => {
                let hi = self.input.get(self.pos).and_then(|b| hex_value(*b));
                let lo = self.input.get(self.pos + 1).and_then(|b| hex_value(*b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        self.pos += 2;
                        Token::Hex(hi << 4 | lo)
                    }
                    _ => Token::Symbol(b'\''),
                }
            }
            b'\r' | b'\n' => Token::Word {
                name: "par",
                param: None,
            },
            _ => Token::Symbol(c),
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            let &b = self.input.get(self.pos)?;
            match b {
                b'{' => {
                    self.pos += 1;
                    return Some(Token::GroupStart);
                }
                b'}' => {
                    self.pos += 1;
                    return Some(Token::GroupEnd);
                }
                b'\\' => return Some(self.control()),
                // Raw line breaks are formatting of the RTF source only.
                b'\r' | b'\n' => self.pos += 1,
                _ => {
                    let start = self.pos;
                    while self.pos < self.input.len()
                        && !matches!(self.input[self.pos], b'{' | b'}' | b'\\' | b'\r' | b'\n')
                    {
                        self.pos += 1;
                    }
                    return Some(Token::Text(&self.input[start..self.pos]));
                }
            }
        }
    }
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

// ── Walker ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Body,
    HtmlTag,
    FontTable,
    Skip,
}

#[derive(Debug, Clone)]
struct GroupState {
    destination: Destination,
    htmlrtf: bool,
    /// Fallback characters following each `\u`.
    uc: usize,
    /// Code page of the active font, if its charset is known.
    codepage: Option<u16>,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

struct Walker<'d> {
    decode: &'d dyn Fn(&[u8], u16) -> String,
    mode: Option<Mode>,
    state: GroupState,
    stack: Vec<GroupState>,
    fonts: HashMap<i32, u16>,
    font_def: Option<i32>,
    document_codepage: u16,
    group_fresh: bool,
    ignorable: bool,
    skip: usize,
    high_surrogate: Option<u32>,
    pending: Vec<u8>,
    pending_codepage: u16,
    out: String,
}

impl<'d> Walker<'d> {
    fn new(decode: &'d dyn Fn(&[u8], u16) -> String) -> Self {
        Self {
            decode,
            mode: None,
            state: GroupState {
                destination: Destination::Body,
                htmlrtf: false,
                uc: 1,
                codepage: None,
            },
            stack: Vec::new(),
            fonts: HashMap::new(),
            font_def: None,
            document_codepage: DEFAULT_CODEPAGE,
            group_fresh: false,
            ignorable: false,
            skip: 0,
            high_surrogate: None,
            pending: Vec::new(),
            pending_codepage: DEFAULT_CODEPAGE,
            out: String::new(),
        }
    }

    fn feed(&mut self, token: Token<'_>) -> Result<Flow, CodecError> {
        match token {
            Token::GroupStart => {
                self.flush();
                self.skip = 0;
                self.stack.push(self.state.clone());
                self.group_fresh = true;
                self.ignorable = false;
            }
            Token::GroupEnd => {
                self.flush();
                self.skip = 0;
                self.group_fresh = false;
                self.ignorable = false;
                match self.stack.pop() {
                    Some(previous) => self.state = previous,
                    None => return Ok(Flow::Done),
                }
                if self.stack.is_empty() {
                    return Ok(Flow::Done);
                }
            }
            Token::Symbol(b'*') => self.ignorable = true,
            Token::Word { name, param } => self.word(name, param)?,
            Token::Symbol(symbol) => {
                self.group_fresh = false;
                if self.consume_skip(1) == 0 {
                    self.symbol(symbol)?;
                }
            }
            Token::Hex(byte) => {
                self.group_fresh = false;
                if self.consume_skip(1) == 0 && self.emitting()? {
                    self.push_bytes(&[byte]);
                }
            }
            Token::Text(bytes) => {
                self.group_fresh = false;
                let skipped = self.consume_skip(bytes.len());
                let rest = &bytes[skipped..];
                if !rest.is_empty() && self.emitting()? {
                    self.push_bytes(rest);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn finish(mut self) -> Result<Encapsulated, CodecError> {
        self.flush();
        let mode = self.mode.ok_or(CodecError::NotEncapsulated)?;
        Ok(Encapsulated {
            mode,
            text: self.out,
        })
    }

    fn word(&mut self, name: &str, param: Option<i32>) -> Result<(), CodecError> {
        let fresh = std::mem::take(&mut self.group_fresh);
        let ignorable = std::mem::take(&mut self.ignorable);

        if ignorable || fresh {
            if let Some(destination) = self.destination_for(name, ignorable) {
                self.flush();
                self.state.destination = destination;
                return Ok(());
            }
        }

        match self.state.destination {
            Destination::Skip => return Ok(()),
            Destination::FontTable => {
                self.font_table_word(name, param);
                return Ok(());
            }
            Destination::Body | Destination::HtmlTag => {}
        }

        if name != "u" && self.consume_skip(1) > 0 {
            return Ok(());
        }

        match name {
            "fromhtml" => {
                if self.mode.is_none() {
                    self.mode = Some(Mode::Html);
                }
            }
            "fromtext" => {
                if self.mode.is_none() {
                    self.mode = Some(Mode::Text);
                }
            }
            "ansicpg" => {
                if let Some(cp) = param.and_then(|p| u16::try_from(p).ok()) {
                    self.document_codepage = cp;
                }
            }
            "uc" => self.state.uc = param.and_then(|p| usize::try_from(p).ok()).unwrap_or(1),
            "u" => {
                if let Some(value) = param {
                    self.unicode(value)?;
                }
                self.skip = self.state.uc;
            }
            "f" => {
                self.state.codepage = param.and_then(|p| self.fonts.get(&p).copied());
            }
            "htmlrtf" => {
                self.flush();
                self.state.htmlrtf = param != Some(0);
            }
            "par" | "line" => self.emit_str("\r\n")?,
            "tab" => self.emit_str("\t")?,
            "lquote" => self.emit_str("\u{2018}")?,
            "rquote" => self.emit_str("\u{2019}")?,
            "ldblquote" => self.emit_str("\u{201C}")?,
            "rdblquote" => self.emit_str("\u{201D}")?,
            "bullet" => self.emit_str("\u{2022}")?,
            "endash" => self.emit_str("\u{2013}")?,
            "emdash" => self.emit_str("\u{2014}")?,
            "enspace" => self.emit_str("\u{2002}")?,
            "emspace" => self.emit_str("\u{2003}")?,
            "qmspace" => self.emit_str("\u{2005}")?,
            _ => {}
        }
        Ok(())
    }

    fn destination_for(&self, name: &str, ignorable: bool) -> Option<Destination> {
        if self.state.destination == Destination::Skip {
            return Some(Destination::Skip);
        }
        if ignorable {
            let keep = name == "htmltag" && self.mode == Some(Mode::Html);
            return Some(if keep {
                Destination::HtmlTag
            } else {
                Destination::Skip
            });
        }
        if name == "fonttbl" {
            return Some(Destination::FontTable);
        }
        SKIPPED_DESTINATIONS
            .contains(&name)
            .then_some(Destination::Skip)
    }

    fn font_table_word(&mut self, name: &str, param: Option<i32>) {
        match (name, param) {
            ("f", Some(id)) => self.font_def = Some(id),
            ("fcharset", Some(charset)) => {
                if let (Some(id), Some(cp)) = (self.font_def, codepage_for_charset(charset)) {
                    self.fonts.insert(id, cp);
                }
            }
            ("cpg", Some(cp)) => {
                if let (Some(id), Ok(cp)) = (self.font_def, u16::try_from(cp)) {
                    self.fonts.insert(id, cp);
                }
            }
            _ => {}
        }
    }

    fn symbol(&mut self, symbol: u8) -> Result<(), CodecError> {
        match symbol {
            b'\\' | b'{' | b'}' => {
                if self.emitting()? {
                    self.push_bytes(&[symbol]);
                }
            }
            b'~' => self.emit_str("\u{00A0}")?,
            b'_' => self.emit_str("\u{2011}")?,
            _ => {}
        }
        Ok(())
    }

    fn unicode(&mut self, value: i32) -> Result<(), CodecError> {
        let code = if value < 0 {
            (i64::from(value) + 0x10000) as u32
        } else {
            value as u32
        };
        match code {
            0xD800..=0xDBFF => {
                self.high_surrogate = Some(code);
                Ok(())
            }
            0xDC00..=0xDFFF => {
                let combined = self
                    .high_surrogate
                    .take()
                    .map(|high| 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00));
                let ch = combined
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                self.emit_str(ch.encode_utf8(&mut [0; 4]))
            }
            _ => {
                let ch = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                self.emit_str(ch.encode_utf8(&mut [0; 4]))
            }
        }
    }

    /// Whether content at the current position belongs in the output.
    fn emitting(&self) -> Result<bool, CodecError> {
        match (self.state.destination, self.mode) {
            (Destination::Skip | Destination::FontTable, _) => Ok(false),
            (_, None) => Err(CodecError::NotEncapsulated),
            (Destination::HtmlTag, Some(Mode::Html)) => Ok(true),
            (Destination::HtmlTag, Some(Mode::Text)) => Ok(false),
            (Destination::Body, Some(Mode::Html)) => Ok(!self.state.htmlrtf),
            (Destination::Body, Some(Mode::Text)) => Ok(true),
        }
    }

    fn emit_str(&mut self, s: &str) -> Result<(), CodecError> {
        if self.emitting()? {
            self.flush();
            self.out.push_str(s);
        }
        Ok(())
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        let codepage = self.state.codepage.unwrap_or(self.document_codepage);
        if !self.pending.is_empty() && codepage != self.pending_codepage {
            self.flush();
        }
        self.pending_codepage = codepage;
        self.pending.extend_from_slice(bytes);
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = (self.decode)(&self.pending, self.pending_codepage);
        self.out.push_str(&text);
        self.pending.clear();
    }

    /// Consume up to `available` characters of pending `\u` fallback.
    fn consume_skip(&mut self, available: usize) -> usize {
        let n = self.skip.min(available);
        self.skip -= n;
        n
    }
}
