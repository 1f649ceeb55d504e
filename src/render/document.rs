//! HTML document over the `tl` parser with source-preserving edits.
//!
//! `tl` recovers from the unbalanced markup RTF-derived bodies are full of,
//! but its tree does not round-trip: doctypes, bare `<` in text and script
//! bodies come back mangled. The tree is therefore only used to locate
//! elements and attribute values. Edits are recorded as byte ranges of the
//! source string and spliced into a copy of it, so every byte outside an
//! edited attribute value is emitted exactly as parsed.

use std::borrow::Cow;
use std::ops::Range;

use crate::error::{MsgError, Result};

/// A parsed HTML document borrowing its source string.
pub struct Document<'a> {
    source: &'a str,
    dom: tl::VDom<'a>,
    edits: Vec<(Range<usize>, String)>,
}

/// Handle to one element of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element(usize);

impl<'a> Document<'a> {
    /// Parse an HTML string. Malformed markup is recovered, not rejected;
    /// the only failure is input beyond the parser's 4 GiB addressing limit.
    pub fn parse(source: &'a str) -> Result<Self> {
        let dom = tl::parse(source, tl::ParserOptions::default())
            .map_err(|_| MsgError::Document("HTML input exceeds the parser size limit".into()))?;
        Ok(Self {
            source,
            dom,
            edits: Vec::new(),
        })
    }

    /// All elements with this tag name, in document order. Names match
    /// ASCII case-insensitively.
    pub fn elements(&self, tag: &str) -> Vec<Element> {
        self.dom
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                node.as_tag()
                    .is_some_and(|t| t.name().as_utf8_str().eq_ignore_ascii_case(tag))
            })
            .map(|(i, _)| Element(i))
            .collect()
    }

    /// Value of a named attribute, matched ASCII case-insensitively.
    /// Valueless attributes read as `None`.
    pub fn attribute(&self, element: Element, name: &str) -> Option<String> {
        self.find_attribute(element, name).map(Cow::into_owned)
    }

    /// Replace the value of an existing attribute.
    ///
    /// `value` is inserted between the original quotes as given, so it must
    /// not contain the quote character. Returns `false` and leaves the
    /// element untouched when it has no such attribute or the value cannot
    /// be located in the source.
    pub fn replace_attribute(&mut self, element: Element, name: &str, value: impl Into<String>) -> bool {
        let span = self
            .find_attribute(element, name)
            .and_then(|current| span_in(self.source, &current));
        let Some(span) = span else {
            tracing::debug!(attribute = name, "Attribute value not found in source, not replaced");
            return false;
        };
        self.edits.retain(|(existing, _)| *existing != span);
        self.edits.push((span, value.into()));
        true
    }

    /// The source with every replacement applied. Bytes outside replaced
    /// attribute values are copied unchanged.
    pub fn to_html(&self) -> String {
        let mut edits: Vec<&(Range<usize>, String)> = self.edits.iter().collect();
        edits.sort_by_key(|(span, _)| span.start);

        let grown: usize = edits.iter().map(|(_, value)| value.len()).sum();
        let mut out = String::with_capacity(self.source.len() + grown);
        let mut cursor = 0;
        for (span, value) in edits {
            if span.start < cursor {
                continue;
            }
            out.push_str(&self.source[cursor..span.start]);
            out.push_str(value);
            cursor = span.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    fn find_attribute(&self, element: Element, name: &str) -> Option<Cow<'_, str>> {
        let tag = self.dom.nodes().get(element.0)?.as_tag()?;
        tag.attributes()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value)
    }
}

/// Byte range of `part` within `source`, if `part` is a slice of it.
fn span_in(source: &str, part: &str) -> Option<Range<usize>> {
    let start = (part.as_ptr() as usize).checked_sub(source.as_ptr() as usize)?;
    let end = start.checked_add(part.len())?;
    (source.get(start..end)? == part).then_some(start..end)
}
