//! `msghtml` — render Outlook `.msg` message bodies as self-contained HTML.
//!
//! This crate reads the OLE compound-file container, recovers the HTML (or
//! plain text) body encapsulated in compressed RTF, and inlines `cid:`
//! images referenced by the body as `data:` URIs.

pub mod codepage;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod render;
pub mod rtf;
