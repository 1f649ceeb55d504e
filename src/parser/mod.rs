//! Outlook message parsing: compound-file container reader and MAPI property decoding.

pub mod msg;
pub mod property;

pub use msg::{open_msg, parse_msg};
