//! Outlook rich-text body handling: compressed RTF and encapsulated HTML.

pub mod compressed;
pub mod encapsulated;

pub use compressed::decompress;
pub use encapsulated::{deencapsulate, Encapsulated, Mode};
