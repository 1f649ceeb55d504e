//! Core data model types for Outlook messages, recipients, and attachments.

pub mod address;
pub mod attachment;
pub mod message;
