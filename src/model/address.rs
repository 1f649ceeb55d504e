//! Sender and recipient addresses as stored in MSG properties.
//!
//! Unlike RFC 5322 headers, MSG files keep the display name and the address
//! in separate properties, so no header parsing is needed here.

/// A display name and address pair.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`), or an Exchange DN when no SMTP
    /// address was recorded.
    pub address: String,
}

impl EmailAddress {
    /// Build an address from optional property values.
    pub fn new(display_name: Option<String>, address: Option<String>) -> Self {
        Self {
            display_name: display_name.unwrap_or_default().trim().to_string(),
            address: address.unwrap_or_default().trim().to_string(),
        }
    }

    /// `true` when neither the name nor the address is known.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_empty() && self.address.is_empty()
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else if self.address.is_empty() || self.address == self.display_name {
            self.display_name.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
