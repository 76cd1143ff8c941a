//! Bluetooth MAC address type shared by the decoder, registry and scanner.
//!
//! Addresses are stored as six raw octets so they are cheap to copy and hash,
//! and independent of any specific Bluetooth library.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A Bluetooth MAC address stored as a compact 6-byte array.
///
/// Ordering is byte-wise, which matches the lexical order of the upper-case
/// display form. The registry and fleet rely on this for stable iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// The first three octets (the vendor OUI).
    pub fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Whether the address starts with the given vendor prefix.
    pub fn has_prefix(&self, prefix: [u8; 3]) -> bool {
        self.oui() == prefix
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Errors returned when parsing a MAC address string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseMacError {
    #[error("MAC '{0}' not separated with ':'")]
    MissingSeparator(String),
    #[error("MAC '{mac}' has {parts} parts, expected 6")]
    InvalidLength { mac: String, parts: usize },
    #[error("MAC '{mac}' part '{part}' is not two hex digits")]
    InvalidPart { mac: String, part: String },
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.contains(':') {
            return Err(ParseMacError::MissingSeparator(s.to_string()));
        }

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(ParseMacError::InvalidLength {
                mac: s.to_string(),
                parts: parts.len(),
            });
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            // from_str_radix accepts a leading '+', which is not a hex digit
            let valid = part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit());
            *byte = u8::from_str_radix(part, 16)
                .ok()
                .filter(|_| valid)
                .ok_or_else(|| ParseMacError::InvalidPart {
                    mac: s.to_string(),
                    part: part.to_string(),
                })?;
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for MacAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}
