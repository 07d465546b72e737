use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced while parsing a textual hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacParseError {
    #[error("hardware address '{0}' must have six octets")]
    OctetCount(String),

    #[error("hardware address '{input}' has an invalid octet '{octet}'")]
    InvalidOctet { input: String, octet: String },
}

/// A 6-byte Ethernet hardware address.
///
/// Parses the colon (`aa:bb:cc:dd:ee:ff`) and dash (`aa-bb-cc-dd-ee-ff`)
/// notations, case-insensitively, and always displays lower-case colon hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// The all-zero address, used by the packed representation as an empty
    /// slot marker.
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let separator = if input.contains('-') { '-' } else { ':' };
        let parts: Vec<&str> = input.split(separator).collect();
        if parts.len() != 6 {
            return Err(MacParseError::OctetCount(input.to_string()));
        }

        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(MacParseError::InvalidOctet {
                    input: input.to_string(),
                    octet: part.to_string(),
                });
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| MacParseError::InvalidOctet {
                input: input.to_string(),
                octet: part.to_string(),
            })?;
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_colon_notation() {
        let mac: MacAddr = "AA:BB:CC:DD:EE:01".parse().unwrap();
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn parse_dash_notation() {
        let mac: MacAddr = "00-1a-2B-3c-4D-5e".parse().unwrap();
        assert_eq!(mac.to_string(), "00:1a:2b:3c:4d:5e");
    }

    #[test]
    fn reject_short_address() {
        let err = "aa:bb:cc".parse::<MacAddr>().unwrap_err();
        assert!(matches!(err, MacParseError::OctetCount(_)));
    }

    #[test]
    fn reject_bad_octet() {
        let err = "aa:bb:cc:dd:ee:zz".parse::<MacAddr>().unwrap_err();
        assert!(err.to_string().contains("'zz'"), "unexpected error: {err}");

        let err = "aa:bb:cc:dd:ee:123".parse::<MacAddr>().unwrap_err();
        assert!(matches!(err, MacParseError::InvalidOctet { .. }));
    }

    #[test]
    fn zero_address() {
        assert!(MacAddr::ZERO.is_zero());
        assert!(MacAddr::default().is_zero());
        assert!(!MacAddr::new([0, 0, 0, 0, 0, 1]).is_zero());
    }

    #[test]
    fn serde_uses_string_form() {
        let mac = MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"aa:bb:cc:dd:ee:01\"");
        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }
}
