use crate::error::HavenError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque 20-byte principal address.
///
/// The core interprets no structure beyond byte equality. Parsing accepts
/// hex with or without a `0x` prefix in any casing; rendering always
/// produces the canonical checksummed form, where each alphabetic hex digit
/// is uppercased when the corresponding nibble of the blake3 digest of the
/// lowercase hex string is >= 8.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal([u8; 20]);

impl Principal {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Render the canonical checksummed form, `0x`-prefixed.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = blake3::hash(lower.as_bytes());
        let digest = digest.as_bytes();

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, ch) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                digest[i / 2] >> 4
            } else {
                digest[i / 2] & 0x0f
            };
            if ch.is_ascii_alphabetic() && nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// Short form for log fields: `0x` plus the first four bytes.
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl FromStr for Principal {
    type Err = HavenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != Self::LEN * 2 {
            return Err(HavenError::Validation(format!(
                "principal must be {} hex digits, got {}",
                Self::LEN * 2,
                digits.len()
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits.to_ascii_lowercase(), &mut bytes)
            .map_err(|_| HavenError::Validation(format!("invalid principal hex '{}'", trimmed)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum_string())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_checksum_string())
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum_string())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Principal {
        Principal::from_bytes([
            0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a,
            0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
        ])
    }

    #[test]
    fn parse_accepts_prefixed_and_bare_hex() {
        let p = sample();
        let checksummed = p.to_checksum_string();

        assert_eq!(checksummed.parse::<Principal>().unwrap(), p);
        assert_eq!(checksummed[2..].parse::<Principal>().unwrap(), p);
        assert_eq!(
            checksummed.to_ascii_uppercase().replace("0X", "0x").parse::<Principal>().unwrap(),
            p
        );
    }

    #[test]
    fn checksum_form_is_stable() {
        let p = sample();
        // Round-tripping through the checksummed form is the identity.
        let reparsed: Principal = p.to_checksum_string().parse().unwrap();
        assert_eq!(reparsed.to_checksum_string(), p.to_checksum_string());
        assert!(p.to_checksum_string().starts_with("0x"));
        assert_eq!(p.to_checksum_string().len(), 42);
    }

    #[test]
    fn rejects_wrong_length_and_bad_digits() {
        assert!("0x1234".parse::<Principal>().is_err());
        assert!("0xzz00000000000000000000000000000000000000"
            .parse::<Principal>()
            .is_err());
    }

    #[test]
    fn serde_round_trip() {
        let p = sample();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, format!("\"{}\"", p.to_checksum_string()));
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
