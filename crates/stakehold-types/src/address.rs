use crate::validation::ValidationError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

const ADDRESS_PATTERN: &str = r"^0x[0-9a-fA-F]{40}$";

/// 20-byte address of an account or ledger component.
///
/// Serialized as a `0x`-prefixed lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The zero address, used as the "unset" sentinel.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Creates an address from raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates an address from a slice; fails unless it is exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        let raw: [u8; ADDRESS_LEN] =
            bytes.try_into().map_err(|_| ValidationError::BadLength {
                field: "address",
                expected: ADDRESS_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(raw))
    }

    /// Parses a `0x`-prefixed, 40 hex digit address.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let s = value.as_ref();
        if !Regex::new(ADDRESS_PATTERN)
            .expect("invalid regex")
            .is_match(s)
        {
            return Err(ValidationError::PatternMismatch {
                field: "address",
                value: s.to_string(),
            });
        }
        let bytes = hex::decode(&s[2..]).map_err(|_| ValidationError::PatternMismatch {
            field: "address",
            value: s.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Derives a stable address from a human-readable label.
    ///
    /// Uses the last 20 bytes of `sha256("stakehold:label:" || label)`.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"stakehold:label:");
        hasher.update(label.as_bytes());
        let digest = hasher.finalize();
        let mut raw = [0u8; ADDRESS_LEN];
        raw.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Self(raw)
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Whether this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::str::FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_round_trip() {
        let s = "0x00112233445566778899aabbccddeeff00112233";
        let addr = Address::parse(s).unwrap();
        assert_eq!(addr.to_string(), s);
    }

    #[test]
    fn parse_rejects_missing_prefix_and_short_input() {
        assert!(Address::parse("00112233445566778899aabbccddeeff00112233").is_err());
        assert!(Address::parse("0x0011").is_err());
        assert!(Address::parse("0xzz112233445566778899aabbccddeeff00112233").is_err());
    }

    #[test]
    fn labels_are_stable_and_distinct() {
        assert_eq!(Address::from_label("alice"), Address::from_label("alice"));
        assert_ne!(Address::from_label("alice"), Address::from_label("bob"));
        assert!(!Address::from_label("alice").is_zero());
    }

    #[test]
    fn from_slice_checks_length() {
        let err = Address::from_slice(&[1u8; 19]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BadLength {
                field: "address",
                expected: 20,
                actual: 19
            }
        );
    }
}
