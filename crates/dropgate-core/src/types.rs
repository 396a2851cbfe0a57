//! Ledger primitives: account addresses, 32-byte digests and 256-bit amounts.
//!
//! All three render as `0x`-prefixed lowercase hex, which is also their serde
//! representation, so they round-trip through manifests and state files as
//! plain JSON strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token amount. Ledger balances are 256-bit unsigned integers.
pub type Amount = primitive_types::U256;

/// Errors raised while parsing hex-encoded primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid length: expected {expected} hex chars, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("zero address not allowed")]
    ZeroAddress,

    #[error("invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },
}

fn strip_hex_prefix(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let cleaned = strip_hex_prefix(s);
    if cleaned.len() != N * 2 {
        return Err(HexError::InvalidLength {
            expected: N * 2,
            actual: cleaned.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(cleaned, &mut out).map_err(|e| HexError::InvalidHex(e.to_string()))?;
    Ok(out)
}

/// A 20-byte ledger account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address. Never a valid recipient.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wrap raw address bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_fixed::<20>(s)?;
        if bytes == [0u8; 20] {
            return Err(HexError::ZeroAddress);
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32-byte hash digest (tree nodes, roots).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Digest {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Self)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse an amount written as `0x` hex or as a decimal integer.
pub fn parse_amount(value: &str) -> Result<Amount, HexError> {
    let trimmed = value.trim();
    let invalid = |reason: String| HexError::InvalidAmount {
        value: trimmed.to_string(),
        reason,
    };
    if trimmed.is_empty() {
        return Err(invalid("empty".to_string()));
    }
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        let digits = strip_hex_prefix(trimmed);
        if digits.is_empty() {
            return Err(invalid("no hex digits".to_string()));
        }
        Amount::from_str_radix(digits, 16).map_err(|e| invalid(e.to_string()))
    } else {
        Amount::from_dec_str(trimmed).map_err(|e| invalid(format!("{e:?}")))
    }
}

/// Render an amount as minimal `0x` hex, the manifest encoding.
pub fn format_amount_hex(amount: &Amount) -> String {
    format!("0x{amount:x}")
}

/// Big-endian 32-byte encoding of an amount.
pub fn amount_to_be_bytes(amount: &Amount) -> [u8; 32] {
    let mut out = [0u8; 32];
    amount.to_big_endian(&mut out);
    out
}

/// Serde adapter storing [`Amount`] as a `0x` hex string.
///
/// Deserialization also accepts decimal strings so hand-written balance maps
/// can use either form.
pub mod amount_hex {
    use super::{format_amount_hex, parse_amount, Amount};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `0x` hex.
    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_amount_hex(amount))
    }

    /// Deserialize from `0x` hex or decimal.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_amount(&s).map_err(serde::de::Error::custom)
    }
}
