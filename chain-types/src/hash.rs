use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::DecodeError;

/// A 32-byte hash held in consensus (little-endian) byte order.
///
/// `Display` and `FromStr` use the byte-reversed hex convention that nodes
/// and explorers use for transaction and block hashes.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct H256(pub [u8; 32]);

impl H256 {
    pub const ZERO: H256 = H256([0u8; 32]);

    /// Parse from the byte-reversed hex form used on the wire.
    pub fn from_reversed_hex(s: &str) -> Result<Self, DecodeError> {
        let mut bytes = hex::decode(s).map_err(|_| DecodeError::InvalidHex)?;
        bytes.reverse();
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| DecodeError::InvalidLength)?;
        Ok(H256(bytes))
    }

    /// Render in the byte-reversed hex form used on the wire.
    pub fn to_reversed_hex(&self) -> String {
        let reversed: Vec<u8> = self.0.iter().rev().copied().collect();
        hex::encode(reversed)
    }
}

impl From<[u8; 32]> for H256 {
    fn from(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }
}

impl TryFrom<&[u8]> for H256 {
    type Error = DecodeError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 32] = value.try_into().map_err(|_| DecodeError::InvalidLength)?;
        Ok(H256(bytes))
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_reversed_hex())
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({})", self.to_reversed_hex())
    }
}

impl FromStr for H256 {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        H256::from_reversed_hex(s)
    }
}

impl Serialize for H256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_reversed_hex())
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HexVisitor;

        impl<'de> Visitor<'de> for HexVisitor {
            type Value = H256;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 64-character hex string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                H256::from_reversed_hex(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(HexVisitor)
    }
}

pub fn double_sha256(input: &[u8]) -> H256 {
    H256(Sha256::digest(Sha256::digest(input)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_hex_round_trip() {
        let s = "000000000000000000016f0484972d135afba541c837d0c07c1530ffeee293cd";
        let hash = H256::from_reversed_hex(s).unwrap();
        assert_eq!(hash.to_string(), s);
        // the leading display zeros are the trailing stored bytes
        assert_eq!(hash.0[31], 0);
        assert_eq!(hash.0[0], 0xcd);
    }

    #[test]
    fn zero_hash_display() {
        assert_eq!(H256::ZERO.to_string(), "0".repeat(64));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(H256::from_reversed_hex("zz"), Err(DecodeError::InvalidHex));
        assert_eq!(
            H256::from_reversed_hex("abcd"),
            Err(DecodeError::InvalidLength)
        );
    }

    #[test]
    fn double_sha256_known_vector() {
        // double-SHA256 of the empty string
        assert_eq!(
            hex::encode(double_sha256(b"").0),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }
}
