use serde::{Deserialize, Serialize};

use crate::hash::{double_sha256, H256};
use crate::DecodeError;

/// A block header in its consensus field order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Block version, now repurposed for soft fork signalling.
    pub version: i32,
    /// Reference to the previous block in the chain.
    pub prev_block_hash: H256,
    /// The root hash of the merkle tree of transactions in the block.
    pub merkle_root: H256,
    /// The timestamp of the block, as claimed by the miner.
    pub time: u32,
    /// The target value below which the blockhash must lie.
    #[serde(with = "crate::utils::serde_u32_hex")]
    pub bits: u32,
    /// The nonce, selected to obtain a low enough blockhash.
    pub nonce: u32,
}

impl Header {
    /// Serialized length of fields (version, prev_blockhash, merkle_root, time, bits, nonce)
    pub const SIZE: usize = 4 + 32 + 32 + 4 + 4 + 4; // 80

    /// Hex form of a serialized header.
    pub const HEX_SIZE: usize = Self::SIZE * 2; // 160

    #[must_use]
    pub fn block_hash(&self) -> H256 {
        double_sha256(&self.to_bytes())
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(Self::SIZE);
        header.extend_from_slice(&self.version.to_le_bytes());
        header.extend(self.prev_block_hash.0);
        header.extend(self.merkle_root.0);
        header.extend_from_slice(&self.time.to_le_bytes());
        header.extend_from_slice(&self.bits.to_le_bytes());
        header.extend_from_slice(&self.nonce.to_le_bytes());
        header
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_bytes(header: &[u8]) -> Result<Self, DecodeError> {
        if header.len() != Self::SIZE {
            return Err(DecodeError::InvalidLength);
        }

        let version = i32::from_le_bytes(
            header[0..4]
                .try_into()
                .map_err(|_| DecodeError::InvalidLength)?,
        );
        let prev_block_hash = H256::try_from(&header[4..36])?;
        let merkle_root = H256::try_from(&header[36..68])?;
        let time = u32::from_le_bytes(
            header[68..72]
                .try_into()
                .map_err(|_| DecodeError::InvalidLength)?,
        );
        let bits = u32::from_le_bytes(
            header[72..76]
                .try_into()
                .map_err(|_| DecodeError::InvalidLength)?,
        );
        let nonce = u32::from_le_bytes(
            header[76..80]
                .try_into()
                .map_err(|_| DecodeError::InvalidLength)?,
        );

        Ok(Self {
            version,
            prev_block_hash,
            merkle_root,
            time,
            bits,
            nonce,
        })
    }

    pub fn from_hex(header_hex: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(header_hex).map_err(|_| DecodeError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::Header;
    use crate::hash::H256;

    // Mainnet header at height 685440.
    const HEADER_HEX: &str = "04e0ff2f1d761d390c19df86dc01f970c0f53663171a75288c2406000000000000000000245470d64414a15c7333cae23c3fa9caa92cb4490f61a6a215660e09aa134e53f1e7b2607b5f0d1792aed66f";

    #[test]
    fn decode_header() {
        let header = Header::from_hex(HEADER_HEX).unwrap();

        assert_eq!(header.version, 805298180);
        assert_eq!(
            header.prev_block_hash,
            "00000000000000000006248c28751a176336f5c070f901dc86df190c391d761d"
                .parse::<H256>()
                .unwrap()
        );
        assert_eq!(
            header.merkle_root,
            "534e13aa090e6615a2a6610f49b42ca9caa93f3ce2ca33735ca11444d6705424"
                .parse::<H256>()
                .unwrap()
        );
        assert_eq!(header.time, 1622337521);
        assert_eq!(header.bits, 0x170d_5f7b);
        assert_eq!(header.nonce, 1876340370);
    }

    #[test]
    fn block_hash_and_round_trip() {
        let header = Header::from_hex(HEADER_HEX).unwrap();
        assert_eq!(
            header.block_hash().to_string(),
            "000000000000000000016f0484972d135afba541c837d0c07c1530ffeee293cd"
        );
        assert_eq!(header.to_hex(), HEADER_HEX);
    }

    #[test]
    fn header_from_json() {
        let header: Header = serde_json::from_value(serde_json::json!({
            "version": 805298180,
            "prev_block_hash": "00000000000000000006248c28751a176336f5c070f901dc86df190c391d761d",
            "merkle_root": "534e13aa090e6615a2a6610f49b42ca9caa93f3ce2ca33735ca11444d6705424",
            "time": 1622337521,
            "bits": "170d5f7b",
            "nonce": 1876340370
        }))
        .unwrap();

        assert_eq!(header, Header::from_hex(HEADER_HEX).unwrap());
    }

    #[test]
    fn rejects_short_input() {
        assert!(Header::from_hex("00ff").is_err());
    }
}
