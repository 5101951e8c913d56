use chain_types::{double_sha256, DecodeError, Header, H256};

use crate::error::{Error, Result};

/// Headers per chunk: the difficulty-retarget interval, which is also the
/// frame size client sync protocols request, so a chunk's hex can be served
/// verbatim.
pub const HEADERS_PER_CHUNK: u64 = 2016;

const FULL_CHUNK_HEX: usize = HEADERS_PER_CHUNK as usize * Header::HEX_SIZE;

/// The header chain as contiguous hex chunks, plus the derived hash of the
/// last header.
pub struct HeaderCache {
    chunks: Vec<String>,
    last_block_hash: H256,
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            last_block_hash: H256::ZERO,
        }
    }

    /// Appends one 160-character hex header, opening a new chunk when the
    /// last one is full.
    pub fn push_header(&mut self, header_hex: &str) -> Result<()> {
        if header_hex.len() != Header::HEX_SIZE {
            return Err(DecodeError::InvalidLength.into());
        }
        match self.chunks.last_mut() {
            Some(chunk) if chunk.len() < FULL_CHUNK_HEX => chunk.push_str(header_hex),
            _ => self.chunks.push(header_hex.to_owned()),
        }
        self.update_last_block_hash()
    }

    /// Removes the last header, dropping the last chunk when it empties.
    pub fn pop_header(&mut self) -> Result<()> {
        let Some(chunk) = self.chunks.last_mut() else {
            return Err(Error::OutOfRange { index: 0, len: 0 });
        };
        chunk.truncate(chunk.len() - Header::HEX_SIZE);
        if chunk.is_empty() {
            self.chunks.pop();
        }
        self.update_last_block_hash()
    }

    #[must_use]
    pub fn block_count(&self) -> u64 {
        match self.chunks.split_last() {
            None => 0,
            Some((last, full)) => {
                full.len() as u64 * HEADERS_PER_CHUNK
                    + (last.len() / Header::HEX_SIZE) as u64
            }
        }
    }

    /// Hex header at global index `index`.
    pub fn header(&self, index: u64) -> Result<&str> {
        let len = self.block_count();
        if index >= len {
            return Err(Error::OutOfRange { index, len });
        }
        let chunk = &self.chunks[(index / HEADERS_PER_CHUNK) as usize];
        let offset = (index % HEADERS_PER_CHUNK) as usize * Header::HEX_SIZE;
        Ok(&chunk[offset..offset + Header::HEX_SIZE])
    }

    /// The full hex frame of chunk `index`.
    pub fn chunk(&self, index: u64) -> Result<&str> {
        self.chunks
            .get(index as usize)
            .map(String::as_str)
            .ok_or(Error::OutOfRange {
                index,
                len: self.chunks.len() as u64,
            })
    }

    /// Double-SHA256 of the last header, or the zero hash when empty.
    #[must_use]
    pub fn last_block_hash(&self) -> &H256 {
        &self.last_block_hash
    }

    #[must_use]
    pub fn last_block_hash_hex(&self) -> String {
        self.last_block_hash.to_reversed_hex()
    }

    fn update_last_block_hash(&mut self) -> Result<()> {
        self.last_block_hash = match self.chunks.last() {
            None => H256::ZERO,
            Some(chunk) => {
                let header_hex = &chunk[chunk.len() - Header::HEX_SIZE..];
                let bytes = hex::decode(header_hex).map_err(|_| DecodeError::InvalidHex)?;
                double_sha256(&bytes)
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_header(nonce: u32) -> Header {
        Header {
            version: 2,
            prev_block_hash: H256::ZERO,
            merkle_root: H256::ZERO,
            time: 1_400_000_000,
            bits: 0x1d00_ffff,
            nonce,
        }
    }

    #[test]
    fn empty_cache_has_zero_hash() {
        let cache = HeaderCache::new();
        assert_eq!(cache.block_count(), 0);
        assert_eq!(cache.last_block_hash_hex(), "0".repeat(64));
    }

    #[test]
    fn chunk_boundary_at_2016_headers() {
        let mut cache = HeaderCache::new();
        let mut headers = Vec::new();
        for nonce in 0..2017u32 {
            let hex = test_header(nonce).to_hex();
            cache.push_header(&hex).unwrap();
            headers.push(hex);
        }

        assert_eq!(cache.block_count(), 2017);
        assert_eq!(cache.chunk(0).unwrap().len(), 322_560);
        assert_eq!(cache.chunk(1).unwrap().len(), Header::HEX_SIZE);
        assert_eq!(cache.header(2016).unwrap(), headers[2016]);
        assert_eq!(cache.header(2015).unwrap(), headers[2015]);
        assert!(matches!(cache.chunk(2), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn header_lookup_matches_pushed_order() {
        let mut cache = HeaderCache::new();
        let mut headers = Vec::new();
        for nonce in 0..5u32 {
            let hex = test_header(nonce).to_hex();
            cache.push_header(&hex).unwrap();
            headers.push(hex);
        }
        for (index, hex) in headers.iter().enumerate() {
            assert_eq!(cache.header(index as u64).unwrap(), hex);
        }
        assert!(matches!(cache.header(5), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn last_hash_tracks_push_and_pop() {
        let mut cache = HeaderCache::new();
        let first = test_header(1);
        let second = test_header(2);

        cache.push_header(&first.to_hex()).unwrap();
        assert_eq!(*cache.last_block_hash(), first.block_hash());

        cache.push_header(&second.to_hex()).unwrap();
        assert_eq!(*cache.last_block_hash(), second.block_hash());

        cache.pop_header().unwrap();
        assert_eq!(*cache.last_block_hash(), first.block_hash());

        cache.pop_header().unwrap();
        assert_eq!(*cache.last_block_hash(), H256::ZERO);
        assert!(cache.pop_header().is_err());
    }

    #[test]
    fn pop_across_chunk_boundary_drops_chunk() {
        let mut cache = HeaderCache::new();
        for nonce in 0..2017u32 {
            cache.push_header(&test_header(nonce).to_hex()).unwrap();
        }
        cache.pop_header().unwrap();
        assert_eq!(cache.block_count(), 2016);
        assert!(matches!(cache.chunk(1), Err(Error::OutOfRange { .. })));
        assert_eq!(
            *cache.last_block_hash(),
            test_header(2015).block_hash()
        );
    }

    #[test]
    fn rejects_wrong_length() {
        let mut cache = HeaderCache::new();
        assert!(cache.push_header("00ff").is_err());
    }
}
