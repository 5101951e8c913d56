//! The persistence contract consumed by the synchronizer.
//!
//! Drivers own their layout entirely; the synchronizer only relies on the
//! operations below. Writes are at-least-once: replaying an operation for
//! the same coin coordinate must converge on the same row.

mod memory;

pub use memory::MemoryStore;

use thiserror::Error;

use crate::error::{Error as CrateError, Result as CrateResult};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One tracked transaction output.
///
/// Identity is `(c_txid, c_index)`; at most one row per coordinate exists.
/// `c_height = 0` is reserved for unconfirmed coins surfaced from the
/// mempool overlay, and the unspent form carries `s_txid = None`,
/// `s_height = 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub c_txid: String,
    pub c_index: u32,
    pub address: String,
    pub value: u64,
    pub c_height: u64,
    pub s_txid: Option<String>,
    pub s_height: u64,
}

pub trait Store: Send {
    /// Prepares schema / collections; safe to call repeatedly.
    fn initialize(&mut self) -> Result<()>;

    fn push_header(&mut self, header_hex: &str, height: u64) -> Result<()>;

    fn pop_header(&mut self) -> Result<()>;

    /// All headers in height order, gap-free.
    fn all_headers(&self) -> Result<Vec<String>>;

    fn address_of(&self, c_txid: &str, c_index: u32) -> Result<Option<String>>;

    /// Inserts an unspent coin row.
    fn add_coin(
        &mut self,
        address: &str,
        c_txid: &str,
        c_index: u32,
        value: u64,
        height: u64,
    ) -> Result<()>;

    /// Inverse of `add_coin`.
    fn remove_coin(&mut self, c_txid: &str, c_index: u32) -> Result<()>;

    /// Marks a coin spent; the caller guarantees the row exists.
    fn set_spent(&mut self, c_txid: &str, c_index: u32, s_txid: &str, s_height: u64)
        -> Result<()>;

    /// Inverse of `set_spent`, leaving the row in place.
    fn set_unspent(&mut self, c_txid: &str, c_index: u32) -> Result<()>;

    fn coins_for(&self, address: &str) -> Result<Vec<Coin>>;
}

/// Opens the driver selected by the config string.
pub fn open_store(selector: &str) -> CrateResult<Box<dyn Store>> {
    match selector {
        "memory" => Ok(Box::new(MemoryStore::new())),
        other => Err(CrateError::Config(format!(
            "unknown storage selector {other:?}"
        ))),
    }
}
