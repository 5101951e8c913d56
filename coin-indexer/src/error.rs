use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown network or storage selector, or a node on the wrong network.
    /// Fatal at initialization.
    #[error("config: {0}")]
    Config(String),

    #[error("node rpc: {0}")]
    Rpc(#[from] bitcoincore_rpc::Error),

    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("decode: {0}")]
    Decode(#[from] chain_types::DecodeError),

    /// Out-of-bounds header or chunk lookup; a client error for the caller.
    #[error("index {index} out of range (length {len})")]
    OutOfRange { index: u64, len: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
