pub mod hash;
pub mod header;
pub mod network;
pub mod tx;
pub mod utils;

pub use hash::{double_sha256, H256};
pub use header::Header;
pub use network::{Network, NetworkParams};
pub use tx::{Transaction, TxIn, TxOut};

use thiserror::Error;

/// Raw data that cannot be decoded into a chain primitive.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid length")]
    InvalidLength,
    #[error("invalid hex")]
    InvalidHex,
    #[error("truncated data")]
    Truncated,
    #[error("malformed transaction")]
    MalformedTransaction,
}
