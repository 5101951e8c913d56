pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod mempool;
pub mod script;
pub mod store;
pub mod sync;

pub use client::{BitcoinClient, BlockInfo, NodeInfo, NodeRpc};
pub use config::Config;
pub use error::{Error, Result};
pub use events::{Event, EventBus, Subscriber};
pub use headers::HeaderCache;
pub use store::{Coin, MemoryStore, Store};
pub use sync::Synchronizer;
