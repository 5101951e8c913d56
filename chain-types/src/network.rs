use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Bitcoin,
    Testnet,
    Regtest,
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bitcoin" | "mainnet" | "livenet" => Ok(Network::Bitcoin),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network {other:?}")),
        }
    }
}

/// Address-encoding parameters for a network.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    /// Version byte prefixed to a pubkey hash before base58check encoding.
    pub p2pkh_version: u8,
    /// Version byte prefixed to a script hash before base58check encoding.
    pub p2sh_version: u8,
    /// Whether the node is expected to report itself as testnet.
    pub is_testnet: bool,
}

impl NetworkParams {
    #[must_use]
    pub fn new(network: Network) -> Self {
        match network {
            Network::Bitcoin => NetworkParams {
                p2pkh_version: 0x00,
                p2sh_version: 0x05,
                is_testnet: false,
            },
            Network::Testnet => NetworkParams {
                p2pkh_version: 0x6f,
                p2sh_version: 0xc4,
                is_testnet: true,
            },
            Network::Regtest => NetworkParams {
                p2pkh_version: 0x6f,
                p2sh_version: 0xc4,
                is_testnet: true,
            },
        }
    }
}
