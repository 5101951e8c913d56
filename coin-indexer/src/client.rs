use std::time::Duration;

use bitcoincore_rpc::jsonrpc::minreq_http::HttpError;
use bitcoincore_rpc::jsonrpc::Transport;
use bitcoincore_rpc::{jsonrpc, RpcApi};
use jsonrpc::{Request, Response};
use serde::Deserialize;
use serde_json::value::RawValue;

use chain_types::{DecodeError, Header, H256};

use crate::config::BitcoindConfig;
use crate::error::Result;

/// The subset of `getinfo` the synchronizer cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    pub blocks: u64,
    #[serde(default)]
    pub testnet: bool,
}

/// Verbose `getblock` response: header fields plus ordered txids.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockInfo {
    pub hash: String,
    pub height: u64,
    pub version: i32,
    pub merkleroot: H256,
    pub time: u32,
    #[serde(with = "chain_types::utils::serde_u32_hex")]
    pub bits: u32,
    pub nonce: u32,
    #[serde(default)]
    pub previousblockhash: Option<String>,
    #[serde(default)]
    pub tx: Vec<String>,
}

impl BlockInfo {
    /// Reconstructs the raw 80-byte header from the verbose fields. The
    /// genesis block carries no `previousblockhash` and gets the zero hash.
    pub fn header(&self) -> std::result::Result<Header, DecodeError> {
        let prev_block_hash = match &self.previousblockhash {
            Some(hash_hex) => H256::from_reversed_hex(hash_hex)?,
            None => H256::ZERO,
        };
        Ok(Header {
            version: self.version,
            prev_block_hash,
            merkle_root: self.merkleroot.clone(),
            time: self.time,
            bits: self.bits,
            nonce: self.nonce,
        })
    }
}

/// The node RPC surface the synchronizer consumes. A trait so tests can
/// substitute a scripted node.
pub trait NodeRpc: Send {
    fn get_info(&self) -> Result<NodeInfo>;

    fn get_block_count(&self) -> Result<u64>;

    fn get_block_hash(&self, height: u64) -> Result<String>;

    fn get_block(&self, block_hash: &str) -> Result<BlockInfo>;

    fn get_raw_transaction(&self, txid: &str) -> Result<String>;

    /// Fetches many raw transactions in one batched request, preserving
    /// input order.
    fn get_raw_transactions(&self, txids: &[String]) -> Result<Vec<String>>;

    fn get_raw_mempool(&self) -> Result<Vec<String>>;

    fn send_raw_transaction(&self, raw_hex: &str) -> Result<String>;

    /// Fee rate (coin per kB) to confirm within `blocks` blocks.
    fn estimate_fee(&self, blocks: u64) -> Result<f64>;
}

struct HttpTransport {
    url: String,
    timeout: Duration,
    basic_auth: Option<String>,
}

impl HttpTransport {
    fn request<R>(&self, req: impl serde::Serialize) -> std::result::Result<R, jsonrpc::minreq_http::Error>
    where
        R: for<'a> serde::de::Deserialize<'a>,
    {
        let req = match &self.basic_auth {
            Some(auth) => minreq::Request::new(minreq::Method::Post, &self.url)
                .with_timeout(self.timeout.as_secs())
                .with_header("Authorization", auth)
                .with_json(&req)?,
            None => minreq::Request::new(minreq::Method::Post, &self.url)
                .with_timeout(self.timeout.as_secs())
                .with_json(&req)?,
        };

        // A non-JSON body (e.g. the node's HTTP work queue overflowing)
        // surfaces as the raw HTTP error rather than a parse error.
        let resp = req.send()?;
        match resp.json() {
            Ok(json) => Ok(json),
            Err(minreq_err) => {
                if resp.status_code == 200 {
                    Err(jsonrpc::minreq_http::Error::Minreq(minreq_err))
                } else {
                    Err(jsonrpc::minreq_http::Error::Http(HttpError {
                        status_code: resp.status_code,
                        body: resp.as_str().unwrap_or("").to_string(),
                    }))
                }
            }
        }
    }
}

impl Transport for HttpTransport {
    fn send_request(&self, req: Request) -> std::result::Result<Response, jsonrpc::Error> {
        Ok(self.request(req)?)
    }

    fn send_batch(&self, reqs: &[Request]) -> std::result::Result<Vec<Response>, jsonrpc::Error> {
        Ok(self.request(reqs)?)
    }

    fn fmt_target(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

fn basic_auth(user: &str, password: &str) -> String {
    let mut s = user.to_owned();
    s.push(':');
    s.push_str(password);
    format!("Basic {}", &jsonrpc::base64::encode(s.as_bytes()))
}

/// Blocking JSON-RPC client for the trusted full node.
pub struct BitcoinClient {
    inner: bitcoincore_rpc::Client,
}

impl BitcoinClient {
    #[must_use]
    pub fn new(config: &BitcoindConfig) -> Self {
        let transport = HttpTransport {
            url: format!("http://{}:{}", config.host, config.port),
            timeout: Duration::from_secs(15),
            basic_auth: Some(basic_auth(&config.user, &config.password)),
        };

        let inner = bitcoincore_rpc::Client::from_jsonrpc(jsonrpc::Client::with_transport(transport));

        Self { inner }
    }
}

impl NodeRpc for BitcoinClient {
    fn get_info(&self) -> Result<NodeInfo> {
        Ok(self.inner.call("getinfo", &[])?)
    }

    fn get_block_count(&self) -> Result<u64> {
        Ok(self.inner.get_block_count()?)
    }

    fn get_block_hash(&self, height: u64) -> Result<String> {
        Ok(self.inner.get_block_hash(height)?.to_string())
    }

    fn get_block(&self, block_hash: &str) -> Result<BlockInfo> {
        Ok(self
            .inner
            .call("getblock", &[into_json(block_hash)?])?)
    }

    fn get_raw_transaction(&self, txid: &str) -> Result<String> {
        Ok(self
            .inner
            .call("getrawtransaction", &[into_json(txid)?])?)
    }

    fn get_raw_transactions(&self, txids: &[String]) -> Result<Vec<String>> {
        if txids.is_empty() {
            return Ok(Vec::new());
        }

        let rpc = self.inner.get_jsonrpc_client();
        let params: Vec<Box<RawValue>> = txids
            .iter()
            .map(|txid| serde_json::value::to_raw_value(&[txid]))
            .collect::<std::result::Result<_, _>>()
            .map_err(bitcoincore_rpc::Error::Json)?;
        let requests: Vec<Request> = params
            .iter()
            .map(|param| rpc.build_request("getrawtransaction", Some(param.as_ref())))
            .collect();

        let responses = rpc
            .send_batch(&requests)
            .map_err(bitcoincore_rpc::Error::from)?;

        let mut raw_txs = Vec::with_capacity(txids.len());
        for response in responses {
            let response =
                response.ok_or(bitcoincore_rpc::Error::UnexpectedStructure)?;
            raw_txs.push(
                response
                    .result::<String>()
                    .map_err(bitcoincore_rpc::Error::from)?,
            );
        }
        Ok(raw_txs)
    }

    fn get_raw_mempool(&self) -> Result<Vec<String>> {
        Ok(self.inner.call("getrawmempool", &[])?)
    }

    fn send_raw_transaction(&self, raw_hex: &str) -> Result<String> {
        Ok(self
            .inner
            .call("sendrawtransaction", &[into_json(raw_hex)?])?)
    }

    fn estimate_fee(&self, blocks: u64) -> Result<f64> {
        Ok(self.inner.call("estimatefee", &[into_json(blocks)?])?)
    }
}

fn into_json<T>(val: T) -> Result<serde_json::Value>
where
    T: serde::ser::Serialize,
{
    Ok(serde_json::to_value(val).map_err(bitcoincore_rpc::Error::Json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_info_rebuilds_header() {
        let info: BlockInfo = serde_json::from_str(
            r#"{
                "hash": "000000000000000000016f0484972d135afba541c837d0c07c1530ffeee293cd",
                "height": 685440,
                "version": 805298180,
                "merkleroot": "534e13aa090e6615a2a6610f49b42ca9caa93f3ce2ca33735ca11444d6705424",
                "time": 1622337521,
                "bits": "170d5f7b",
                "nonce": 1876340370,
                "previousblockhash": "00000000000000000006248c28751a176336f5c070f901dc86df190c391d761d",
                "tx": ["4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"]
            }"#,
        )
        .unwrap();

        let header = info.header().unwrap();
        assert_eq!(header.block_hash().to_string(), info.hash);
        assert_eq!(header.bits, 0x170d_5f7b);
    }

    #[test]
    fn genesis_block_gets_zero_prev_hash() {
        let info: BlockInfo = serde_json::from_str(
            r#"{
                "hash": "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
                "height": 0,
                "version": 1,
                "merkleroot": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
                "time": 1231006505,
                "bits": "1d00ffff",
                "nonce": 2083236893,
                "tx": ["4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"]
            }"#,
        )
        .unwrap();

        let header = info.header().unwrap();
        assert_eq!(header.prev_block_hash, H256::ZERO);
        assert_eq!(header.block_hash().to_string(), info.hash);
    }
}
