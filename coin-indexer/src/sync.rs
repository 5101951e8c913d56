use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, trace, warn};

use chain_types::{NetworkParams, Transaction, H256};

use crate::client::NodeRpc;
use crate::error::{Error, Result};
use crate::events::{Event, EventBus, Subscriber};
use crate::headers::HeaderCache;
use crate::mempool::Mempool;
use crate::script::script_to_address;
use crate::store::{Coin, Store};

/// A block with its transactions parsed, in block order.
struct FullBlock {
    height: u64,
    header: chain_types::Header,
    txs: Vec<ParsedTx>,
}

struct ParsedTx {
    txid: String,
    tx: Transaction,
}

macro_rules! continue_on_fail {
    ($res:expr, $msg:expr, $sleep_time:expr, $label:tt) => {
        match $res {
            Ok(val) => val,
            Err(e) => {
                warn!(target: "sync", "{}. Error: {}", $msg, e);
                trace!(target: "sync", "Sleep {:?} before next loop", $sleep_time);
                tokio::time::sleep($sleep_time).await;
                continue $label;
            }
        }
    };
}

/// Reconciles local state with the trusted node: an append-only header
/// chain with one-block rollback, the address-to-coin index, and the
/// mempool overlay.
pub struct Synchronizer<C: NodeRpc> {
    client: C,
    store: Box<dyn Store>,
    headers: HeaderCache,
    mempool: Mempool,
    events: EventBus,
    params: NetworkParams,
    interrupt: Arc<AtomicBool>,
}

impl<C: NodeRpc> Synchronizer<C> {
    pub fn new(
        client: C,
        store: Box<dyn Store>,
        params: NetworkParams,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            store,
            headers: HeaderCache::new(),
            mempool: Mempool::new(),
            events: EventBus::new(),
            params,
            interrupt,
        }
    }

    /// Registers an event handler. Handlers registered after `initialize`
    /// miss nothing only if no catch-up has run yet.
    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.events.subscribe(subscriber);
    }

    pub fn subscribe_fn<F>(&mut self, handler: F)
    where
        F: Fn(&Event) + Send + 'static,
    {
        self.events.subscribe_fn(handler);
    }

    /// Prepares storage, verifies the node is on the configured network and
    /// mirrors the persisted header log into the in-memory cache.
    pub fn initialize(&mut self) -> Result<()> {
        self.store.initialize()?;

        let node = self.client.get_info()?;
        if node.testnet != self.params.is_testnet {
            return Err(Error::Config(format!(
                "node reports testnet={} but the configured network disagrees",
                node.testnet
            )));
        }

        for header_hex in self.store.all_headers()? {
            self.headers.push_header(&header_hex)?;
        }
        info!(
            target: "sync",
            "initialized with {} headers, tip {}",
            self.headers.block_count(),
            self.headers.last_block_hash_hex()
        );
        Ok(())
    }

    /// The main iteration: catch up with the node, then refresh the mempool
    /// overlay, every `poll_interval`. Errors are logged and the loop goes
    /// on; an interrupt stops it at the next block boundary.
    pub async fn run(&mut self, poll_interval: Duration) {
        'main_loop: loop {
            if self.interrupt.load(Ordering::Relaxed) {
                info!(target: "sync", "interrupt requested, stopping");
                break;
            }

            continue_on_fail!(
                self.catch_up(),
                "Catch-up iteration failed",
                poll_interval,
                'main_loop
            );
            continue_on_fail!(
                self.update_mempool(),
                "Mempool update failed",
                poll_interval,
                'main_loop
            );

            if self.interrupt.load(Ordering::Relaxed) {
                info!(target: "sync", "interrupt requested, stopping");
                break;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// One catch-up pass: imports or reverts blocks until the node reports
    /// our tip hash as its best block.
    ///
    /// Each iteration moves the tip by exactly one block in either
    /// direction and is committed as a unit (header log, coin rows, header
    /// cache, derived tip hash) before `NewHeight` fires. The interrupt
    /// flag is only honored between blocks.
    pub fn catch_up(&mut self) -> Result<()> {
        loop {
            if self.interrupt.load(Ordering::Relaxed) {
                trace!(target: "sync", "interrupt observed at block boundary");
                break;
            }

            let node_count = self.client.get_block_count()?;
            let node_hash = self.client.get_block_hash(node_count)?;
            let local_hash = self.headers.last_block_hash_hex();
            if node_hash == local_hash {
                break;
            }

            if node_count < self.headers.block_count() {
                // the node has nothing above our tip yet its tip hash
                // differs: our tip is stale, step back one block
                let tip = self.get_full_block(&local_hash)?;
                self.revert_block(&tip)?;
            } else {
                // the hash the node reports at our next height
                let next_hash = self.client.get_block_hash(self.headers.block_count())?;
                let block = self.get_full_block(&next_hash)?;

                if block.header.prev_block_hash.to_reversed_hex() == local_hash {
                    self.import_block(&block)?;
                } else {
                    // stale tip; step back one block and re-evaluate
                    let tip = self.get_full_block(&local_hash)?;
                    self.revert_block(&tip)?;
                }
            }

            // the overlay described the previous tip; replace it wholesale
            // before announcing the new one
            self.mempool = Mempool::new();
            self.events.emit(&Event::NewHeight);
        }
        Ok(())
    }

    /// Block metadata plus parsed transactions in block order. Genesis has
    /// no spendable transactions and is returned empty; for every other
    /// block the raw transactions arrive in one batched request.
    fn get_full_block(&self, block_hash: &str) -> Result<FullBlock> {
        let info = self.client.get_block(block_hash)?;
        let header = info.header()?;

        let txs = if info.height == 0 {
            Vec::new()
        } else {
            let raw_txs = self.client.get_raw_transactions(&info.tx)?;
            let mut txs = Vec::with_capacity(raw_txs.len());
            for raw_hex in &raw_txs {
                let tx = Transaction::from_hex(raw_hex)?;
                txs.push(ParsedTx {
                    txid: tx.txid().to_string(),
                    tx,
                });
            }
            txs
        };

        Ok(FullBlock {
            height: info.height,
            header,
            txs,
        })
    }

    fn import_block(&mut self, block: &FullBlock) -> Result<()> {
        let started = Instant::now();

        let header_hex = block.header.to_hex();
        self.store.push_header(&header_hex, block.height)?;
        self.headers.push_header(&header_hex)?;

        let mut touched = BTreeSet::new();
        let (mut input_count, mut output_count) = (0usize, 0usize);

        for parsed in &block.txs {
            // spends first, so an output created and consumed within this
            // block ends up spent
            for txin in &parsed.tx.input {
                input_count += 1;
                let prev_txid = txin.previous_tx_hash.to_reversed_hex();
                if let Some(address) = self
                    .store
                    .address_of(&prev_txid, txin.previous_output_index)?
                {
                    self.store.set_spent(
                        &prev_txid,
                        txin.previous_output_index,
                        &parsed.txid,
                        block.height,
                    )?;
                    touched.insert(address);
                }
            }
            for (index, txout) in parsed.tx.output.iter().enumerate() {
                output_count += 1;
                if let Some(address) = script_to_address(&txout.script_pub_key, &self.params) {
                    self.store.add_coin(
                        &address,
                        &parsed.txid,
                        index as u32,
                        txout.value,
                        block.height,
                    )?;
                    touched.insert(address);
                }
            }
        }

        for address in touched {
            self.events.emit(&Event::TouchedAddress(address));
        }

        info!(
            target: "sync",
            "import height {}: {} txs, {} ins, {} outs, {} ms",
            block.height,
            block.txs.len(),
            input_count,
            output_count,
            started.elapsed().as_millis()
        );
        Ok(())
    }

    fn revert_block(&mut self, block: &FullBlock) -> Result<()> {
        let started = Instant::now();

        self.store.pop_header()?;
        self.headers.pop_header()?;

        let mut touched = BTreeSet::new();
        let (mut input_count, mut output_count) = (0usize, 0usize);

        for parsed in &block.txs {
            // outputs before inputs: drop this block's credits, then
            // restore what it had spent
            for index in 0..parsed.tx.output.len() {
                output_count += 1;
                if let Some(address) = self.store.address_of(&parsed.txid, index as u32)? {
                    self.store.remove_coin(&parsed.txid, index as u32)?;
                    touched.insert(address);
                }
            }
            for txin in &parsed.tx.input {
                input_count += 1;
                let prev_txid = txin.previous_tx_hash.to_reversed_hex();
                if let Some(address) = self
                    .store
                    .address_of(&prev_txid, txin.previous_output_index)?
                {
                    self.store
                        .set_unspent(&prev_txid, txin.previous_output_index)?;
                    touched.insert(address);
                }
            }
        }

        for address in touched {
            self.events.emit(&Event::TouchedAddress(address));
        }

        info!(
            target: "sync",
            "revert height {}: {} txs, {} ins, {} outs, {} ms",
            block.height,
            block.txs.len(),
            input_count,
            output_count,
            started.elapsed().as_millis()
        );
        Ok(())
    }

    /// One mempool pass: processes transactions the overlay has not seen
    /// this cycle and emits `TouchedAddress` for every address whose
    /// unconfirmed view changed.
    ///
    /// Mempool order is not topological; a spend of a not-yet-seen parent
    /// resolves against storage, and an unresolvable parent is simply
    /// dropped (the spent output was never indexed).
    pub fn update_mempool(&mut self) -> Result<()> {
        let mempool_txids = self.client.get_raw_mempool()?;

        let mut touched = BTreeSet::new();
        let mut pending_spends: Vec<(String, u32)> = Vec::new();

        for txid in mempool_txids {
            if self.mempool.contains(&txid) {
                continue;
            }
            self.mempool.mark_processed(txid.clone());

            let raw_hex = self.client.get_raw_transaction(&txid)?;
            let tx = Transaction::from_hex(&raw_hex)?;

            for txin in &tx.input {
                let prev_txid = txin.previous_tx_hash.to_reversed_hex();
                self.mempool.record_spent(
                    prev_txid.clone(),
                    txin.previous_output_index,
                    txid.clone(),
                );
                pending_spends.push((prev_txid, txin.previous_output_index));
            }
            for (index, txout) in tx.output.iter().enumerate() {
                if let Some(address) = script_to_address(&txout.script_pub_key, &self.params) {
                    self.mempool
                        .record_output(&txid, index as u32, &address, txout.value);
                    touched.insert(address);
                }
            }
        }

        // the spent input may belong to an earlier mempool output, so the
        // overlay wins over storage
        for (c_txid, c_index) in pending_spends {
            let address = match self.mempool.address_of(&c_txid, c_index) {
                Some(address) => Some(address.to_owned()),
                None => self.store.address_of(&c_txid, c_index)?,
            };
            if let Some(address) = address {
                touched.insert(address);
            }
        }

        for address in touched {
            self.events.emit(&Event::TouchedAddress(address));
        }
        Ok(())
    }

    // --- query surface -----------------------------------------------------

    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.headers.block_count()
    }

    #[must_use]
    pub fn last_block_hash(&self) -> String {
        self.headers.last_block_hash_hex()
    }

    /// Hex header at global index `index`.
    pub fn header(&self, index: u64) -> Result<String> {
        Ok(self.headers.header(index)?.to_owned())
    }

    /// The verbatim hex frame of chunk `index`.
    pub fn chunk(&self, index: u64) -> Result<String> {
        Ok(self.headers.chunk(index)?.to_owned())
    }

    /// Address owning an output, unconfirmed outputs included.
    pub fn get_address(&self, txid: &str, index: u32) -> Result<Option<String>> {
        if let Some(address) = self.mempool.address_of(txid, index) {
            return Ok(Some(address.to_owned()));
        }
        Ok(self.store.address_of(txid, index)?)
    }

    /// Coins of `address`: the stored rows overlaid with unconfirmed
    /// outputs (`c_height = 0`) and unconfirmed spends (`s_height = 0`).
    pub fn get_coins(&self, address: &str) -> Result<Vec<Coin>> {
        let mut coins = self.store.coins_for(address)?;

        for (c_txid, c_index, value) in self.mempool.coins_for(address) {
            coins.push(Coin {
                c_txid,
                c_index,
                address: address.to_owned(),
                value,
                c_height: 0,
                s_txid: None,
                s_height: 0,
            });
        }

        for coin in &mut coins {
            if let Some(s_txid) = self.mempool.spending_tx(&coin.c_txid, coin.c_index) {
                coin.s_txid = Some(s_txid.to_owned());
                coin.s_height = 0;
            }
        }

        Ok(coins)
    }

    /// Merkle path of `txid` within the block at `height`, as byte-reversed
    /// hex siblings plus the transaction's position (`-1` when absent).
    pub fn merkle_proof(&self, txid: &str, height: u64) -> Result<(Vec<String>, i64)> {
        let block_hash = self.client.get_block_hash(height)?;
        let info = self.client.get_block(&block_hash)?;

        let tx_hashes = info
            .tx
            .iter()
            .map(|id| H256::from_reversed_hex(id))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let target = H256::from_reversed_hex(txid)?;

        let (siblings, position) = merkle_tools::merkle_path(tx_hashes, &target);
        Ok((
            siblings.iter().map(ToString::to_string).collect(),
            position,
        ))
    }

    pub fn raw_transaction(&self, txid: &str) -> Result<String> {
        self.client.get_raw_transaction(txid)
    }

    pub fn broadcast(&self, raw_hex: &str) -> Result<String> {
        self.client.send_raw_transaction(raw_hex)
    }

    pub fn estimate_fee(&self, blocks: u64) -> Result<f64> {
        self.client.estimate_fee(blocks)
    }
}
