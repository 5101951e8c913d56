use std::collections::{HashMap, HashSet};

/// Volatile view of unconfirmed transactions.
///
/// Strictly additive within one cycle: entries are inserted by
/// `update_mempool` and never mutated until the whole overlay is replaced
/// with a fresh one at the next height change. Entries for transactions the
/// node has since dropped linger until that reset; reads overlay onto
/// storage, so they only widen the unconfirmed view.
#[derive(Debug, Default)]
pub struct Mempool {
    /// Unconfirmed transactions already processed this cycle.
    tx_ids: HashSet<String>,
    /// Unconfirmed spends: coin coordinate -> spending txid.
    spent: HashMap<(String, u32), String>,
    /// Reverse lookup for unconfirmed outputs: coordinate -> address.
    addrs: HashMap<(String, u32), String>,
    /// Unconfirmed outputs per address: address -> txid -> index -> value.
    coins: HashMap<String, HashMap<String, HashMap<u32, u64>>>,
}

impl Mempool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, txid: &str) -> bool {
        self.tx_ids.contains(txid)
    }

    pub fn mark_processed(&mut self, txid: String) {
        self.tx_ids.insert(txid);
    }

    pub fn record_spent(&mut self, c_txid: String, c_index: u32, s_txid: String) {
        self.spent.insert((c_txid, c_index), s_txid);
    }

    pub fn record_output(&mut self, txid: &str, index: u32, address: &str, value: u64) {
        self.addrs
            .insert((txid.to_owned(), index), address.to_owned());
        self.coins
            .entry(address.to_owned())
            .or_default()
            .entry(txid.to_owned())
            .or_default()
            .insert(index, value);
    }

    #[must_use]
    pub fn address_of(&self, txid: &str, index: u32) -> Option<&str> {
        self.addrs
            .get(&(txid.to_owned(), index))
            .map(String::as_str)
    }

    #[must_use]
    pub fn spending_tx(&self, c_txid: &str, c_index: u32) -> Option<&str> {
        self.spent
            .get(&(c_txid.to_owned(), c_index))
            .map(String::as_str)
    }

    /// Unconfirmed outputs paying `address` as `(c_txid, c_index, value)`,
    /// in deterministic order.
    #[must_use]
    pub fn coins_for(&self, address: &str) -> Vec<(String, u32, u64)> {
        let mut result = Vec::new();
        if let Some(by_tx) = self.coins.get(address) {
            for (txid, outputs) in by_tx {
                for (index, value) in outputs {
                    result.push((txid.clone(), *index, *value));
                }
            }
        }
        result.sort();
        result
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tx_ids.is_empty()
            && self.spent.is_empty()
            && self.addrs.is_empty()
            && self.coins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_additive() {
        let mut mempool = Mempool::new();
        assert!(mempool.is_empty());

        mempool.mark_processed("aa".into());
        assert!(mempool.contains("aa"));
        assert!(!mempool.contains("bb"));

        mempool.record_output("aa", 0, "addr1", 100);
        mempool.record_output("aa", 1, "addr2", 200);
        mempool.record_spent("cc".into(), 3, "aa".into());

        assert_eq!(mempool.address_of("aa", 0), Some("addr1"));
        assert_eq!(mempool.address_of("aa", 2), None);
        assert_eq!(mempool.spending_tx("cc", 3), Some("aa"));
        assert_eq!(mempool.spending_tx("cc", 4), None);
        assert_eq!(
            mempool.coins_for("addr1"),
            vec![("aa".to_owned(), 0, 100)]
        );
        assert!(mempool.coins_for("addr3").is_empty());
        assert!(!mempool.is_empty());
    }
}
