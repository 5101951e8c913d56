use std::collections::{BTreeSet, HashMap};

use super::{Coin, Result, Store, StoreError};

/// In-memory KV driver. The reference backend for tests and single-process
/// deployments; state does not survive a restart.
#[derive(Default)]
pub struct MemoryStore {
    headers: Vec<(String, u64)>,
    coins: HashMap<(String, u32), Coin>,
    by_address: HashMap<String, BTreeSet<(String, u32)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn coordinate(c_txid: &str, c_index: u32) -> (String, u32) {
        (c_txid.to_owned(), c_index)
    }
}

impl Store for MemoryStore {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn push_header(&mut self, header_hex: &str, height: u64) -> Result<()> {
        self.headers.push((header_hex.to_owned(), height));
        Ok(())
    }

    fn pop_header(&mut self) -> Result<()> {
        self.headers.pop();
        Ok(())
    }

    fn all_headers(&self) -> Result<Vec<String>> {
        Ok(self.headers.iter().map(|(hex, _)| hex.clone()).collect())
    }

    fn address_of(&self, c_txid: &str, c_index: u32) -> Result<Option<String>> {
        Ok(self
            .coins
            .get(&Self::coordinate(c_txid, c_index))
            .map(|coin| coin.address.clone()))
    }

    fn add_coin(
        &mut self,
        address: &str,
        c_txid: &str,
        c_index: u32,
        value: u64,
        height: u64,
    ) -> Result<()> {
        let coordinate = Self::coordinate(c_txid, c_index);
        self.coins.insert(
            coordinate.clone(),
            Coin {
                c_txid: c_txid.to_owned(),
                c_index,
                address: address.to_owned(),
                value,
                c_height: height,
                s_txid: None,
                s_height: 0,
            },
        );
        self.by_address
            .entry(address.to_owned())
            .or_default()
            .insert(coordinate);
        Ok(())
    }

    fn remove_coin(&mut self, c_txid: &str, c_index: u32) -> Result<()> {
        let coordinate = Self::coordinate(c_txid, c_index);
        if let Some(coin) = self.coins.remove(&coordinate) {
            if let Some(set) = self.by_address.get_mut(&coin.address) {
                set.remove(&coordinate);
                if set.is_empty() {
                    self.by_address.remove(&coin.address);
                }
            }
        }
        Ok(())
    }

    fn set_spent(
        &mut self,
        c_txid: &str,
        c_index: u32,
        s_txid: &str,
        s_height: u64,
    ) -> Result<()> {
        let coin = self
            .coins
            .get_mut(&Self::coordinate(c_txid, c_index))
            .ok_or_else(|| StoreError::Backend(format!("no coin row {c_txid}:{c_index}")))?;
        coin.s_txid = Some(s_txid.to_owned());
        coin.s_height = s_height;
        Ok(())
    }

    fn set_unspent(&mut self, c_txid: &str, c_index: u32) -> Result<()> {
        let coin = self
            .coins
            .get_mut(&Self::coordinate(c_txid, c_index))
            .ok_or_else(|| StoreError::Backend(format!("no coin row {c_txid}:{c_index}")))?;
        coin.s_txid = None;
        coin.s_height = 0;
        Ok(())
    }

    fn coins_for(&self, address: &str) -> Result<Vec<Coin>> {
        let Some(coordinates) = self.by_address.get(address) else {
            return Ok(Vec::new());
        };
        Ok(coordinates
            .iter()
            .filter_map(|coordinate| self.coins.get(coordinate))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";
    const SPENDER: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";

    #[test]
    fn add_spend_unspend_round_trip() {
        let mut store = MemoryStore::new();
        store.initialize().unwrap();
        store.add_coin("addr", TXID, 0, 5_000_000_000, 7).unwrap();

        assert_eq!(store.address_of(TXID, 0).unwrap().as_deref(), Some("addr"));
        assert_eq!(store.address_of(TXID, 1).unwrap(), None);

        store.set_spent(TXID, 0, SPENDER, 9).unwrap();
        let coins = store.coins_for("addr").unwrap();
        assert_eq!(coins.len(), 1);
        assert_eq!(coins[0].s_txid.as_deref(), Some(SPENDER));
        assert_eq!(coins[0].s_height, 9);

        store.set_unspent(TXID, 0).unwrap();
        let coins = store.coins_for("addr").unwrap();
        assert_eq!(coins[0].s_txid, None);
        assert_eq!(coins[0].s_height, 0);
    }

    #[test]
    fn remove_coin_clears_address_index() {
        let mut store = MemoryStore::new();
        store.add_coin("addr", TXID, 0, 100, 1).unwrap();
        store.remove_coin(TXID, 0).unwrap();

        assert_eq!(store.address_of(TXID, 0).unwrap(), None);
        assert!(store.coins_for("addr").unwrap().is_empty());
    }

    #[test]
    fn set_spent_on_missing_row_is_a_backend_error() {
        let mut store = MemoryStore::new();
        assert!(store.set_spent(TXID, 3, SPENDER, 1).is_err());
    }

    #[test]
    fn header_log_is_ordered() {
        let mut store = MemoryStore::new();
        store.push_header("aa", 0).unwrap();
        store.push_header("bb", 1).unwrap();
        assert_eq!(store.all_headers().unwrap(), vec!["aa", "bb"]);
        store.pop_header().unwrap();
        assert_eq!(store.all_headers().unwrap(), vec!["aa"]);
    }
}
