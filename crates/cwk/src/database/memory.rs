//! In-memory wallet database
//!
//! For tests and throwaway wallets. Not persistent: the safe-state gate
//! will refuse to derive outputs against it until counters are restored.

use std::collections::HashMap;

use async_trait::async_trait;
use cashu_core::nuts::{Id, KeySet, KeySetInfo, Keys, MintInfo, PublicKey, State};
use cashu_core::util::unix_time;
use tokio::sync::RwLock;

use super::{Error, WalletDatabase};
use crate::wallet::types::{MeltQuote, MintQuote, ProofInfo, WalletId};

#[derive(Debug, Default)]
struct WalletTables {
    mint_info: Option<MintInfo>,
    keysets: Vec<KeySetInfo>,
    keys: HashMap<Id, Keys>,
    mint_quotes: HashMap<String, MintQuote>,
    melt_quotes: HashMap<String, MeltQuote>,
    proofs: HashMap<[u8; 33], ProofInfo>,
    counters: HashMap<Id, u32>,
}

/// In-memory wallet database
#[derive(Debug, Default)]
pub struct WalletMemoryDatabase {
    wallets: RwLock<HashMap<WalletId, WalletTables>>,
}

impl WalletMemoryDatabase {
    /// Create an empty [`WalletMemoryDatabase`]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletDatabase for WalletMemoryDatabase {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn add_mint(
        &self,
        wallet_id: &WalletId,
        mint_info: Option<MintInfo>,
    ) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        wallets.entry(wallet_id.clone()).or_default().mint_info = mint_info;
        Ok(())
    }

    async fn get_mint(&self, wallet_id: &WalletId) -> Result<Option<MintInfo>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .and_then(|tables| tables.mint_info.clone()))
    }

    async fn add_mint_keysets(
        &self,
        wallet_id: &WalletId,
        keysets: Vec<KeySetInfo>,
    ) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        let tables = wallets.entry(wallet_id.clone()).or_default();
        for keyset in keysets {
            match tables.keysets.iter_mut().find(|k| k.id == keyset.id) {
                Some(existing) => *existing = keyset,
                None => tables.keysets.push(keyset),
            }
        }
        Ok(())
    }

    async fn get_mint_keysets(&self, wallet_id: &WalletId) -> Result<Vec<KeySetInfo>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .map(|tables| tables.keysets.clone())
            .unwrap_or_default())
    }

    async fn get_keyset_by_id(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
    ) -> Result<Option<KeySetInfo>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .and_then(|tables| tables.keysets.iter().find(|k| &k.id == keyset_id).cloned()))
    }

    async fn add_keys(&self, wallet_id: &WalletId, keyset: KeySet) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(wallet_id.clone())
            .or_default()
            .keys
            .insert(keyset.id, keyset.keys);
        Ok(())
    }

    async fn get_keys(&self, wallet_id: &WalletId, id: &Id) -> Result<Option<Keys>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .and_then(|tables| tables.keys.get(id).cloned()))
    }

    async fn add_mint_quote(&self, wallet_id: &WalletId, quote: MintQuote) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(wallet_id.clone())
            .or_default()
            .mint_quotes
            .insert(quote.id.clone(), quote);
        Ok(())
    }

    async fn get_mint_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Option<MintQuote>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .and_then(|tables| tables.mint_quotes.get(quote_id).cloned()))
    }

    async fn get_mint_quotes(&self, wallet_id: &WalletId) -> Result<Vec<MintQuote>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .map(|tables| tables.mint_quotes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_mint_quote(&self, wallet_id: &WalletId, quote_id: &str) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        if let Some(tables) = wallets.get_mut(wallet_id) {
            tables.mint_quotes.remove(quote_id);
        }
        Ok(())
    }

    async fn add_melt_quote(&self, wallet_id: &WalletId, quote: MeltQuote) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(wallet_id.clone())
            .or_default()
            .melt_quotes
            .insert(quote.id.clone(), quote);
        Ok(())
    }

    async fn get_melt_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Option<MeltQuote>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .and_then(|tables| tables.melt_quotes.get(quote_id).cloned()))
    }

    async fn remove_melt_quote(&self, wallet_id: &WalletId, quote_id: &str) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        if let Some(tables) = wallets.get_mut(wallet_id) {
            tables.melt_quotes.remove(quote_id);
        }
        Ok(())
    }

    async fn update_proofs(
        &self,
        wallet_id: &WalletId,
        added: Vec<ProofInfo>,
        spent_ys: Vec<PublicKey>,
    ) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        let tables = wallets.entry(wallet_id.clone()).or_default();

        for info in added {
            tables.proofs.insert(info.y.to_bytes(), info);
        }

        let spent_at = unix_time();
        for y in spent_ys {
            if let Some(info) = tables.proofs.get_mut(&y.to_bytes()) {
                info.state = State::Spent;
                info.spent_at = Some(spent_at);
            }
        }

        Ok(())
    }

    async fn get_proofs(
        &self,
        wallet_id: &WalletId,
        states: Option<Vec<State>>,
    ) -> Result<Vec<ProofInfo>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .map(|tables| {
                tables
                    .proofs
                    .values()
                    .filter(|info| {
                        states
                            .as_ref()
                            .map(|states| states.contains(&info.state))
                            .unwrap_or(true)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_proofs_by_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Vec<ProofInfo>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .map(|tables| {
                tables
                    .proofs
                    .values()
                    .filter(|info| info.mint_quote_id.as_deref() == Some(quote_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_proofs_state(
        &self,
        wallet_id: &WalletId,
        ys: Vec<PublicKey>,
        state: State,
    ) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        if let Some(tables) = wallets.get_mut(wallet_id) {
            let spent_at = unix_time();
            for y in ys {
                if let Some(info) = tables.proofs.get_mut(&y.to_bytes()) {
                    info.state = state;
                    if state == State::Spent {
                        info.spent_at = Some(spent_at);
                    }
                }
            }
        }
        Ok(())
    }

    async fn remove_proofs(&self, wallet_id: &WalletId, ys: Vec<PublicKey>) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        if let Some(tables) = wallets.get_mut(wallet_id) {
            for y in ys {
                tables.proofs.remove(&y.to_bytes());
            }
        }
        Ok(())
    }

    async fn get_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
    ) -> Result<u32, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .and_then(|tables| tables.counters.get(keyset_id).copied())
            .unwrap_or(0))
    }

    async fn increment_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
        count: u32,
    ) -> Result<u32, Error> {
        // The write lock makes the read+write atomic
        let mut wallets = self.wallets.write().await;
        let counter = wallets
            .entry(wallet_id.clone())
            .or_default()
            .counters
            .entry(*keyset_id)
            .or_insert(0);
        *counter = counter
            .checked_add(count)
            .ok_or_else(|| Error::Internal("keyset counter overflow".to_string()))?;
        Ok(*counter)
    }

    async fn set_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
        counter: u32,
    ) -> Result<(), Error> {
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(wallet_id.clone())
            .or_default()
            .counters
            .insert(*keyset_id, counter);
        Ok(())
    }

    async fn get_keyset_counters(
        &self,
        wallet_id: &WalletId,
    ) -> Result<HashMap<Id, u32>, Error> {
        let wallets = self.wallets.read().await;
        Ok(wallets
            .get(wallet_id)
            .map(|tables| tables.counters.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use cashu_core::nuts::CurrencyUnit;
    use cashu_core::MintUrl;

    use super::*;

    fn wallet_id() -> WalletId {
        WalletId::new(
            &MintUrl::from_str("https://mint.example").unwrap(),
            &CurrencyUnit::Sat,
        )
    }

    #[tokio::test]
    async fn test_counter_advance_is_unique_and_increasing() {
        let db = WalletMemoryDatabase::new();
        let wallet_id = wallet_id();
        let keyset_id = Id::from_str("009a1f293253e41e").unwrap();

        let mut seen = Vec::new();
        for count in [1, 3, 2, 5] {
            let new = db
                .increment_keyset_counter(&wallet_id, &keyset_id, count)
                .await
                .unwrap();
            seen.push(new);
        }

        assert_eq!(seen, vec![1, 4, 6, 11]);
        assert_eq!(
            db.get_keyset_counter(&wallet_id, &keyset_id).await.unwrap(),
            11
        );
    }

    #[tokio::test]
    async fn test_counters_partitioned_by_wallet() {
        let db = WalletMemoryDatabase::new();
        let keyset_id = Id::from_str("009a1f293253e41e").unwrap();

        let sat = wallet_id();
        let usd = WalletId::new(
            &MintUrl::from_str("https://mint.example").unwrap(),
            &CurrencyUnit::Usd,
        );

        db.increment_keyset_counter(&sat, &keyset_id, 5).await.unwrap();

        assert_eq!(db.get_keyset_counter(&usd, &keyset_id).await.unwrap(), 0);
    }
}
