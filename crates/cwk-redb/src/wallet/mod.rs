//! Redb wallet database

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cashu_core::nuts::{Id, KeySet, KeySetInfo, Keys, MintInfo, PublicKey, State};
use cashu_core::util::unix_time;
use cwk::database::{self, WalletDatabase};
use cwk::wallet::types::{MeltQuote, MintQuote, ProofInfo, WalletId};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::instrument;

use crate::error::Error;

// <wallet_id, MintInfo json>
const MINTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("mints");
// <(wallet_id, keyset_id), KeySetInfo json>
const KEYSETS_TABLE: TableDefinition<(&str, &str), &str> = TableDefinition::new("keysets");
// <(wallet_id, keyset_id), Keys json>
const MINT_KEYS_TABLE: TableDefinition<(&str, &str), &str> = TableDefinition::new("mint_keys");
// <(wallet_id, quote_id), MintQuote json>
const MINT_QUOTES_TABLE: TableDefinition<(&str, &str), &str> = TableDefinition::new("mint_quotes");
// <(wallet_id, quote_id), MeltQuote json>
const MELT_QUOTES_TABLE: TableDefinition<(&str, &str), &str> = TableDefinition::new("melt_quotes");
// <(wallet_id, y), ProofInfo json>
const PROOFS_TABLE: TableDefinition<(&str, &[u8]), &str> = TableDefinition::new("proofs");
// <(wallet_id, keyset_id), counter>
const KEYSET_COUNTER_TABLE: TableDefinition<(&str, &str), u32> =
    TableDefinition::new("keyset_counter");
const CONFIG_TABLE: TableDefinition<&str, &str> = TableDefinition::new("config");

const DATABASE_VERSION: u32 = 1;

/// Redb wallet database
///
/// Hosts any number of wallets, partitioned by [`WalletId`] in every table
/// key.
#[derive(Debug, Clone)]
pub struct WalletRedbDatabase {
    db: Arc<Database>,
}

impl WalletRedbDatabase {
    /// Open or create the database at `path`
    pub fn new(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Parent directory does not exist: {parent:?}"),
                )));
            }
        }

        let db = Database::create(path)?;

        let db_version: Option<u32>;
        {
            let read_txn = db.begin_read()?;
            db_version = match read_txn.open_table(CONFIG_TABLE) {
                Ok(table) => table
                    .get("db_version")?
                    .map(|version| version.value().parse().unwrap_or(0)),
                Err(_) => None,
            };
        }

        match db_version {
            Some(version) if version == DATABASE_VERSION => {}
            Some(version) => {
                tracing::warn!(
                    "Database version {} does not match supported version {}",
                    version,
                    DATABASE_VERSION
                );
                return Err(Error::UnknownDatabaseVersion);
            }
            None => {
                let write_txn = db.begin_write()?;
                {
                    let mut config = write_txn.open_table(CONFIG_TABLE)?;
                    // Open all tables so an empty file has the full schema
                    let _ = write_txn.open_table(MINTS_TABLE)?;
                    let _ = write_txn.open_table(KEYSETS_TABLE)?;
                    let _ = write_txn.open_table(MINT_KEYS_TABLE)?;
                    let _ = write_txn.open_table(MINT_QUOTES_TABLE)?;
                    let _ = write_txn.open_table(MELT_QUOTES_TABLE)?;
                    let _ = write_txn.open_table(PROOFS_TABLE)?;
                    let _ = write_txn.open_table(KEYSET_COUNTER_TABLE)?;
                    config.insert("db_version", DATABASE_VERSION.to_string().as_str())?;
                }
                write_txn.commit()?;
            }
        }

        Ok(Self { db: Arc::new(db) })
    }

    fn insert_json<V>(
        &self,
        table: TableDefinition<(&str, &str), &str>,
        wallet_id: &WalletId,
        key: &str,
        value: &V,
    ) -> Result<(), Error>
    where
        V: serde::Serialize,
    {
        let json = serde_json::to_string(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert((wallet_id.as_str(), key), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_json<V>(
        &self,
        table: TableDefinition<(&str, &str), &str>,
        wallet_id: &WalletId,
        key: &str,
    ) -> Result<Option<V>, Error>
    where
        V: serde::de::DeserializeOwned,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        match table.get((wallet_id.as_str(), key))? {
            Some(value) => Ok(Some(serde_json::from_str(value.value())?)),
            None => Ok(None),
        }
    }

    fn remove_row(
        &self,
        table: TableDefinition<(&str, &str), &str>,
        wallet_id: &WalletId,
        key: &str,
    ) -> Result<(), Error> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.remove((wallet_id.as_str(), key))?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// All values of one wallet in a `(&str, &str)` keyed table
    fn scan_json<V>(
        &self,
        table: TableDefinition<(&str, &str), &str>,
        wallet_id: &WalletId,
    ) -> Result<Vec<V>, Error>
    where
        V: serde::de::DeserializeOwned,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;

        let mut values = Vec::new();
        for row in table.range((wallet_id.as_str(), "")..)? {
            let (key, value) = row?;
            if key.value().0 != wallet_id.as_str() {
                break;
            }
            values.push(serde_json::from_str(value.value())?);
        }
        Ok(values)
    }
}

#[async_trait]
impl WalletDatabase for WalletRedbDatabase {
    fn is_persistent(&self) -> bool {
        true
    }

    #[instrument(skip(self, mint_info))]
    async fn add_mint(
        &self,
        wallet_id: &WalletId,
        mint_info: Option<MintInfo>,
    ) -> Result<(), database::Error> {
        let json = serde_json::to_string(&mint_info).map_err(Error::from)?;
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(MINTS_TABLE).map_err(Error::from)?;
            table
                .insert(wallet_id.as_str(), json.as_str())
                .map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_mint(&self, wallet_id: &WalletId) -> Result<Option<MintInfo>, database::Error> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(MINTS_TABLE).map_err(Error::from)?;
        match table.get(wallet_id.as_str()).map_err(Error::from)? {
            Some(value) => Ok(serde_json::from_str(value.value()).map_err(Error::from)?),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, keysets))]
    async fn add_mint_keysets(
        &self,
        wallet_id: &WalletId,
        keysets: Vec<KeySetInfo>,
    ) -> Result<(), database::Error> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(KEYSETS_TABLE).map_err(Error::from)?;
            for keyset in keysets {
                let json = serde_json::to_string(&keyset).map_err(Error::from)?;
                table
                    .insert((wallet_id.as_str(), keyset.id.to_string().as_str()), json.as_str())
                    .map_err(Error::from)?;
            }
        }
        write_txn.commit().map_err(Error::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_mint_keysets(
        &self,
        wallet_id: &WalletId,
    ) -> Result<Vec<KeySetInfo>, database::Error> {
        Ok(self.scan_json(KEYSETS_TABLE, wallet_id)?)
    }

    #[instrument(skip(self))]
    async fn get_keyset_by_id(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
    ) -> Result<Option<KeySetInfo>, database::Error> {
        Ok(self.get_json(KEYSETS_TABLE, wallet_id, &keyset_id.to_string())?)
    }

    #[instrument(skip(self, keyset))]
    async fn add_keys(&self, wallet_id: &WalletId, keyset: KeySet) -> Result<(), database::Error> {
        Ok(self.insert_json(
            MINT_KEYS_TABLE,
            wallet_id,
            &keyset.id.to_string(),
            &keyset.keys,
        )?)
    }

    #[instrument(skip(self))]
    async fn get_keys(
        &self,
        wallet_id: &WalletId,
        id: &Id,
    ) -> Result<Option<Keys>, database::Error> {
        Ok(self.get_json(MINT_KEYS_TABLE, wallet_id, &id.to_string())?)
    }

    #[instrument(skip(self, quote))]
    async fn add_mint_quote(
        &self,
        wallet_id: &WalletId,
        quote: MintQuote,
    ) -> Result<(), database::Error> {
        Ok(self.insert_json(MINT_QUOTES_TABLE, wallet_id, &quote.id.clone(), &quote)?)
    }

    #[instrument(skip(self))]
    async fn get_mint_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Option<MintQuote>, database::Error> {
        Ok(self.get_json(MINT_QUOTES_TABLE, wallet_id, quote_id)?)
    }

    #[instrument(skip(self))]
    async fn get_mint_quotes(
        &self,
        wallet_id: &WalletId,
    ) -> Result<Vec<MintQuote>, database::Error> {
        Ok(self.scan_json(MINT_QUOTES_TABLE, wallet_id)?)
    }

    #[instrument(skip(self))]
    async fn remove_mint_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<(), database::Error> {
        Ok(self.remove_row(MINT_QUOTES_TABLE, wallet_id, quote_id)?)
    }

    #[instrument(skip(self, quote))]
    async fn add_melt_quote(
        &self,
        wallet_id: &WalletId,
        quote: MeltQuote,
    ) -> Result<(), database::Error> {
        Ok(self.insert_json(MELT_QUOTES_TABLE, wallet_id, &quote.id.clone(), &quote)?)
    }

    #[instrument(skip(self))]
    async fn get_melt_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Option<MeltQuote>, database::Error> {
        Ok(self.get_json(MELT_QUOTES_TABLE, wallet_id, quote_id)?)
    }

    #[instrument(skip(self))]
    async fn remove_melt_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<(), database::Error> {
        Ok(self.remove_row(MELT_QUOTES_TABLE, wallet_id, quote_id)?)
    }

    #[instrument(skip(self, added, spent_ys))]
    async fn update_proofs(
        &self,
        wallet_id: &WalletId,
        added: Vec<ProofInfo>,
        spent_ys: Vec<PublicKey>,
    ) -> Result<(), database::Error> {
        // One write transaction: either the whole round lands or none of it
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(PROOFS_TABLE).map_err(Error::from)?;

            for info in added {
                let json = serde_json::to_string(&info).map_err(Error::from)?;
                table
                    .insert(
                        (wallet_id.as_str(), info.y.to_bytes().as_slice()),
                        json.as_str(),
                    )
                    .map_err(Error::from)?;
            }

            let spent_at = unix_time();
            for y in spent_ys {
                let key = (wallet_id.as_str(), y.to_bytes());
                let existing = table
                    .get((key.0, key.1.as_slice()))
                    .map_err(Error::from)?
                    .map(|value| value.value().to_string());

                if let Some(json) = existing {
                    let mut info: ProofInfo =
                        serde_json::from_str(&json).map_err(Error::from)?;
                    info.state = State::Spent;
                    info.spent_at = Some(spent_at);
                    let json = serde_json::to_string(&info).map_err(Error::from)?;
                    table
                        .insert((key.0, key.1.as_slice()), json.as_str())
                        .map_err(Error::from)?;
                }
            }
        }
        write_txn.commit().map_err(Error::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_proofs(
        &self,
        wallet_id: &WalletId,
        states: Option<Vec<State>>,
    ) -> Result<Vec<ProofInfo>, database::Error> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn.open_table(PROOFS_TABLE).map_err(Error::from)?;

        let start: (&str, &[u8]) = (wallet_id.as_str(), &[]);
        let mut proofs = Vec::new();
        for row in table.range(start..).map_err(Error::from)? {
            let (key, value) = row.map_err(Error::from)?;
            if key.value().0 != wallet_id.as_str() {
                break;
            }
            let info: ProofInfo = serde_json::from_str(value.value()).map_err(Error::from)?;
            if states
                .as_ref()
                .map(|states| states.contains(&info.state))
                .unwrap_or(true)
            {
                proofs.push(info);
            }
        }
        Ok(proofs)
    }

    #[instrument(skip(self))]
    async fn get_proofs_by_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Vec<ProofInfo>, database::Error> {
        let proofs = self.get_proofs(wallet_id, None).await?;
        Ok(proofs
            .into_iter()
            .filter(|info| info.mint_quote_id.as_deref() == Some(quote_id))
            .collect())
    }

    #[instrument(skip(self, ys))]
    async fn update_proofs_state(
        &self,
        wallet_id: &WalletId,
        ys: Vec<PublicKey>,
        state: State,
    ) -> Result<(), database::Error> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(PROOFS_TABLE).map_err(Error::from)?;
            let spent_at = unix_time();

            for y in ys {
                let y_bytes = y.to_bytes();
                let existing = table
                    .get((wallet_id.as_str(), y_bytes.as_slice()))
                    .map_err(Error::from)?
                    .map(|value| value.value().to_string());

                if let Some(json) = existing {
                    let mut info: ProofInfo =
                        serde_json::from_str(&json).map_err(Error::from)?;
                    info.state = state;
                    if state == State::Spent {
                        info.spent_at = Some(spent_at);
                    }
                    let json = serde_json::to_string(&info).map_err(Error::from)?;
                    table
                        .insert((wallet_id.as_str(), y_bytes.as_slice()), json.as_str())
                        .map_err(Error::from)?;
                }
            }
        }
        write_txn.commit().map_err(Error::from)?;
        Ok(())
    }

    #[instrument(skip(self, ys))]
    async fn remove_proofs(
        &self,
        wallet_id: &WalletId,
        ys: Vec<PublicKey>,
    ) -> Result<(), database::Error> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn.open_table(PROOFS_TABLE).map_err(Error::from)?;
            for y in ys {
                table
                    .remove((wallet_id.as_str(), y.to_bytes().as_slice()))
                    .map_err(Error::from)?;
            }
        }
        write_txn.commit().map_err(Error::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
    ) -> Result<u32, database::Error> {
        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn
            .open_table(KEYSET_COUNTER_TABLE)
            .map_err(Error::from)?;
        Ok(table
            .get((wallet_id.as_str(), keyset_id.to_string().as_str()))
            .map_err(Error::from)?
            .map(|counter| counter.value())
            .unwrap_or(0))
    }

    #[instrument(skip(self))]
    async fn increment_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
        count: u32,
    ) -> Result<u32, database::Error> {
        // In-transaction read+write: concurrent advances serialize on the
        // write transaction, so a value is never handed out twice
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        let new_counter;
        {
            let mut table = write_txn
                .open_table(KEYSET_COUNTER_TABLE)
                .map_err(Error::from)?;
            let keyset_key = keyset_id.to_string();
            let current = table
                .get((wallet_id.as_str(), keyset_key.as_str()))
                .map_err(Error::from)?
                .map(|counter| counter.value())
                .unwrap_or(0);

            new_counter = current.checked_add(count).ok_or(Error::CounterOverflow)?;

            table
                .insert((wallet_id.as_str(), keyset_key.as_str()), new_counter)
                .map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;
        Ok(new_counter)
    }

    #[instrument(skip(self))]
    async fn set_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
        counter: u32,
    ) -> Result<(), database::Error> {
        let write_txn = self.db.begin_write().map_err(Error::from)?;
        {
            let mut table = write_txn
                .open_table(KEYSET_COUNTER_TABLE)
                .map_err(Error::from)?;
            table
                .insert((wallet_id.as_str(), keyset_id.to_string().as_str()), counter)
                .map_err(Error::from)?;
        }
        write_txn.commit().map_err(Error::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_keyset_counters(
        &self,
        wallet_id: &WalletId,
    ) -> Result<HashMap<Id, u32>, database::Error> {
        use std::str::FromStr;

        let read_txn = self.db.begin_read().map_err(Error::from)?;
        let table = read_txn
            .open_table(KEYSET_COUNTER_TABLE)
            .map_err(Error::from)?;

        let mut counters = HashMap::new();
        for row in table.range((wallet_id.as_str(), "")..).map_err(Error::from)? {
            let (key, value) = row.map_err(Error::from)?;
            let (row_wallet, keyset) = key.value();
            if row_wallet != wallet_id.as_str() {
                break;
            }
            let id = Id::from_str(keyset)
                .map_err(|err| database::Error::Internal(err.to_string()))?;
            counters.insert(id, value.value());
        }
        Ok(counters)
    }
}
