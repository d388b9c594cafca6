//! Wallet storage
//!
//! The store owns the two invariants the rest of the wallet leans on:
//! counter advances never hand out a value twice, and the outputs of one
//! protocol round are persisted all together or not at all.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use cashu_core::nuts::{Id, KeySet, KeySetInfo, Keys, MintInfo, PublicKey, State};
use thiserror::Error;

use crate::wallet::types::{MeltQuote, MintQuote, ProofInfo, WalletId};

mod memory;

pub use memory::WalletMemoryDatabase;

/// Database error
#[derive(Debug, Error)]
pub enum Error {
    /// Backend error
    #[error(transparent)]
    Database(Box<dyn std::error::Error + Send + Sync>),
    /// Row could not be (de)serialized
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Invariant violation inside the store
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Wallet database
///
/// All rows are partitioned by [`WalletId`]; one physical database may host
/// many wallets without cross-contamination.
#[async_trait]
pub trait WalletDatabase: Debug {
    /// Whether rows survive a process restart
    ///
    /// The safe-state gate refuses to derive outputs against an ephemeral
    /// store unless counters were explicitly restored.
    fn is_persistent(&self) -> bool;

    /// Store mint info
    async fn add_mint(&self, wallet_id: &WalletId, mint_info: Option<MintInfo>)
        -> Result<(), Error>;
    /// Get mint info
    async fn get_mint(&self, wallet_id: &WalletId) -> Result<Option<MintInfo>, Error>;

    /// Store the mint's keyset listing
    async fn add_mint_keysets(
        &self,
        wallet_id: &WalletId,
        keysets: Vec<KeySetInfo>,
    ) -> Result<(), Error>;
    /// Keyset listing as last fetched
    async fn get_mint_keysets(&self, wallet_id: &WalletId) -> Result<Vec<KeySetInfo>, Error>;
    /// Keyset info by id
    async fn get_keyset_by_id(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
    ) -> Result<Option<KeySetInfo>, Error>;

    /// Store the keys of a keyset
    async fn add_keys(&self, wallet_id: &WalletId, keyset: KeySet) -> Result<(), Error>;
    /// Keys of a keyset
    async fn get_keys(&self, wallet_id: &WalletId, id: &Id) -> Result<Option<Keys>, Error>;

    /// Store a mint quote
    async fn add_mint_quote(&self, wallet_id: &WalletId, quote: MintQuote) -> Result<(), Error>;
    /// Mint quote by id
    async fn get_mint_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Option<MintQuote>, Error>;
    /// All mint quotes of the wallet
    async fn get_mint_quotes(&self, wallet_id: &WalletId) -> Result<Vec<MintQuote>, Error>;
    /// Remove a mint quote
    async fn remove_mint_quote(&self, wallet_id: &WalletId, quote_id: &str) -> Result<(), Error>;

    /// Store a melt quote
    async fn add_melt_quote(&self, wallet_id: &WalletId, quote: MeltQuote) -> Result<(), Error>;
    /// Melt quote by id
    async fn get_melt_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Option<MeltQuote>, Error>;
    /// Remove a melt quote
    async fn remove_melt_quote(&self, wallet_id: &WalletId, quote_id: &str) -> Result<(), Error>;

    /// Commit one protocol round: insert `added` and mark `spent_ys` SPENT,
    /// stamping `spent_at`, atomically
    ///
    /// Inserts are upserts keyed on `y`; storing the same proof twice is
    /// idempotent.
    async fn update_proofs(
        &self,
        wallet_id: &WalletId,
        added: Vec<ProofInfo>,
        spent_ys: Vec<PublicKey>,
    ) -> Result<(), Error>;
    /// Proof rows, optionally filtered by state
    async fn get_proofs(
        &self,
        wallet_id: &WalletId,
        states: Option<Vec<State>>,
    ) -> Result<Vec<ProofInfo>, Error>;
    /// Proof rows created under a mint quote
    ///
    /// Crash recovery: a caller that died between persist and return asks
    /// here whether its quote was already redeemed.
    async fn get_proofs_by_quote(
        &self,
        wallet_id: &WalletId,
        quote_id: &str,
    ) -> Result<Vec<ProofInfo>, Error>;
    /// Set the state of proof rows, stamping `spent_at` on SPENT
    async fn update_proofs_state(
        &self,
        wallet_id: &WalletId,
        ys: Vec<PublicKey>,
        state: State,
    ) -> Result<(), Error>;
    /// Delete proof rows
    async fn remove_proofs(&self, wallet_id: &WalletId, ys: Vec<PublicKey>) -> Result<(), Error>;

    /// Current counter of a keyset, zero if never advanced
    async fn get_keyset_counter(&self, wallet_id: &WalletId, keyset_id: &Id)
        -> Result<u32, Error>;
    /// Atomically advance a keyset counter by `count`, returning the new
    /// value
    ///
    /// The caller consumed `[new - count, new)`. Under concurrent callers
    /// no value is ever handed out twice.
    async fn increment_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
        count: u32,
    ) -> Result<u32, Error>;
    /// Overwrite a keyset counter; restore only
    async fn set_keyset_counter(
        &self,
        wallet_id: &WalletId,
        keyset_id: &Id,
        counter: u32,
    ) -> Result<(), Error>;
    /// All counters of the wallet
    async fn get_keyset_counters(&self, wallet_id: &WalletId) -> Result<HashMap<Id, u32>, Error>;
}
