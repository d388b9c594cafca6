//! Wallet types

use core::fmt;

use bitcoin::hashes::{sha256, Hash};
use cashu_core::nuts::{CurrencyUnit, MeltQuoteState, MintQuoteState, Proof, Proofs, PublicKey, State};
use cashu_core::util::{hex, unix_time};
use cashu_core::{Amount, MintUrl};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Store-scoped wallet identifier
///
/// First 16 hex characters of `SHA-256(mint_url || ":" || unit)`. Partitions
/// one physical database between wallets; distinct mints or units never
/// share proof or counter rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    /// Derive the id for a `(mint_url, unit)` pair
    pub fn new(mint_url: &MintUrl, unit: &CurrencyUnit) -> Self {
        let hash = sha256::Hash::hash(format!("{mint_url}:{unit}").as_bytes());
        Self(hex::encode(&hash.to_byte_array()[..8]))
    }

    /// Id as a str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proof row as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInfo {
    /// Proof
    pub proof: Proof,
    /// `y = hash_to_curve(secret)`, the row key
    pub y: PublicKey,
    /// Proof state
    pub state: State,
    /// Unit
    pub unit: CurrencyUnit,
    /// Mint quote the proof was issued under, for crash recovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_quote_id: Option<String>,
    /// Unix timestamp the row was created
    pub created_at: u64,
    /// Unix timestamp the proof was marked spent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent_at: Option<u64>,
}

impl ProofInfo {
    /// Create new [`ProofInfo`]
    pub fn new(proof: Proof, state: State, unit: CurrencyUnit) -> Result<Self, Error> {
        let y = proof.y()?;
        Ok(Self {
            proof,
            y,
            state,
            unit,
            mint_quote_id: None,
            created_at: unix_time(),
            spent_at: None,
        })
    }

    /// Create new [`ProofInfo`] tagged with the mint quote that produced it
    pub fn new_for_quote(
        proof: Proof,
        state: State,
        unit: CurrencyUnit,
        mint_quote_id: Option<String>,
    ) -> Result<Self, Error> {
        let mut info = Self::new(proof, state, unit)?;
        info.mint_quote_id = mint_quote_id;
        Ok(info)
    }
}

/// Mint quote as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    /// Quote id
    pub id: String,
    /// Amount of the quote
    pub amount: Amount,
    /// Unit of the quote
    pub unit: CurrencyUnit,
    /// Bolt11 invoice to pay
    pub request: String,
    /// Quote state
    pub state: MintQuoteState,
    /// Unix timestamp the quote is valid until, zero when the mint gave none
    pub expiry: u64,
}

/// Melt quote as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuote {
    /// Quote id
    pub id: String,
    /// Amount to be paid, in the wallet unit
    pub amount: Amount,
    /// Bolt11 invoice being paid
    pub request: String,
    /// Unit of the quote
    pub unit: CurrencyUnit,
    /// Fee the mint reserves for the Lightning payment
    pub fee_reserve: Amount,
    /// Quote state
    pub state: MeltQuoteState,
    /// Unix timestamp the quote is valid until
    pub expiry: u64,
    /// Preimage of the paid invoice
    pub payment_preimage: Option<String>,
}

/// Result of a melt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Melted {
    /// Final quote state
    pub state: MeltQuoteState,
    /// Preimage of the paid invoice
    pub preimage: Option<String>,
    /// Change proofs for the unspent fee reserve
    pub change: Proofs,
    /// Amount paid to the invoice
    pub amount: Amount,
    /// Lightning fee actually consumed
    pub fee_paid: Amount,
}

impl Melted {
    /// Whether the invoice was paid
    pub fn paid(&self) -> bool {
        self.state == MeltQuoteState::Paid
    }
}
