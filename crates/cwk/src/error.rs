//! Wallet errors

use cashu_core::nuts::{CurrencyUnit, Id};
use cashu_core::{Amount, MintUrl};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wallet error
#[derive(Debug, Error)]
pub enum Error {
    /// Operation needs a seed and none was initialized
    #[error("Wallet has no seed; initialize from a mnemonic first")]
    NoSeed,
    /// Seed present but counters would not be durable
    ///
    /// Producing outputs now could reuse a counter on the next run and
    /// permanently strand funds, so the wallet refuses.
    #[error("Counters are not durable; configure storage or restore counters first")]
    UnsafeState,
    /// Generating a mnemonic without durable storage would orphan its counters
    #[error("Storage required")]
    StorageRequired,
    /// Mnemonic failed checksum or wordlist validation
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(#[from] bip39::Error),
    /// Mint offers no active keyset for the wallet's unit
    #[error("No active keyset for unit `{unit}`")]
    NoActiveKeyset {
        /// Wallet unit
        unit: CurrencyUnit,
        /// Units the mint does offer
        available: Vec<CurrencyUnit>,
    },
    /// Keyset is not known
    #[error("Keyset id not known: `{0}`")]
    UnknownKeyset(Id),
    /// Fetched keys do not hash to the advertised keyset id
    #[error("Keys do not match keyset id `{0}`")]
    KeysetIdMismatch(Id),
    /// Mint has no key for an amount
    #[error("No key for amount {amount} in keyset `{keyset_id}`")]
    UnknownAmount {
        /// Keyset the key was looked up in
        keyset_id: Id,
        /// Amount with no key
        amount: Amount,
    },
    /// Token was issued by a different mint
    #[error("Wrong mint: expected `{expected}`, got `{got}`")]
    WrongMint {
        /// Mint this wallet is bound to
        expected: MintUrl,
        /// Mint in the token
        got: MintUrl,
    },
    /// Token unit does not match the wallet unit
    #[error("Unsupported unit")]
    UnsupportedUnit,
    /// Inputs minus fee do not equal requested outputs
    #[error("Input and output amounts do not balance")]
    AmountMismatch,
    /// Not enough value to cover the target
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientFunds {
        /// Spendable value
        have: Amount,
        /// Value needed
        need: Amount,
    },
    /// Quote is not in the store
    #[error("Unknown quote: `{0}`")]
    UnknownQuote(String),
    /// Quote expired before it was used
    #[error("Quote expired at {0}")]
    ExpiredQuote(u64),
    /// Bolt11 invoice carries no amount
    #[error("Invoice amount undefined")]
    InvoiceAmountUndefined,
    /// Invoice could not be parsed
    #[error("Invalid invoice: {0}")]
    Invoice(String),
    /// Mint quoted a different amount than the invoice asks for
    #[error("Incorrect quote amount: expected {expected}, got {got}")]
    IncorrectQuoteAmount {
        /// Amount of the invoice
        expected: Amount,
        /// Amount the mint quoted
        got: Amount,
    },
    /// Signature DLEQ did not verify
    #[error("Could not verify DLEQ proof")]
    CouldNotVerifyDleq,
    /// Mint answered with an error body
    #[error("Mint error: {detail}")]
    Protocol {
        /// Protocol error code
        code: Option<i32>,
        /// Human readable detail
        detail: String,
    },
    /// Transport failure talking to the mint
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    /// Database error
    #[error(transparent)]
    Database(#[from] crate::database::Error),
    /// Lightning address error
    #[error(transparent)]
    LightningAddress(#[from] crate::lightning_address::Error),
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] cashu_core::dhke::Error),
    /// Amount error
    #[error(transparent)]
    Amount(#[from] cashu_core::amount::Error),
    /// NUT-00 error
    #[error(transparent)]
    Nut00(#[from] cashu_core::nuts::nut00::Error),
    /// NUT-01 error
    #[error(transparent)]
    Nut01(#[from] cashu_core::nuts::nut01::Error),
    /// NUT-02 error
    #[error(transparent)]
    Nut02(#[from] cashu_core::nuts::nut02::Error),
    /// NUT-12 error
    #[error(transparent)]
    Nut12(#[from] cashu_core::nuts::nut12::Error),
    /// NUT-13 error
    #[error(transparent)]
    Nut13(#[from] cashu_core::nuts::nut13::Error),
    /// Bip32 error
    #[error(transparent)]
    Bip32(#[from] bitcoin::bip32::Error),
    /// Mint url error
    #[error(transparent)]
    MintUrl(#[from] cashu_core::mint_url::Error),
}

/// Error body of a mint response with status >= 400
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable detail
    #[serde(default)]
    pub detail: Option<String>,
    /// Protocol error code
    #[serde(default)]
    pub code: Option<i32>,
}

impl From<ErrorResponse> for Error {
    fn from(response: ErrorResponse) -> Self {
        Error::Protocol {
            code: response.code,
            detail: response
                .detail
                .unwrap_or_else(|| "mint returned an error".to_string()),
        }
    }
}
