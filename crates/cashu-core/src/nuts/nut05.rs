//! NUT-05: Melting tokens via Bolt11
//!
//! <https://github.com/cashubtc/nuts/blob/main/05.md>

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut00::{BlindSignature, BlindedMessage, CurrencyUnit, Proofs};
use crate::Amount;

/// NUT-05 error
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown quote state
    #[error("Unknown quote state")]
    UnknownState,
}

/// Melt quote state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteState {
    /// Quote has not been paid
    #[default]
    Unpaid,
    /// Lightning payment is in flight
    Pending,
    /// Invoice has been paid and inputs are burned
    Paid,
}

impl fmt::Display for QuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "UNPAID"),
            Self::Pending => write!(f, "PENDING"),
            Self::Paid => write!(f, "PAID"),
        }
    }
}

impl FromStr for QuoteState {
    type Err = Error;

    fn from_str(state: &str) -> Result<Self, Self::Err> {
        match state {
            "UNPAID" => Ok(Self::Unpaid),
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            _ => Err(Error::UnknownState),
        }
    }
}

/// Melt quote request [NUT-05]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteBolt11Request {
    /// Bolt11 invoice to be paid
    pub request: String,
    /// Unit wallet will pay with
    pub unit: CurrencyUnit,
}

/// Melt quote response [NUT-05]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteBolt11Response {
    /// Quote id
    pub quote: String,
    /// Amount the invoice is for, in the quote unit
    pub amount: Amount,
    /// Fee the mint reserves for the Lightning payment
    pub fee_reserve: Amount,
    /// Quote state
    pub state: QuoteState,
    /// Unix timestamp the quote is valid until
    pub expiry: Option<u64>,
    /// Preimage of the paid invoice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_preimage: Option<String>,
    /// Change for overpaid fee reserve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Vec<BlindSignature>>,
}

/// Melt request [NUT-05]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltBolt11Request {
    /// Quote id
    pub quote: String,
    /// Proofs being burned
    pub inputs: Proofs,
    /// Outputs the mint signs change for the unspent fee reserve with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<BlindedMessage>>,
}
