//! NUT-07: Token state check
//!
//! <https://github.com/cashubtc/nuts/blob/main/07.md>

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut01::PublicKey;

/// NUT-07 error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Unknown proof state
    #[error("Unknown state")]
    UnknownState,
}

/// State of a proof
///
/// Transitions are monotone: UNSPENT may become PENDING or SPENT; nothing
/// returns to UNSPENT except through restore.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    /// Proof is spendable
    Unspent,
    /// Proof is part of an in-flight transaction
    Pending,
    /// Proof has been redeemed
    Spent,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unspent => "UNSPENT",
            Self::Pending => "PENDING",
            Self::Spent => "SPENT",
        };
        write!(f, "{s}")
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(state: &str) -> Result<Self, Self::Err> {
        match state {
            "UNSPENT" => Ok(Self::Unspent),
            "PENDING" => Ok(Self::Pending),
            "SPENT" => Ok(Self::Spent),
            _ => Err(Error::UnknownState),
        }
    }
}

/// Check state request [NUT-07]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStateRequest {
    /// `Y = hash_to_curve(secret)` of the proofs to check
    #[serde(rename = "Ys")]
    pub ys: Vec<PublicKey>,
}

/// State of one proof as the mint sees it [NUT-07]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofState {
    /// `Y` of the proof
    #[serde(rename = "Y")]
    pub y: PublicKey,
    /// State of the proof
    pub state: State,
    /// Witness data if supplied
    pub witness: Option<String>,
}

/// Check state response [NUT-07]
///
/// States come back in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStateResponse {
    /// Proof states
    pub states: Vec<ProofState>,
}
