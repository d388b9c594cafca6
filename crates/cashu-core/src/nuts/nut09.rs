//! NUT-09: Restore signatures
//!
//! <https://github.com/cashubtc/nuts/blob/main/09.md>

use serde::{Deserialize, Serialize};

use super::nut00::{BlindSignature, BlindedMessage};

/// Restore request [NUT-09]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    /// Outputs to look up
    pub outputs: Vec<BlindedMessage>,
}

/// Restore response [NUT-09]
///
/// `outputs` are the subset of the request the mint has signed before, and
/// `signatures[i]` is the signature for `outputs[i]` with the originally
/// signed amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    /// Outputs the mint recognized
    pub outputs: Vec<BlindedMessage>,
    /// Signatures, in output order
    pub signatures: Vec<BlindSignature>,
}
