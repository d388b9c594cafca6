//! NUT-18: Payment requests
//!
//! `creqA` + unpadded base64url(CBOR).
//!
//! <https://github.com/cashubtc/nuts/blob/main/18.md>

use std::fmt;
use std::str::FromStr;

use bitcoin::base64::engine::{general_purpose, GeneralPurpose};
use bitcoin::base64::{alphabet, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mint_url::MintUrl;
use crate::nuts::CurrencyUnit;
use crate::Amount;

const PAYMENT_REQUEST_PREFIX: &str = "creqA";

/// NUT-18 error
#[derive(Debug, Error)]
pub enum Error {
    /// Payment requests start with `creqA`
    #[error("Invalid prefix")]
    InvalidPrefix,
    /// Base64 error
    #[error(transparent)]
    Base64(#[from] bitcoin::base64::DecodeError),
    /// Ciborium deserialization error
    #[error(transparent)]
    CiboriumDe(#[from] ciborium::de::Error<std::io::Error>),
    /// Ciborium serialization error
    #[error(transparent)]
    CiboriumSer(#[from] ciborium::ser::Error<std::io::Error>),
}

/// Transport over which a payment can be delivered
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    /// Transport type, e.g. `nostr` or `post`
    #[serde(rename = "t")]
    pub _type: String,
    /// Where to send the payment
    #[serde(rename = "a")]
    pub target: String,
    /// Transport-specific tags
    #[serde(rename = "g", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Vec<String>>>,
}

/// Payment request [NUT-18]
#[derive(Debug, Clone, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Payment id
    #[serde(rename = "i", skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    /// Amount requested
    #[serde(rename = "a", skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    /// Unit of the amount
    #[serde(rename = "u", skip_serializing_if = "Option::is_none")]
    pub unit: Option<CurrencyUnit>,
    /// Whether the request may be paid only once
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub single_use: Option<bool>,
    /// Mints the payer may use
    #[serde(rename = "m", skip_serializing_if = "Option::is_none")]
    pub mints: Option<Vec<MintUrl>>,
    /// Description
    #[serde(rename = "d", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Transports, in order of preference
    #[serde(rename = "t", skip_serializing_if = "Vec::is_empty", default)]
    pub transports: Vec<Transport>,
}

impl fmt::Display for PaymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use serde::ser::Error;
        let mut data = Vec::new();
        ciborium::into_writer(self, &mut data).map_err(|e| fmt::Error::custom(e.to_string()))?;
        let encoded = general_purpose::URL_SAFE_NO_PAD.encode(data);
        write!(f, "{PAYMENT_REQUEST_PREFIX}{encoded}")
    }
}

impl FromStr for PaymentRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s
            .strip_prefix(PAYMENT_REQUEST_PREFIX)
            .ok_or(Error::InvalidPrefix)?;

        let decode_config = general_purpose::GeneralPurposeConfig::new()
            .with_decode_padding_mode(bitcoin::base64::engine::DecodePaddingMode::Indifferent);
        let decoded = GeneralPurpose::new(&alphabet::URL_SAFE, decode_config).decode(s)?;

        Ok(ciborium::from_reader(&decoded[..])?)
    }
}
