//! Lightning address resolution
//!
//! Resolves `user@domain` to the LNURL-pay endpoint
//! `https://domain/.well-known/lnurlp/user` and fetches invoices from its
//! callback. I/O is isolated here; nothing in the wallet core depends on
//! it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// Default timeout for LNURL requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Lightning address error
#[derive(Debug, Error)]
pub enum Error {
    /// Address is not `user@domain`
    #[error("Invalid lightning address: {0}")]
    InvalidAddress(String),
    /// Endpoint unreachable or reply not a pay request
    #[error("Lnurl resolution failed: {0}")]
    ResolutionFailed(String),
    /// Amount below the receiver's minimum
    #[error("Amount {amount} msat is below minimum {min} msat")]
    AmountBelowMin {
        /// Requested amount
        amount: u64,
        /// Receiver minimum
        min: u64,
    },
    /// Amount above the receiver's maximum
    #[error("Amount {amount} msat is above maximum {max} msat")]
    AmountAboveMax {
        /// Requested amount
        amount: u64,
        /// Receiver maximum
        max: u64,
    },
    /// Callback did not yield an invoice
    #[error("Invoice fetch failed: {0}")]
    InvoiceFetchFailed(String),
    /// Invalid url
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// A `user@domain` lightning address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightningAddress {
    user: String,
    domain: String,
}

impl LightningAddress {
    /// LNURL-pay endpoint of the address
    pub fn lnurlp_url(&self) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "https://{}/.well-known/lnurlp/{}",
            self.domain, self.user
        ))?)
    }
}

impl FromStr for LightningAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        let (user, domain) = trimmed
            .split_once('@')
            .ok_or_else(|| Error::InvalidAddress(trimmed.to_string()))?;

        if user.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(Error::InvalidAddress(trimmed.to_string()));
        }

        Ok(LightningAddress {
            user: user.to_string(),
            domain: domain.to_string(),
        })
    }
}

impl fmt::Display for LightningAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.domain)
    }
}

/// LNURL-pay metadata reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LnurlPayResponse {
    /// Callback to request invoices from
    pub callback: String,
    /// Minimum amount in millisatoshis
    #[serde(rename = "minSendable")]
    pub min_sendable: u64,
    /// Maximum amount in millisatoshis
    #[serde(rename = "maxSendable")]
    pub max_sendable: u64,
    /// Maximum comment length the receiver accepts
    #[serde(rename = "commentAllowed")]
    pub comment_allowed: Option<u32>,
    /// Error reason on failure replies
    pub reason: Option<String>,
}

/// Invoice reply of the LNURL-pay callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LnurlPayInvoiceResponse {
    /// Bolt11 payment request
    pub pr: Option<String>,
    /// Error reason on failure replies
    pub reason: Option<String>,
}

/// LNURL-pay client
#[derive(Debug, Clone)]
pub struct LnurlClient {
    inner: reqwest::Client,
}

impl Default for LnurlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LnurlClient {
    /// Create new [`LnurlClient`]
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("failed to build http client"),
        }
    }

    /// Resolve a lightning address to its pay-request metadata
    #[instrument(skip(self))]
    pub async fn resolve(&self, address: &LightningAddress) -> Result<LnurlPayResponse, Error> {
        let url = address.lnurlp_url()?;

        tracing::debug!("Fetching lnurl pay data from {}", url);

        let response: LnurlPayResponse = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|err| Error::ResolutionFailed(err.to_string()))?
            .json()
            .await
            .map_err(|err| Error::ResolutionFailed(err.to_string()))?;

        if let Some(reason) = &response.reason {
            return Err(Error::ResolutionFailed(reason.clone()));
        }

        Ok(response)
    }

    /// Fetch an invoice for `amount_msat` from a resolved pay request
    #[instrument(skip(self, pay_request))]
    pub async fn get_invoice(
        &self,
        pay_request: &LnurlPayResponse,
        amount_msat: u64,
        comment: Option<&str>,
    ) -> Result<String, Error> {
        if amount_msat < pay_request.min_sendable {
            return Err(Error::AmountBelowMin {
                amount: amount_msat,
                min: pay_request.min_sendable,
            });
        }
        if amount_msat > pay_request.max_sendable {
            return Err(Error::AmountAboveMax {
                amount: amount_msat,
                max: pay_request.max_sendable,
            });
        }

        let mut callback = Url::parse(&pay_request.callback)
            .map_err(|err| Error::InvoiceFetchFailed(err.to_string()))?;

        callback
            .query_pairs_mut()
            .append_pair("amount", &amount_msat.to_string());

        if let Some(comment) = comment {
            if pay_request.comment_allowed.is_some() {
                callback.query_pairs_mut().append_pair("comment", comment);
            }
        }

        tracing::debug!("Requesting invoice from {}", callback);

        let response: LnurlPayInvoiceResponse = self
            .inner
            .get(callback)
            .send()
            .await
            .map_err(|err| Error::InvoiceFetchFailed(err.to_string()))?
            .json()
            .await
            .map_err(|err| Error::InvoiceFetchFailed(err.to_string()))?;

        if let Some(reason) = &response.reason {
            return Err(Error::InvoiceFetchFailed(reason.clone()));
        }

        response
            .pr
            .ok_or_else(|| Error::InvoiceFetchFailed("no invoice in reply".to_string()))
    }
}
