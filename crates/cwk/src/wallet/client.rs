//! Typed client for the mint's `/v1/*` endpoints

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use cashu_core::nuts::{
    CheckStateRequest, CheckStateResponse, Id, KeySet, KeysResponse, KeysetResponse,
    MeltBolt11Request, MeltQuoteBolt11Request, MeltQuoteBolt11Response, MintBolt11Request,
    MintBolt11Response, MintInfo, MintQuoteBolt11Request, MintQuoteBolt11Response, RestoreRequest,
    RestoreResponse, SwapRequest, SwapResponse,
};
use cashu_core::MintUrl;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;
use url::Url;

use crate::error::ErrorResponse;
use crate::Error;

/// Default timeout for mint requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Interface to a mint
///
/// Implemented over HTTP by [`HttpClient`]; tests drive the wallet against
/// an in-process implementation instead.
#[async_trait]
pub trait MintConnector: Debug + Send + Sync {
    /// `GET /v1/info`
    async fn get_mint_info(&self) -> Result<MintInfo, Error>;
    /// `GET /v1/keysets`
    async fn get_mint_keysets(&self) -> Result<KeysetResponse, Error>;
    /// `GET /v1/keys`
    async fn get_mint_keys(&self) -> Result<Vec<KeySet>, Error>;
    /// `GET /v1/keys/{keyset_id}`
    async fn get_keyset_keys(&self, keyset_id: Id) -> Result<KeySet, Error>;
    /// `POST /v1/mint/quote/bolt11`
    async fn post_mint_quote(
        &self,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error>;
    /// `GET /v1/mint/quote/bolt11/{quote_id}`
    async fn get_mint_quote_status(&self, quote_id: &str)
        -> Result<MintQuoteBolt11Response, Error>;
    /// `POST /v1/mint/bolt11`
    async fn post_mint(&self, request: MintBolt11Request) -> Result<MintBolt11Response, Error>;
    /// `POST /v1/melt/quote/bolt11`
    async fn post_melt_quote(
        &self,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error>;
    /// `GET /v1/melt/quote/bolt11/{quote_id}`
    async fn get_melt_quote_status(&self, quote_id: &str)
        -> Result<MeltQuoteBolt11Response, Error>;
    /// `POST /v1/melt/bolt11`
    async fn post_melt(&self, request: MeltBolt11Request) -> Result<MeltQuoteBolt11Response, Error>;
    /// `POST /v1/swap`
    async fn post_swap(&self, request: SwapRequest) -> Result<SwapResponse, Error>;
    /// `POST /v1/checkstate`
    async fn post_check_state(
        &self,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error>;
    /// `POST /v1/restore`
    async fn post_restore(&self, request: RestoreRequest) -> Result<RestoreResponse, Error>;
}

/// HTTP mint client
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    mint_url: MintUrl,
}

impl HttpClient {
    /// Create new [`HttpClient`] with the default timeout
    pub fn new(mint_url: MintUrl) -> Self {
        Self::with_timeout(mint_url, DEFAULT_TIMEOUT)
    }

    /// Create new [`HttpClient`] with a caller supplied timeout
    pub fn with_timeout(mint_url: MintUrl, timeout: Duration) -> Self {
        Self {
            inner: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build http client"),
            mint_url,
        }
    }

    async fn http_get<R>(&self, url: Url) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let response = self.inner.get(url).send().await?;
        Self::decode(response).await
    }

    async fn http_post<P, R>(&self, url: Url, payload: &P) -> Result<R, Error>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.inner.post(url).json(payload).send().await?;
        Self::decode(response).await
    }

    /// Statuses >= 400 carry a `{detail, code}` body
    async fn decode<R>(response: reqwest::Response) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            let error_response: ErrorResponse = serde_json::from_str(&body).unwrap_or_default();

            return Err(Error::Protocol {
                code: error_response.code,
                detail: error_response
                    .detail
                    .unwrap_or_else(|| format!("mint returned status {status}")),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MintConnector for HttpClient {
    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_mint_info(&self) -> Result<MintInfo, Error> {
        self.http_get(self.mint_url.join_paths(&["v1", "info"])?).await
    }

    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_mint_keysets(&self) -> Result<KeysetResponse, Error> {
        self.http_get(self.mint_url.join_paths(&["v1", "keysets"])?)
            .await
    }

    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_mint_keys(&self) -> Result<Vec<KeySet>, Error> {
        let response: KeysResponse = self
            .http_get(self.mint_url.join_paths(&["v1", "keys"])?)
            .await?;
        Ok(response.keysets)
    }

    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_keyset_keys(&self, keyset_id: Id) -> Result<KeySet, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "keys", &keyset_id.to_string()])?;
        let response: KeysResponse = self.http_get(url).await?;

        response
            .keysets
            .into_iter()
            .next()
            .ok_or(Error::UnknownKeyset(keyset_id))
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn post_mint_quote(
        &self,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "mint", "quote", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_mint_quote_status(
        &self,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "mint", "quote", "bolt11", quote_id])?;
        self.http_get(url).await
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn post_mint(&self, request: MintBolt11Request) -> Result<MintBolt11Response, Error> {
        let url = self.mint_url.join_paths(&["v1", "mint", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn post_melt_quote(
        &self,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "melt", "quote", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self), fields(mint_url = %self.mint_url))]
    async fn get_melt_quote_status(
        &self,
        quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = self
            .mint_url
            .join_paths(&["v1", "melt", "quote", "bolt11", quote_id])?;
        self.http_get(url).await
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn post_melt(&self, request: MeltBolt11Request) -> Result<MeltQuoteBolt11Response, Error> {
        let url = self.mint_url.join_paths(&["v1", "melt", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn post_swap(&self, request: SwapRequest) -> Result<SwapResponse, Error> {
        let url = self.mint_url.join_paths(&["v1", "swap"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn post_check_state(
        &self,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let url = self.mint_url.join_paths(&["v1", "checkstate"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip_all, fields(mint_url = %self.mint_url))]
    async fn post_restore(&self, request: RestoreRequest) -> Result<RestoreResponse, Error> {
        let url = self.mint_url.join_paths(&["v1", "restore"])?;
        self.http_post(url, &request).await
    }
}
