//! Wallet client

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::error::ErrorResponse;
use crate::mint_url::MintUrl;
use crate::nuts::{
    CheckStateRequest, CheckStateResponse, KeySet, KeysResponse, KeysetId, KeysetResponse,
    MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltRequest, MintInfo,
    MintQuoteBolt11Request, MintQuoteBolt11Response, MintRequest, MintResponse, SwapRequest,
    SwapResponse,
};
use crate::Error;

/// LNURL-pay response from the initial request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnurlPayResponse {
    /// Callback URL for requesting an invoice
    pub callback: String,
    /// Minimum amount in millisatoshis
    #[serde(rename = "minSendable")]
    pub min_sendable: u64,
    /// Maximum amount in millisatoshis
    #[serde(rename = "maxSendable")]
    pub max_sendable: u64,
    /// Metadata string (JSON stringified)
    #[serde(default)]
    pub metadata: String,
    /// Tag, `payRequest` for pay endpoints
    pub tag: Option<String>,
    /// Error reason, set when the service rejects the request
    pub reason: Option<String>,
}

/// LNURL-pay invoice response from the callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LnurlPayInvoiceResponse {
    /// The BOLT11 payment request
    pub pr: Option<String>,
    /// Status, `ERROR` on failure
    pub status: Option<String>,
    /// Error reason
    pub reason: Option<String>,
}

/// Interface that connects the wallet to mints and Lightning pay endpoints.
/// Typically an [`HttpClient`].
#[async_trait]
pub trait MintConnector: Debug + Send + Sync {
    /// Get Keyset Keys [NUT-01]
    async fn get_mint_keyset(&self, mint_url: MintUrl, keyset_id: KeysetId)
        -> Result<KeySet, Error>;
    /// Get Keysets [NUT-02]
    async fn get_mint_keysets(&self, mint_url: MintUrl) -> Result<KeysetResponse, Error>;
    /// Mint Quote [NUT-04]
    async fn post_mint_quote(
        &self,
        mint_url: MintUrl,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error>;
    /// Mint Quote status
    async fn get_mint_quote_status(
        &self,
        mint_url: MintUrl,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error>;
    /// Mint Tokens [NUT-04]
    async fn post_mint(&self, mint_url: MintUrl, request: MintRequest)
        -> Result<MintResponse, Error>;
    /// Melt Quote [NUT-05]
    async fn post_melt_quote(
        &self,
        mint_url: MintUrl,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error>;
    /// Melt Quote Status
    async fn get_melt_quote_status(
        &self,
        mint_url: MintUrl,
        quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error>;
    /// Melt [NUT-05], with blinded change outputs [NUT-08]
    async fn post_melt(
        &self,
        mint_url: MintUrl,
        request: MeltRequest,
    ) -> Result<MeltQuoteBolt11Response, Error>;
    /// Swap [NUT-03]
    async fn post_swap(&self, mint_url: MintUrl, request: SwapRequest)
        -> Result<SwapResponse, Error>;
    /// Get Mint Info [NUT-06]
    async fn get_mint_info(&self, mint_url: MintUrl) -> Result<MintInfo, Error>;
    /// Spendable check [NUT-07]
    async fn post_check_state(
        &self,
        mint_url: MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error>;
    /// Fetch LNURL-pay metadata
    async fn fetch_lnurl_pay_request(&self, url: &str) -> Result<LnurlPayResponse, Error>;
    /// Fetch an invoice from an LNURL-pay callback
    async fn fetch_lnurl_invoice(&self, url: &str) -> Result<LnurlPayInvoiceResponse, Error>;
    /// BTC price in USD, for converting usd-unit amounts to sats
    async fn fetch_bitcoin_price_usd(&self) -> Result<f64, Error>;
}

/// Http Client
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create new [`HttpClient`]
    pub fn new() -> Self {
        Self {
            inner: Client::new(),
        }
    }

    async fn http_get<R>(&self, url: url::Url) -> Result<R, Error>
    where
        R: serde::de::DeserializeOwned,
    {
        let res = self.inner.get(url).send().await?.json::<Value>().await?;
        Self::parse(res)
    }

    async fn http_post<P, R>(&self, url: url::Url, payload: &P) -> Result<R, Error>
    where
        P: serde::Serialize + ?Sized + Sync,
        R: serde::de::DeserializeOwned,
    {
        let res = self
            .inner
            .post(url)
            .json(payload)
            .send()
            .await?
            .json::<Value>()
            .await?;
        Self::parse(res)
    }

    /// A body that does not parse as the expected type is a mint error
    /// envelope; nothing passes silently.
    fn parse<R>(value: Value) -> Result<R, Error>
    where
        R: serde::de::DeserializeOwned,
    {
        match serde_json::from_value::<R>(value.clone()) {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::warn!("Unexpected mint response: {}", err);
                Err(ErrorResponse::from_value(value).into())
            }
        }
    }
}

#[async_trait]
impl MintConnector for HttpClient {
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_mint_keyset(
        &self,
        mint_url: MintUrl,
        keyset_id: KeysetId,
    ) -> Result<KeySet, Error> {
        let url = mint_url.join_paths(&["v1", "keys", &keyset_id.to_string()])?;
        let response: KeysResponse = self.http_get(url).await?;

        response
            .keysets
            .into_iter()
            .find(|k| k.id == keyset_id)
            .ok_or(Error::UnknownKeySet)
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_mint_keysets(&self, mint_url: MintUrl) -> Result<KeysetResponse, Error> {
        let url = mint_url.join_paths(&["v1", "keysets"])?;
        self.http_get(url).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_mint_quote(
        &self,
        mint_url: MintUrl,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "mint", "quote", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_mint_quote_status(
        &self,
        mint_url: MintUrl,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "mint", "quote", "bolt11", quote_id])?;
        self.http_get(url).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_mint(
        &self,
        mint_url: MintUrl,
        request: MintRequest,
    ) -> Result<MintResponse, Error> {
        let url = mint_url.join_paths(&["v1", "mint", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_melt_quote(
        &self,
        mint_url: MintUrl,
        request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "quote", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_melt_quote_status(
        &self,
        mint_url: MintUrl,
        quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "quote", "bolt11", quote_id])?;
        self.http_get(url).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_melt(
        &self,
        mint_url: MintUrl,
        request: MeltRequest,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_swap(
        &self,
        mint_url: MintUrl,
        request: SwapRequest,
    ) -> Result<SwapResponse, Error> {
        let url = mint_url.join_paths(&["v1", "swap"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_mint_info(&self, mint_url: MintUrl) -> Result<MintInfo, Error> {
        let url = mint_url.join_paths(&["v1", "info"])?;
        self.http_get(url).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_check_state(
        &self,
        mint_url: MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let url = mint_url.join_paths(&["v1", "checkstate"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self))]
    async fn fetch_lnurl_pay_request(&self, url: &str) -> Result<LnurlPayResponse, Error> {
        Ok(self.inner.get(url).send().await?.json().await?)
    }

    #[instrument(skip(self))]
    async fn fetch_lnurl_invoice(&self, url: &str) -> Result<LnurlPayInvoiceResponse, Error> {
        Ok(self.inner.get(url).send().await?.json().await?)
    }

    #[instrument(skip(self))]
    async fn fetch_bitcoin_price_usd(&self) -> Result<f64, Error> {
        let res: Value = self
            .inner
            .get("https://api.coinbase.com/v2/exchange-rates?currency=BTC")
            .send()
            .await?
            .json()
            .await?;

        res["data"]["rates"]["USD"]
            .as_str()
            .and_then(|rate| rate.parse::<f64>().ok())
            .ok_or_else(|| Error::Custom("Invalid exchange rate response".to_string()))
    }
}
