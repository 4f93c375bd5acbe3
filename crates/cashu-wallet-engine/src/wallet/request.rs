//! Request decoding
//!
//! Classifies whatever the user pasted or scanned and dispatches it into
//! the right flow: BOLT-11 invoices straight into the quote engine, LNURL
//! targets through their pay endpoints, tokens and payment requests back to
//! the caller, mint urls into the registry.

use std::str::FromStr;

use lightning_invoice::{Bolt11Invoice, Bolt11InvoiceDescriptionRef};
use tracing::instrument;
use url::Url;

use crate::mint_url::MintUrl;
use crate::nuts::{CurrencyUnit, PublicKey, Token};
use crate::wallet::client::LnurlPayResponse;
use crate::wallet::session::DecodedInvoice;
use crate::{Error, Wallet};

/// The classified form of a user-supplied string
#[derive(Debug, Clone)]
pub enum DecodedRequest {
    /// A BOLT-11 invoice; melt quotes have been requested and stored on
    /// the session
    Bolt11(DecodedInvoice),
    /// An LNURL pay endpoint; metadata is stored on the session and
    /// [`Wallet::lnurl_pay_invoice`] finishes the flow
    LnurlPay(LnurlPayResponse),
    /// A token ready to be passed to [`Wallet::receive`]
    Token(Token),
    /// A P2PK public key to lock a send to
    P2pk(PublicKey),
    /// A mint url; the mint has been activated
    MintUrl(MintUrl),
    /// A NUT-18 payment request, raw
    PaymentRequest(String),
}

impl Wallet {
    /// Classify and dispatch a pasted or scanned string. First match wins.
    #[instrument(skip_all)]
    pub async fn decode_request(&self, input: &str) -> Result<DecodedRequest, Error> {
        let req = input.trim();
        let lower = req.to_lowercase();

        if lower.starts_with("lnbc") {
            return self.handle_bolt11(req).await;
        }
        if lower.starts_with("lightning:") {
            return self.handle_bolt11(&req[10..]).await;
        }
        if lower.starts_with("bitcoin:") {
            let invoice = query_param(req, "lightning")
                .ok_or_else(|| Error::DecodeFailed("No lightning invoice in URI".to_string()))?;
            return self.handle_bolt11(&invoice).await;
        }
        if lower.starts_with("lnurl:") {
            return self.handle_lnurl_pay(&req[6..]).await;
        }
        if let Some(index) = lower.find("lightning=lnurl1") {
            let rest = &req[index + 10..];
            let lnurl = rest.split('&').next().unwrap_or(rest);
            return self.handle_lnurl_pay(lnurl).await;
        }
        if lower.starts_with("lnurl1") || is_lightning_address(req) {
            return self.handle_lnurl_pay(req).await;
        }
        if req.starts_with("cashuA") || req.starts_with("cashuB") {
            let token = Token::from_str(req).map_err(|e| Error::DecodeFailed(e.to_string()))?;
            return Ok(DecodedRequest::Token(token));
        }
        if let Some(index) = req.find("token=cashu") {
            let token = &req[index + 6..];
            let token = Token::from_str(token).map_err(|e| Error::DecodeFailed(e.to_string()))?;
            return Ok(DecodedRequest::Token(token));
        }
        if let Ok(pubkey) = PublicKey::from_hex(req) {
            return Ok(DecodedRequest::P2pk(pubkey));
        }
        if lower.starts_with("http") {
            let mint_url = MintUrl::from_str(req)?;
            self.registry
                .activate_mint_url(mint_url.clone(), None)
                .await?;
            return Ok(DecodedRequest::MintUrl(mint_url));
        }
        if req.starts_with("creqA") {
            return Ok(DecodedRequest::PaymentRequest(req.to_string()));
        }

        Err(Error::DecodeFailed("Unrecognized input".to_string()))
    }

    /// Decode a bolt11, park it on the session, then request the
    /// single-mint quote and the multi-mint fan-out in sequence.
    async fn handle_bolt11(&self, bolt11: &str) -> Result<DecodedRequest, Error> {
        let bolt11 = bolt11.trim();
        let invoice = Bolt11Invoice::from_str(bolt11)?;

        let description = match invoice.description() {
            Bolt11InvoiceDescriptionRef::Direct(description) => description.to_string(),
            Bolt11InvoiceDescriptionRef::Hash(_) => String::new(),
        };

        let decoded = DecodedInvoice {
            bolt11: bolt11.to_string(),
            amount_sat: invoice.amount_milli_satoshis().map(|msat| msat / 1000),
            payment_hash: invoice.payment_hash().to_string(),
            description,
            timestamp: invoice.duration_since_epoch().as_secs(),
            expiry: invoice.expiry_time().as_secs(),
        };

        self.with_session(|session| {
            session.reset();
            session.invoice = Some(decoded.clone());
        });

        if let Err(err) = self.melt_quote(bolt11).await {
            tracing::warn!("Melt quote failed: {err}");
        }

        match self.multi_path_melt_quotes().await {
            Ok(_) => {}
            Err(
                Error::NoMintSupportsMpp | Error::InsufficientMultiMintBalance { .. },
            ) => {
                tracing::debug!("Multi-path quotes unavailable for this invoice");
            }
            Err(err) => tracing::warn!("Multi-path quotes failed: {err}"),
        }

        Ok(DecodedRequest::Bolt11(decoded))
    }

    /// Resolve an LNURL pay target (LN address or `lnurl1…`) and stash its
    /// metadata on the session.
    async fn handle_lnurl_pay(&self, target: &str) -> Result<DecodedRequest, Error> {
        let url = if is_lightning_address(target) {
            let (user, host) = target
                .split_once('@')
                .ok_or_else(|| Error::DecodeFailed("Invalid lightning address".to_string()))?;
            format!("https://{host}/.well-known/lnurlp/{user}")
        } else {
            decode_lnurl_bech32(target)?
        };

        let response = self.client.fetch_lnurl_pay_request(&url).await?;

        if let Some(reason) = &response.reason {
            return Err(Error::Lnurl(reason.clone()));
        }
        if response.tag.as_deref() != Some("payRequest") {
            return Err(Error::Lnurl("Endpoint is not a payRequest".to_string()));
        }

        self.with_session(|session| {
            session.reset();
            if response.min_sendable == response.max_sendable {
                session.lnurl_amount_sat = Some(response.max_sendable / 1000);
            }
            session.lnurl_pay = Some(response.clone());
        });

        Ok(DecodedRequest::LnurlPay(response))
    }

    /// Finish an LNURL pay flow: fetch an invoice for `amount` from the
    /// callback and feed it back through [`Wallet::decode_request`].
    ///
    /// `amount` is in the active unit's base denomination (sats, or cents
    /// for a usd wallet; cents are converted via the BTC-USD rate).
    #[instrument(skip(self))]
    pub async fn lnurl_pay_invoice(&self, amount: u64) -> Result<DecodedRequest, Error> {
        let lnurl = self
            .with_session(|session| session.lnurl_pay.clone())
            .ok_or_else(|| Error::Lnurl("No LNURL target".to_string()))?;

        let sats = if self.registry.active_unit().await == CurrencyUnit::Usd {
            let price = self.client.fetch_bitcoin_price_usd().await?;
            let dollars = amount as f64 / 100.0;
            (dollars * (1e8 / price)).floor() as u64
        } else {
            amount
        };
        let msat = sats * 1000;

        if msat < lnurl.min_sendable || msat > lnurl.max_sendable {
            return Err(Error::Lnurl(format!(
                "Amount {msat} msat outside [{}, {}]",
                lnurl.min_sendable, lnurl.max_sendable
            )));
        }

        let mut callback = Url::parse(&lnurl.callback)
            .map_err(|e| Error::Lnurl(format!("Invalid callback url: {e}")))?;
        callback
            .query_pairs_mut()
            .append_pair("amount", &msat.to_string());

        let response = self.client.fetch_lnurl_invoice(callback.as_str()).await?;

        if response.status.as_deref() == Some("ERROR") {
            return Err(Error::Lnurl(
                response.reason.unwrap_or_else(|| "Unknown".to_string()),
            ));
        }

        let pr = response
            .pr
            .ok_or_else(|| Error::Lnurl("No invoice in response".to_string()))?;

        self.decode_request(&pr).await
    }
}

/// Value of a query parameter in a URI-shaped string
fn query_param(input: &str, key: &str) -> Option<String> {
    let (_, query) = input.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        k.eq_ignore_ascii_case(key).then(|| v.to_string())
    })
}

/// `user@host` shaped, with both sides limited to LNURL address charset
fn is_lightning_address(input: &str) -> bool {
    let Some((user, host)) = input.split_once('@') else {
        return false;
    };

    let valid =
        |s: &str| !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || ".+-~_".contains(c));

    valid(user) && valid(host)
}

/// Decode an `lnurl1…` bech32 string into its URL
///
/// lnurl strings carry whole callback URLs and run far past the length cap
/// of address encodings; only the limit lnurl itself specifies applies.
fn decode_lnurl_bech32(input: &str) -> Result<String, Error> {
    if input.len() > 20_000 {
        return Err(Error::DecodeFailed("lnurl too long".to_string()));
    }

    let (hrp, bytes) =
        bech32::decode(input.trim()).map_err(|e| Error::DecodeFailed(e.to_string()))?;

    if !hrp.as_str().eq_ignore_ascii_case("lnurl") {
        return Err(Error::DecodeFailed("Not an lnurl".to_string()));
    }

    String::from_utf8(bytes).map_err(|e| Error::DecodeFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::test_utils::test_wallet;

    #[test]
    fn test_lightning_address_shapes() {
        assert!(is_lightning_address("alice@example.com"));
        assert!(is_lightning_address("al.ice+tag@ln.example-node.com"));
        assert!(!is_lightning_address("alice"));
        assert!(!is_lightning_address("@example.com"));
        assert!(!is_lightning_address("alice@"));
        assert!(!is_lightning_address("al ice@example.com"));
    }

    #[test]
    fn test_lnurl_bech32_round_trip() {
        use bech32::{Bech32, Hrp};

        let hrp = Hrp::parse("lnurl").unwrap();

        let url = "https://example.com/.well-known/lnurlp/alice";
        let encoded = bech32::encode::<Bech32>(hrp, url.as_bytes()).unwrap();

        assert!(encoded.starts_with("lnurl1"));
        assert_eq!(decode_lnurl_bech32(&encoded).unwrap(), url);
        // case-insensitive input
        assert_eq!(decode_lnurl_bech32(&encoded.to_uppercase()).unwrap(), url);

        assert!(decode_lnurl_bech32("lnbc1notbech").is_err());
    }

    #[test]
    fn test_lnurl_bech32_real_world_length() {
        use bech32::{Bech32, Hrp};

        let hrp = Hrp::parse("lnurl").unwrap();

        // pay endpoints encode full callback urls, blowing straight past
        // the 90 character cap of address encodings
        let url = "https://pay.example-custodian.com/api/v1/lnurl/pay/channel/9f2c4e51-70be-4c22-a9d8-2f8e6b1c0d44?source=wallet";
        let encoded = bech32::encode::<Bech32>(hrp, url.as_bytes()).unwrap();
        assert!(encoded.len() > 90);

        assert_eq!(decode_lnurl_bech32(&encoded).unwrap(), url);

        // the lnurl limit itself still applies
        let oversized = format!("lnurl1{}", "q".repeat(20_000));
        assert!(matches!(
            decode_lnurl_bech32(&oversized),
            Err(Error::DecodeFailed(reason)) if reason.contains("too long")
        ));
    }

    #[tokio::test]
    async fn test_decode_token_and_pubkey_and_creq() {
        let (wallet, _db) = test_wallet(0).await;

        let token_str = "cashuAeyJ0b2tlbiI6W3sibWludCI6Imh0dHBzOi8vODMzMy5zcGFjZTozMzM4IiwicHJvb2ZzIjpbeyJhbW91bnQiOjIsImlkIjoiMDA5YTFmMjkzMjUzZTQxZSIsInNlY3JldCI6IjQwNzkxNWJjMjEyYmU2MWE3N2UzZTZkMmFlYjRjNzI3OTgwYmRhNTFjZDA2YTZhZmMyOWUyODYxNzY4YTc4MzciLCJDIjoiMDJiYzkwOTc5OTdkODFhZmIyY2M3MzQ2YjVlNDM0NWE5MzQ2YmQyYTUwNmViNzk1ODU5OGE3MmYwY2Y4NTE2M2VhIn1dfV0sInVuaXQiOiJzYXQifQ==";
        assert!(matches!(
            wallet.decode_request(token_str).await.unwrap(),
            DecodedRequest::Token(_)
        ));

        // token embedded in a url query
        let embedded = format!("https://wallet.example.com/#token={token_str}");
        assert!(matches!(
            wallet.decode_request(&embedded).await.unwrap(),
            DecodedRequest::Token(_)
        ));

        assert!(matches!(
            wallet
                .decode_request(
                    "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
                )
                .await
                .unwrap(),
            DecodedRequest::P2pk(_)
        ));

        assert!(matches!(
            wallet.decode_request("creqAdeadbeef").await.unwrap(),
            DecodedRequest::PaymentRequest(_)
        ));

        assert!(wallet.decode_request("garbage").await.is_err());
    }
}
