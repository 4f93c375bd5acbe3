//! Shared fakes for wallet unit tests

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::blinding::{BlindingCrypto, PreMintSecrets};
use crate::database::{WalletDatabase, WalletMemoryDatabase};
use crate::nuts::{
    BlindSignature, CheckStateRequest, CheckStateResponse, CurrencyUnit, KeySet, KeySetInfo,
    Keys, KeysetId, KeysetResponse, MeltQuoteBolt11Request, MeltQuoteBolt11Response,
    MeltRequest, MintInfo, MintQuoteBolt11Request, MintQuoteBolt11Response, MintRequest,
    MintResponse, Proofs, PublicKey, SwapRequest, SwapResponse,
};
use crate::secret::Secret;
use crate::wallet::client::{LnurlPayInvoiceResponse, LnurlPayResponse, MintConnector};
use crate::wallet::{NullWorkerQueue, Wallet};
use crate::{Amount, Error, MintUrl};

pub(crate) const TEST_KEYSET: &str = "009a1f293253e41e";
pub(crate) const TEST_MINT: &str = "https://mint.example.com";

/// Crypto stub: deterministic fingerprints, no blinding
#[derive(Debug)]
pub(crate) struct StubCrypto;

impl BlindingCrypto for StubCrypto {
    fn premint_secrets(
        &self,
        _keyset_id: &KeysetId,
        _seed: &[u8; 64],
        _counter: u64,
        _amounts: &[Amount],
    ) -> Result<PreMintSecrets, Error> {
        unimplemented!("not exercised in this test")
    }

    fn construct_proofs(
        &self,
        _signatures: Vec<BlindSignature>,
        _premint: &PreMintSecrets,
        _keys: &Keys,
    ) -> Result<Proofs, Error> {
        unimplemented!("not exercised in this test")
    }

    fn hash_to_curve(&self, secret: &Secret) -> Result<PublicKey, Error> {
        Ok(fake_point(secret.as_str()))
    }
}

/// A well-formed compressed point derived from arbitrary text, good enough
/// to act as a proof fingerprint in tests.
pub(crate) fn fake_point(input: &str) -> PublicKey {
    let mut state: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in input.as_bytes() {
        state ^= u64::from(*byte);
        state = state.wrapping_mul(0x1000_0000_01b3);
    }

    let mut hex = String::with_capacity(66);
    hex.push_str("02");
    for i in 0..8u64 {
        hex.push_str(&format!("{:08x}", state.rotate_left((i * 8) as u32) as u32));
    }
    PublicKey::from_hex(&hex[..66]).expect("valid fake point")
}

/// Connector stub that panics on use
#[derive(Debug)]
pub(crate) struct StubConnector;

#[async_trait]
impl MintConnector for StubConnector {
    async fn get_mint_keyset(
        &self,
        _mint_url: MintUrl,
        _keyset_id: KeysetId,
    ) -> Result<KeySet, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn get_mint_keysets(&self, _mint_url: MintUrl) -> Result<KeysetResponse, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn post_mint_quote(
        &self,
        _mint_url: MintUrl,
        _request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn get_mint_quote_status(
        &self,
        _mint_url: MintUrl,
        _quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn post_mint(
        &self,
        _mint_url: MintUrl,
        _request: MintRequest,
    ) -> Result<MintResponse, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn post_melt_quote(
        &self,
        _mint_url: MintUrl,
        _request: MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn get_melt_quote_status(
        &self,
        _mint_url: MintUrl,
        _quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn post_melt(
        &self,
        _mint_url: MintUrl,
        _request: MeltRequest,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn post_swap(
        &self,
        _mint_url: MintUrl,
        _request: SwapRequest,
    ) -> Result<SwapResponse, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn get_mint_info(&self, _mint_url: MintUrl) -> Result<MintInfo, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn post_check_state(
        &self,
        _mint_url: MintUrl,
        _request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn fetch_lnurl_pay_request(&self, _url: &str) -> Result<LnurlPayResponse, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn fetch_lnurl_invoice(&self, _url: &str) -> Result<LnurlPayInvoiceResponse, Error> {
        unimplemented!("not exercised in this test")
    }
    async fn fetch_bitcoin_price_usd(&self) -> Result<f64, Error> {
        unimplemented!("not exercised in this test")
    }
}

/// A wallet over the memory database with one active sat keyset
pub(crate) async fn test_wallet(fee_ppk: u64) -> (Wallet, Arc<WalletMemoryDatabase>) {
    let db = Arc::new(WalletMemoryDatabase::new());
    let wallet = Wallet::new(
        db.clone(),
        Arc::new(StubConnector),
        Arc::new(StubCrypto),
        Arc::new(NullWorkerQueue),
    );

    let mint_url = MintUrl::from_str(TEST_MINT).unwrap();
    db.add_mint(mint_url.clone(), None).await.unwrap();
    db.add_mint_keysets(
        mint_url.clone(),
        vec![KeySetInfo {
            id: KeysetId::from_str(TEST_KEYSET).unwrap(),
            unit: CurrencyUnit::Sat,
            active: true,
            input_fee_ppk: fee_ppk,
        }],
    )
    .await
    .unwrap();

    wallet
        .registry
        .activate_mint_url(mint_url, None)
        .await
        .unwrap();

    (wallet, db)
}
