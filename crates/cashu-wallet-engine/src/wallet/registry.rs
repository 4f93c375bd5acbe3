//! Mint registry
//!
//! Tracks known mints, the active mint and unit, and answers multi-mint
//! balance questions for the MPP flow.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::instrument;

use crate::database::WalletDatabase;
use crate::mint_url::MintUrl;
use crate::nuts::{CurrencyUnit, MintInfo, PaymentMethod};
use crate::wallet::client::MintConnector;
use crate::{Amount, Error};

/// Balance weight of one mint within the multi-mint total
#[derive(Debug, Clone)]
pub struct MintWeight {
    /// Mint url
    pub mint_url: MintUrl,
    /// Spendable balance at the mint
    pub balance: Amount,
    /// Share of the overall balance, in `[0, 1]`
    pub weight: f64,
}

/// Combined balance over MPP-eligible mints
#[derive(Debug, Clone)]
pub struct MultiMintBalance {
    /// Sum over all eligible mints
    pub overall: Amount,
    /// Per-mint weights; weights sum to ~1
    pub weights: Vec<MintWeight>,
}

/// Registry of known mints and the active selection
#[derive(Debug)]
pub struct MintRegistry {
    localstore: Arc<dyn WalletDatabase>,
    client: Arc<dyn MintConnector>,
    active_mint: RwLock<Option<MintUrl>>,
    active_unit: RwLock<CurrencyUnit>,
}

impl MintRegistry {
    /// Create new [`MintRegistry`]
    pub fn new(localstore: Arc<dyn WalletDatabase>, client: Arc<dyn MintConnector>) -> Self {
        Self {
            localstore,
            client,
            active_mint: RwLock::new(None),
            active_unit: RwLock::new(CurrencyUnit::Sat),
        }
    }

    /// The active mint
    pub async fn active_mint_url(&self) -> Result<MintUrl, Error> {
        self.active_mint
            .read()
            .await
            .clone()
            .ok_or(Error::NoActiveMint)
    }

    /// The active unit
    pub async fn active_unit(&self) -> CurrencyUnit {
        self.active_unit.read().await.clone()
    }

    /// Set the active unit
    pub async fn set_active_unit(&self, unit: CurrencyUnit) {
        *self.active_unit.write().await = unit;
    }

    /// Add a mint and make it the active one, fetching its info when it is
    /// not known yet.
    #[instrument(skip(self))]
    pub async fn activate_mint_url(
        &self,
        mint_url: MintUrl,
        unit: Option<CurrencyUnit>,
    ) -> Result<(), Error> {
        if self.localstore.get_mint(&mint_url).await?.is_none() {
            let info = match self.client.get_mint_info(mint_url.clone()).await {
                Ok(info) => Some(info),
                Err(err) => {
                    tracing::warn!("Could not get mint info for {}: {}", mint_url, err);
                    None
                }
            };
            self.localstore.add_mint(mint_url.clone(), info).await?;
        }

        *self.active_mint.write().await = Some(mint_url);
        if let Some(unit) = unit {
            self.set_active_unit(unit).await;
        }

        Ok(())
    }

    /// Cached info of the active mint, refreshed from the mint on miss
    #[instrument(skip(self))]
    pub async fn active_info(&self) -> Result<Option<MintInfo>, Error> {
        let mint_url = self.active_mint_url().await?;
        self.mint_info(&mint_url).await
    }

    /// Cached info of a mint, refreshed from the mint on miss
    pub async fn mint_info(&self, mint_url: &MintUrl) -> Result<Option<MintInfo>, Error> {
        if let Some(info) = self.localstore.get_mint(mint_url).await? {
            return Ok(Some(info));
        }

        match self.client.get_mint_info(mint_url.clone()).await {
            Ok(info) => {
                self.localstore
                    .add_mint(mint_url.clone(), Some(info.clone()))
                    .await?;
                Ok(Some(info))
            }
            Err(err) => {
                tracing::warn!("Could not get mint info for {}: {}", mint_url, err);
                Ok(None)
            }
        }
    }

    /// Spendable (unreserved) balance of a mint for a unit
    pub async fn mint_balance(
        &self,
        mint_url: &MintUrl,
        unit: &CurrencyUnit,
    ) -> Result<Amount, Error> {
        let proofs = self
            .localstore
            .get_proofs(Some(mint_url.clone()), Some(unit.clone()))
            .await?;

        Ok(Amount::try_sum(
            proofs
                .iter()
                .filter(|p| !p.reservation.is_reserved())
                .map(|p| p.proof.amount),
        )?)
    }

    /// Spendable balance of the active mint
    pub async fn active_mint_balance(&self) -> Result<Amount, Error> {
        let mint_url = self.active_mint_url().await?;
        let unit = self.active_unit().await;
        self.mint_balance(&mint_url, &unit).await
    }

    /// Mints whose info advertises NUT-15 for `(method, unit)`
    #[instrument(skip(self))]
    pub async fn multi_mints(
        &self,
        method: &PaymentMethod,
        unit: &CurrencyUnit,
    ) -> Result<Vec<MintUrl>, Error> {
        let mut eligible = Vec::new();

        for mint_url in self.localstore.get_mints().await? {
            if let Some(info) = self.mint_info(&mint_url).await? {
                if info.supports_mpp(method, unit) {
                    eligible.push(mint_url);
                }
            }
        }

        eligible.sort();
        Ok(eligible)
    }

    /// Overall balance and per-mint weights over MPP-eligible mints
    #[instrument(skip(self))]
    pub async fn multi_mint_balance(
        &self,
        method: &PaymentMethod,
        unit: &CurrencyUnit,
    ) -> Result<MultiMintBalance, Error> {
        let mut weights = Vec::new();
        let mut overall = Amount::ZERO;

        for mint_url in self.multi_mints(method, unit).await? {
            let balance = self.mint_balance(&mint_url, unit).await?;
            if balance == Amount::ZERO {
                continue;
            }
            overall = overall
                .checked_add(balance)
                .ok_or(crate::amount::Error::AmountOverflow)?;
            weights.push(MintWeight {
                mint_url,
                balance,
                weight: 0.0,
            });
        }

        let total = u64::from(overall);
        if total > 0 {
            for entry in &mut weights {
                entry.weight = u64::from(entry.balance) as f64 / total as f64;
            }
        }

        Ok(MultiMintBalance { overall, weights })
    }
}
