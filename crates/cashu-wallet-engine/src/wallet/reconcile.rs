//! Spent-state reconciliation

use std::collections::HashSet;
use std::str::FromStr;

use tracing::instrument;

use crate::invoice::{InvoiceStatus, TokenHistory};
use crate::nuts::nut17::{Kind, Params};
use crate::nuts::{
    CheckStateRequest, MintQuoteState, NotificationPayload, PaymentMethod, Proofs,
    ProofsMethods, State, Token,
};
use crate::types::MintQuote;
use crate::wallet::subscription::subscribe_ws;
use crate::{Error, Wallet};

impl Wallet {
    /// Ask the mint which of `proofs` are spent, drop the spent ones from
    /// the store, and return them.
    ///
    /// Running this twice over the same inputs leaves the store unchanged
    /// the second time.
    #[instrument(skip(self, proofs))]
    pub async fn check_proofs_spendable(
        &self,
        proofs: Proofs,
        update_history: bool,
    ) -> Result<Proofs, Error> {
        if proofs.is_empty() {
            return Ok(vec![]);
        }

        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;
        let ys = self.ys(&proofs)?;

        let response = self
            .client
            .post_check_state(mint_url.clone(), CheckStateRequest { ys: ys.clone() })
            .await?;

        let spent_ys: HashSet<_> = response
            .states
            .iter()
            .filter(|state| state.state == State::Spent)
            .map(|state| state.y.clone())
            .collect();

        let spent: Proofs = proofs
            .into_iter()
            .zip(ys)
            .filter(|(_, y)| spent_ys.contains(y))
            .map(|(proof, _)| proof)
            .collect();

        if spent.is_empty() {
            return Ok(vec![]);
        }

        self.localstore
            .update_proofs(vec![], self.ys(&spent)?)
            .await?;

        if update_history {
            let total = spent.total_amount()?;
            let token = Token::new(mint_url.clone(), spent.clone(), None, Some(unit.clone()));
            self.localstore
                .add_token_history(TokenHistory {
                    amount: -(u64::from(total) as i64),
                    token: token.to_string(),
                    date: crate::types::unix_time(),
                    status: InvoiceStatus::Paid,
                    mint_url: Some(mint_url),
                    unit: Some(unit),
                })
                .await?;
        }

        tracing::debug!("{} proofs confirmed spent", spent.len());

        Ok(spent)
    }

    /// Reconcile a sent token against the mint.
    ///
    /// Fully spent marks the history entry paid; partially spent splits it
    /// into a paid portion and a new pending portion for the unspent
    /// proofs, preserving the entry's sign. Returns whether the token is
    /// fully spent.
    #[instrument(skip_all)]
    pub async fn check_token_spendable(&self, token: &str) -> Result<bool, Error> {
        let parsed = Token::from_str(token).map_err(|e| Error::DecodeFailed(e.to_string()))?;
        let mint_url = parsed.mint_url()?;

        self.registry
            .activate_mint_url(mint_url.clone(), parsed.unit())
            .await?;

        let proofs = parsed.proofs();
        let spent = self.check_proofs_spendable(proofs.clone(), false).await?;

        if spent.is_empty() {
            return Ok(false);
        }

        if spent.len() == proofs.len() {
            self.localstore
                .update_token_history_status(token, InvoiceStatus::Paid)
                .await?;
            return Ok(true);
        }

        // partial spend: split the entry, keeping the original sign
        if let Some(entry) = self
            .localstore
            .get_token_history()
            .await?
            .into_iter()
            .find(|entry| entry.token == token)
        {
            let sign: i64 = if entry.amount < 0 { -1 } else { 1 };

            let spent_secrets: HashSet<_> =
                spent.iter().map(|proof| proof.secret.clone()).collect();
            let unspent: Proofs = proofs
                .into_iter()
                .filter(|proof| !spent_secrets.contains(&proof.secret))
                .collect();

            let spent_total = spent.total_amount()?;
            let unspent_total = unspent.total_amount()?;
            let unspent_token = Token::new(
                mint_url,
                unspent,
                parsed.memo(),
                parsed.unit(),
            );

            self.localstore.remove_token_history(token).await?;
            self.localstore
                .add_token_history(TokenHistory {
                    amount: sign * u64::from(spent_total) as i64,
                    token: token.to_string(),
                    date: entry.date,
                    status: InvoiceStatus::Paid,
                    mint_url: entry.mint_url.clone(),
                    unit: entry.unit.clone(),
                })
                .await?;
            self.localstore
                .add_token_history(TokenHistory {
                    amount: sign * u64::from(unspent_total) as i64,
                    token: unspent_token.to_string(),
                    date: entry.date,
                    status: InvoiceStatus::Pending,
                    mint_url: entry.mint_url,
                    unit: entry.unit,
                })
                .await?;
        }

        Ok(false)
    }

    /// Watch a sent token until it is spent.
    ///
    /// Subscribes to one representative proof over NUT-17 when the mint
    /// supports it and reconciles on SPENT; otherwise the polling worker
    /// takes over.
    #[instrument(skip_all)]
    pub async fn on_token_paid(&self, token: &str) -> Result<(), Error> {
        let parsed = Token::from_str(token).map_err(|e| Error::DecodeFailed(e.to_string()))?;
        let mint_url = parsed.mint_url()?;
        let unit = self.registry.active_unit().await;

        let ws_supported = self
            .registry
            .mint_info(&mint_url)
            .await?
            .map(|info| {
                info.supports_ws_command(
                    &PaymentMethod::Bolt11,
                    &unit,
                    Kind::ProofState.as_command(),
                )
            })
            .unwrap_or(false);

        if ws_supported {
            if let Some(proof) = parsed.proofs().first() {
                let params = Params {
                    kind: Kind::ProofState,
                    filters: vec![self.proof_y(proof)?.to_hex()],
                    id: uuid::Uuid::new_v4().to_string(),
                };

                match subscribe_ws(&mint_url, params).await {
                    Ok(mut subscription) => {
                        while let Some(payload) = subscription.recv().await {
                            if let NotificationPayload::ProofState(proof_state) = payload {
                                if proof_state.state == State::Spent {
                                    self.check_token_spendable(token).await?;
                                    break;
                                }
                            }
                        }
                        subscription.unsubscribe().await;
                        return Ok(());
                    }
                    Err(err) => {
                        tracing::warn!("Subscription setup failed: {err}; polling instead");
                    }
                }
            }
        }

        self.workers.enqueue_token_check(token);
        Ok(())
    }

    /// Watch an incoming mint quote until it is paid, then mint.
    ///
    /// NUT-17 `bolt11_mint_quote` when advertised, polling worker
    /// otherwise. Returns the minted proofs when the websocket path
    /// completed the flow.
    #[instrument(skip(self, quote), fields(quote_id = %quote.id))]
    pub async fn mint_on_paid(&self, quote: &MintQuote) -> Result<Option<Proofs>, Error> {
        let ws_supported = self
            .registry
            .mint_info(&quote.mint_url)
            .await?
            .map(|info| {
                info.supports_ws_command(
                    &PaymentMethod::Bolt11,
                    &quote.unit,
                    Kind::Bolt11MintQuote.as_command(),
                )
            })
            .unwrap_or(false);

        if ws_supported {
            let params = Params {
                kind: Kind::Bolt11MintQuote,
                filters: vec![quote.id.clone()],
                id: uuid::Uuid::new_v4().to_string(),
            };

            match subscribe_ws(&quote.mint_url, params).await {
                Ok(mut subscription) => {
                    while let Some(payload) = subscription.recv().await {
                        if let NotificationPayload::MintQuoteBolt11Response(status) = payload {
                            if status.state == MintQuoteState::Paid {
                                let proofs = self.mint(quote.amount, &quote.id).await?;
                                subscription.unsubscribe().await;
                                return Ok(Some(proofs));
                            }
                        }
                    }
                    subscription.unsubscribe().await;
                    return Ok(None);
                }
                Err(err) => {
                    tracing::warn!("Subscription setup failed: {err}; polling instead");
                }
            }
        }

        self.workers.enqueue_invoice_check(&quote.id);
        Ok(None)
    }
}
