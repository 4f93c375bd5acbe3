//! Melt (pay over Lightning)

use tracing::instrument;

use crate::invoice::{InvoiceHistory, InvoiceStatus, TokenHistory};
use crate::mint_url::MintUrl;
use crate::nuts::{
    MeltOptions, MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltQuoteState, MeltRequest,
    PaymentMethod, ProofsMethods, Token,
};
use crate::seed::COUNTER_RESYNC_JUMP;
use crate::types::{Melted, MeltQuote, Reservation};
use crate::wallet::registry::MintWeight;
use crate::wallet::session::QuoteLatch;
use crate::{Amount, Error, Wallet};

/// One mint's share of a multi-path melt
#[derive(Debug, Clone)]
pub struct MppQuotePart {
    /// Mint the partial quote was created at
    pub mint_url: MintUrl,
    /// Request sent to the mint
    pub payload: MeltQuoteBolt11Request,
    /// The mint's quote
    pub response: MeltQuoteBolt11Response,
}

impl Wallet {
    /// Request a melt quote for a bolt11 invoice.
    ///
    /// Serialized through the session `blocking` latch; the response and
    /// any error message are kept on the session for the UI.
    #[instrument(skip(self, request))]
    pub async fn melt_quote(&self, request: &str) -> Result<MeltQuote, Error> {
        let _latch = QuoteLatch::engage(self.session.clone())?;

        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;

        let result = self
            .client
            .post_melt_quote(
                mint_url,
                MeltQuoteBolt11Request {
                    request: request.to_string(),
                    unit: unit.clone(),
                    options: None,
                },
            )
            .await;

        match result {
            Ok(response) => {
                let quote = MeltQuote {
                    id: response.quote.clone(),
                    unit,
                    amount: response.amount,
                    request: request.to_string(),
                    fee_reserve: response.fee_reserve,
                    state: response.state,
                    expiry: response.expiry,
                };

                self.with_session(|session| {
                    session.melt_quote = Some(response);
                    session.error = None;
                });

                Ok(quote)
            }
            Err(err) => {
                self.with_session(|session| session.error = Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Create NUT-15 partial melt quotes across every MPP-capable mint.
    ///
    /// Partials are allocated by balance weight in fixed-point millisats;
    /// the first mint error aborts the fan-out.
    #[instrument(skip(self))]
    pub async fn multi_path_melt_quotes(&self) -> Result<Vec<MppQuotePart>, Error> {
        let _latch = QuoteLatch::engage(self.session.clone())?;

        let invoice = self
            .with_session(|session| session.invoice.clone())
            .ok_or_else(|| Error::DecodeFailed("No pending invoice".to_string()))?;
        let invoice_sat = invoice
            .amount_sat
            .ok_or_else(|| Error::DecodeFailed("Invoice has no amount".to_string()))?;

        let unit = self.registry.active_unit().await;
        let method = PaymentMethod::Bolt11;

        if self.registry.multi_mints(&method, &unit).await?.is_empty() {
            return Err(Error::NoMintSupportsMpp);
        }

        let balance = self.registry.multi_mint_balance(&method, &unit).await?;
        if u64::from(balance.overall) < invoice_sat {
            return Err(Error::InsufficientMultiMintBalance {
                available: balance.overall,
                required: Amount::from(invoice_sat),
            });
        }

        let mut parts = Vec::new();

        for (mint_url, partial_sat) in allocate_partials(invoice_sat, &balance.weights) {
            if partial_sat == 0 {
                continue;
            }

            let payload = MeltQuoteBolt11Request {
                request: invoice.bolt11.clone(),
                unit: unit.clone(),
                options: Some(MeltOptions::new_mpp(partial_sat * 1000)),
            };

            let response = match self
                .client
                .post_melt_quote(mint_url.clone(), payload.clone())
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!("MPP quote failed at {}: {}", mint_url, err);
                    self.with_session(|session| session.error = Some(err.to_string()));
                    return Err(err);
                }
            };

            parts.push(MppQuotePart {
                mint_url,
                payload,
                response,
            });
        }

        self.with_session(|session| session.mpp_quotes = parts.clone());

        Ok(parts)
    }

    /// Pay the Lightning invoice behind a melt quote.
    #[instrument(skip(self, quote), fields(quote_id = %quote.id))]
    pub async fn melt(&self, quote: &MeltQuote) -> Result<Melted, Error> {
        if self.with_session(|session| session.is_blocking()) {
            return Err(Error::AlreadyProcessingQuote);
        }

        // a bolt11 we already paid must not be paid twice
        let already_paid = self
            .localstore
            .get_invoices()
            .await?
            .iter()
            .any(|entry| {
                entry.bolt11 == quote.request
                    && entry.status == InvoiceStatus::Paid
                    && entry.amount < 0
            });
        if already_paid {
            return Err(Error::InvoiceAlreadyPaid);
        }

        let _operation = self.op_lock.lock().await;

        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;
        let amount = quote.amount_with_fee_reserve();

        let send_proofs = self.send_internal(amount, false, true).await?;
        let send_ys = self.ys(&send_proofs)?;

        // the pending record goes in before the mint call so it survives a
        // crash mid-payment
        self.localstore
            .add_invoice(InvoiceHistory::outgoing(
                amount,
                quote.request.clone(),
                quote.id.clone(),
                "Outgoing invoice".to_string(),
                Some(mint_url.clone()),
                Some(unit.clone()),
            ))
            .await?;
        self.localstore
            .set_reservation(
                send_ys.clone(),
                Reservation::Reserved {
                    quote_id: Some(quote.id.clone()),
                },
            )
            .await?;

        let keyset = self.active_keyset().await?;
        let change_count = change_output_count(quote.fee_reserve);
        let delta = (send_proofs.len() + change_count) as i64;

        let counter = self.seed_store.counter(&keyset.id).await?;
        let seed = self.seed_store.seed().await?;
        let change_premint = if change_count > 0 {
            Some(self.crypto.premint_secrets(
                &keyset.id,
                &seed,
                counter,
                &vec![Amount::ZERO; change_count],
            )?)
        } else {
            None
        };

        self.seed_store.bump_counter(&keyset.id, delta).await?;

        let request = MeltRequest {
            quote: quote.id.clone(),
            inputs: send_proofs.clone(),
            outputs: change_premint
                .as_ref()
                .map(|premint| premint.blinded_messages()),
        };

        let result = async {
            let response = self.client.post_melt(mint_url.clone(), request).await?;

            match response.state {
                MeltQuoteState::Paid => {}
                MeltQuoteState::Pending => return Err(Error::InvoiceStillPending),
                MeltQuoteState::Unpaid => return Err(Error::PaymentFailed),
            }

            let change = match (&change_premint, response.change) {
                (Some(premint), Some(signatures)) if !signatures.is_empty() => {
                    let keys = self.keyset_keys(&keyset.id).await?;
                    self.crypto.construct_proofs(signatures, premint, &keys)?
                }
                _ => vec![],
            };

            let change_total = change.total_amount()?;
            let amount_paid = amount
                .checked_sub(change_total)
                .ok_or(crate::amount::Error::AmountOverflow)?;

            let change_infos = self.proof_infos(&change).await?;
            self.localstore
                .update_proofs(change_infos, send_ys.clone())
                .await?;

            let spent_token = Token::new(
                mint_url.clone(),
                send_proofs.clone(),
                None,
                Some(unit.clone()),
            );
            self.localstore
                .add_token_history(TokenHistory {
                    amount: -(u64::from(amount_paid) as i64),
                    token: spent_token.to_string(),
                    date: crate::types::unix_time(),
                    status: InvoiceStatus::Paid,
                    mint_url: Some(mint_url.clone()),
                    unit: Some(unit.clone()),
                })
                .await?;

            self.localstore
                .update_invoice(
                    &quote.id,
                    InvoiceStatus::Paid,
                    Some(-(u64::from(amount_paid) as i64)),
                )
                .await?;

            tracing::debug!("Melted {} (change {})", amount_paid, change_total);

            Ok(Melted {
                state: MeltQuoteState::Paid,
                preimage: response.payment_preimage,
                amount_paid,
                change,
            })
        }
        .await;

        match result {
            Ok(melted) => Ok(melted),
            Err(err) => {
                if self.is_unloading() {
                    // the payment may still settle after the process exits;
                    // leave everything in place
                    tracing::warn!("Melt failed while unloading; skipping rollback");
                    return Err(err);
                }

                let confirmed_unpaid = matches!(
                    self.client
                        .get_melt_quote_status(mint_url.clone(), &quote.id)
                        .await,
                    Ok(status) if status.state == MeltQuoteState::Unpaid
                );

                if !confirmed_unpaid {
                    tracing::warn!(
                        "Melt {} failed but quote is not UNPAID; keeping reservations",
                        quote.id
                    );
                    return Err(Error::PaymentPossiblyInFlight);
                }

                self.localstore
                    .set_reservation(send_ys, Reservation::Unreserved)
                    .await?;
                self.seed_store.bump_counter(&keyset.id, -delta).await?;
                self.localstore.remove_invoice(&quote.id).await?;

                if err.is_outputs_already_signed() {
                    self.seed_store
                        .bump_counter(&keyset.id, COUNTER_RESYNC_JUMP)
                        .await?;
                    return Err(Error::OutputsAlreadyBeenSigned);
                }

                tracing::info!("Melt {} rolled back", quote.id);
                Err(Error::PaymentFailed)
            }
        }
    }

    /// Polling fallback for an outgoing quote.
    ///
    /// PAID finalizes the payment record and burns the reserved inputs;
    /// UNPAID releases them; PENDING changes nothing.
    #[instrument(skip(self))]
    pub async fn check_outgoing_invoice(&self, quote_id: &str) -> Result<MeltQuoteState, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;

        let status = self
            .client
            .get_melt_quote_status(mint_url.clone(), quote_id)
            .await?;

        match status.state {
            MeltQuoteState::Paid => {
                let reserved = self.get_reserved_proofs(Some(quote_id)).await?;
                if !reserved.is_empty() {
                    let spent_total = reserved.total_amount()?;
                    let ys = self.ys(&reserved)?;
                    self.localstore.update_proofs(vec![], ys).await?;

                    let spent_token =
                        Token::new(mint_url, reserved, None, Some(unit.clone()));
                    self.localstore
                        .add_token_history(TokenHistory {
                            amount: -(u64::from(spent_total) as i64),
                            token: spent_token.to_string(),
                            date: crate::types::unix_time(),
                            status: InvoiceStatus::Paid,
                            mint_url: None,
                            unit: Some(unit),
                        })
                        .await?;
                }

                self.localstore
                    .update_invoice(quote_id, InvoiceStatus::Paid, None)
                    .await?;

                Ok(MeltQuoteState::Paid)
            }
            MeltQuoteState::Pending => Err(Error::InvoiceStillPending),
            MeltQuoteState::Unpaid => {
                let reserved = self.get_reserved_proofs(Some(quote_id)).await?;
                if !reserved.is_empty() {
                    let ys = self.ys(&reserved)?;
                    self.localstore
                        .set_reservation(ys, Reservation::Unreserved)
                        .await?;
                }
                self.localstore.remove_invoice(quote_id).await?;

                Ok(MeltQuoteState::Unpaid)
            }
        }
    }
}

/// Number of blank change outputs for a fee reserve [NUT-08]
pub(crate) fn change_output_count(fee_reserve: Amount) -> usize {
    let fee_reserve = u64::from(fee_reserve);
    if fee_reserve == 0 {
        return 0;
    }

    let ceil_log2 = (64 - (fee_reserve - 1).leading_zeros()) as usize;
    ceil_log2.max(1)
}

/// Allocate per-mint partial amounts by balance weight.
///
/// Fixed-point millisat accumulator, rounding half up, with the residual
/// carried between mints; the last mint takes the exact remainder so the
/// partials always sum to `invoice_sat`.
pub(crate) fn allocate_partials(
    invoice_sat: u64,
    weights: &[MintWeight],
) -> Vec<(MintUrl, u64)> {
    let total: u128 = weights.iter().map(|w| u128::from(u64::from(w.balance))).sum();
    if total == 0 {
        return vec![];
    }

    let invoice_msat = u128::from(invoice_sat) * 1000;
    let mut carry_msat: i128 = 0;
    let mut allocated: u64 = 0;
    let mut out = Vec::with_capacity(weights.len());

    for (index, weight) in weights.iter().enumerate() {
        let partial_sat = if index == weights.len() - 1 {
            invoice_sat - allocated
        } else {
            let ideal_msat =
                (invoice_msat * u128::from(u64::from(weight.balance)) / total) as i128;
            let with_carry = ideal_msat + carry_msat;
            let rounded_sat = ((with_carry + 500) / 1000).max(0) as u64;
            let capped = rounded_sat.min(invoice_sat - allocated);
            carry_msat = with_carry - i128::from(capped) * 1000;
            capped
        };

        allocated += partial_sat;
        out.push((weight.mint_url.clone(), partial_sat));
    }

    out
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn weights(balances: &[u64]) -> Vec<MintWeight> {
        let total: u64 = balances.iter().sum();
        balances
            .iter()
            .enumerate()
            .map(|(i, balance)| MintWeight {
                mint_url: MintUrl::from_str(&format!("https://mint{i}.example.com")).unwrap(),
                balance: Amount::from(*balance),
                weight: *balance as f64 / total as f64,
            })
            .collect()
    }

    #[test]
    fn test_change_output_count() {
        assert_eq!(change_output_count(Amount::ZERO), 0);
        assert_eq!(change_output_count(Amount::from(1)), 1);
        assert_eq!(change_output_count(Amount::from(2)), 1);
        assert_eq!(change_output_count(Amount::from(5)), 3);
        assert_eq!(change_output_count(Amount::from(8)), 3);
        assert_eq!(change_output_count(Amount::from(9)), 4);
    }

    #[test]
    fn test_allocation_preserves_total() {
        let partials = allocate_partials(333, &weights(&[500, 300, 200]));

        let amounts: Vec<u64> = partials.iter().map(|(_, a)| *a).collect();
        assert_eq!(amounts, vec![167, 99, 67]);
        assert_eq!(amounts.iter().sum::<u64>(), 333);
    }

    #[test]
    fn test_allocation_no_negative_partials() {
        for invoice in [1_u64, 3, 100, 999, 100_000] {
            for balances in [&[1_u64, 1, 1][..], &[1000, 1, 1], &[7, 993]] {
                let partials = allocate_partials(invoice, &weights(balances));
                let sum: u64 = partials.iter().map(|(_, a)| *a).sum();
                assert_eq!(sum, invoice, "invoice {invoice} balances {balances:?}");
            }
        }
    }

    #[test]
    fn test_allocation_single_mint_takes_all() {
        let partials = allocate_partials(555, &weights(&[1000]));
        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].1, 555);
    }
}
