//! Send / split

use tracing::instrument;

use crate::nuts::{Proofs, ProofsMethods, SwapRequest};
use crate::seed::COUNTER_RESYNC_JUMP;
use crate::types::Reservation;
use crate::{Amount, Error, Wallet};

impl Wallet {
    /// Produce proofs worth `amount` to hand to a recipient.
    ///
    /// Swaps through the mint when no exact subset exists. The returned
    /// proofs are reserved in the store; `invalidate` removes them instead
    /// (self-burn, for tokens leaving the wallet immediately).
    #[instrument(skip(self))]
    pub async fn send(
        &self,
        amount: Amount,
        invalidate: bool,
        include_fees: bool,
    ) -> Result<Proofs, Error> {
        let _operation = self.op_lock.lock().await;
        self.send_internal(amount, invalidate, include_fees).await
    }

    pub(crate) async fn send_internal(
        &self,
        amount: Amount,
        invalidate: bool,
        include_fees: bool,
    ) -> Result<Proofs, Error> {
        let proofs = self.get_unspent_proofs().await?;
        let proofs = self.spendable_proofs(proofs, amount)?;
        let keyset = self.active_keyset().await?;

        let candidates = if keyset.id.is_hex() {
            self.select_proofs_to_send(proofs.clone(), amount, include_fees)
                .await?
        } else {
            // a legacy-only balance is drained with the legacy selector
            Self::select_legacy_base64(&proofs, amount)
        };

        if candidates.is_empty() {
            return Err(Error::BalanceTooLow {
                available: proofs.total_amount()?,
                required: amount,
            });
        }

        let candidate_ys = self.ys(&candidates)?;
        self.localstore
            .set_reservation(candidate_ys.clone(), Reservation::Reserved { quote_id: None })
            .await?;

        match self
            .swap_for_send(&candidates, amount, invalidate, include_fees)
            .await
        {
            Ok(send_proofs) => Ok(send_proofs),
            Err(err) => {
                self.localstore
                    .set_reservation(candidate_ys, Reservation::Unreserved)
                    .await?;

                if err.is_outputs_already_signed() {
                    self.seed_store
                        .bump_counter(&keyset.id, COUNTER_RESYNC_JUMP)
                        .await?;
                    tracing::warn!(
                        "Mint already signed outputs for keyset {}; counter jumped",
                        keyset.id
                    );
                    return Err(Error::OutputsAlreadyBeenSigned);
                }

                Err(err)
            }
        }
    }

    async fn swap_for_send(
        &self,
        candidates: &Proofs,
        amount: Amount,
        invalidate: bool,
        include_fees: bool,
    ) -> Result<Proofs, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let keyset = self.active_keyset().await?;

        let total = candidates.total_amount()?;
        let fees = if include_fees {
            self.get_proofs_fee(candidates).await?
        } else {
            Amount::ZERO
        };
        let send_target = amount + fees;

        if total == send_target {
            // exact match, nothing to split; candidates stay reserved as
            // the send proofs
            if invalidate {
                self.localstore
                    .update_proofs(vec![], self.ys(candidates)?)
                    .await?;
            }
            return Ok(candidates.clone());
        }

        // the mint takes its input fee out of the swap
        let input_fee = self.get_proofs_fee(candidates).await?;
        let keep_total = total
            .checked_sub(send_target)
            .and_then(|rest| rest.checked_sub(input_fee))
            .ok_or(Error::BalanceTooLow {
                available: total,
                required: send_target + input_fee,
            })?;

        let mut amounts = send_target.split();
        let send_count = amounts.len();
        amounts.extend(keep_total.split());

        let counter = self.seed_store.counter(&keyset.id).await?;
        let seed = self.seed_store.seed().await?;
        let premint = self
            .crypto
            .premint_secrets(&keyset.id, &seed, counter, &amounts)?;

        // the counter moves ahead of the swap call; if we die here the
        // mint's derivation index can never be reused
        self.seed_store
            .bump_counter(&keyset.id, amounts.len() as i64)
            .await?;

        let response = self
            .client
            .post_swap(
                mint_url,
                SwapRequest {
                    inputs: candidates.clone(),
                    outputs: premint.blinded_messages(),
                },
            )
            .await?;

        let keys = self.keyset_keys(&keyset.id).await?;
        let swapped = self
            .crypto
            .construct_proofs(response.signatures, &premint, &keys)?;

        let send_proofs: Proofs = swapped[..send_count].to_vec();
        let keep_proofs: Proofs = swapped[send_count..].to_vec();

        let mut added = self.proof_infos(&keep_proofs).await?;
        if !invalidate {
            added.extend(
                self.proof_infos(&send_proofs)
                    .await?
                    .into_iter()
                    .map(|info| info.reserved(None)),
            );
        }

        self.localstore
            .update_proofs(added, self.ys(candidates)?)
            .await?;

        tracing::debug!(
            "Swapped {} into {} send / {} keep",
            total,
            send_target,
            keep_total
        );

        Ok(send_proofs)
    }
}
