//! Receive tokens

use std::str::FromStr;

use tracing::instrument;

use crate::invoice::TokenHistory;
use crate::nuts::{ProofsMethods, SwapRequest, Token};
use crate::seed::COUNTER_RESYNC_JUMP;
use crate::{Amount, Error, Wallet};

impl Wallet {
    /// Redeem a pasted or scanned token.
    ///
    /// Activates the token's mint, swaps the token proofs into freshly
    /// derived ones and records a received-token history entry. Returns the
    /// amount credited after the mint's input fee.
    #[instrument(skip_all)]
    pub async fn receive(&self, token: &str) -> Result<Amount, Error> {
        let _operation = self.op_lock.lock().await;

        let parsed = Token::from_str(token).map_err(|e| Error::DecodeFailed(e.to_string()))?;
        let mint_url = parsed.mint_url()?;

        self.registry
            .activate_mint_url(mint_url.clone(), parsed.unit())
            .await?;

        let inputs = parsed.proofs();
        if inputs.is_empty() {
            return Err(Error::DecodeFailed("Token carries no proofs".to_string()));
        }

        let total = inputs.total_amount()?;
        let input_fee = self.get_proofs_fee(&inputs).await.unwrap_or(Amount::ZERO);
        let credited = total
            .checked_sub(input_fee)
            .ok_or(Error::BalanceTooLow {
                available: total,
                required: input_fee,
            })?;

        let keyset = self.active_keyset().await?;
        let counter = self.seed_store.counter(&keyset.id).await?;
        let seed = self.seed_store.seed().await?;

        let premint =
            self.crypto
                .premint_secrets(&keyset.id, &seed, counter, &credited.split())?;

        self.seed_store
            .bump_counter(&keyset.id, premint.len() as i64)
            .await?;

        let response = match self
            .client
            .post_swap(
                mint_url.clone(),
                SwapRequest {
                    inputs,
                    outputs: premint.blinded_messages(),
                },
            )
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_outputs_already_signed() => {
                self.seed_store
                    .bump_counter(&keyset.id, COUNTER_RESYNC_JUMP)
                    .await?;
                return Err(Error::OutputsAlreadyBeenSigned);
            }
            Err(err) => return Err(err),
        };

        let keys = self.keyset_keys(&keyset.id).await?;
        let proofs = self
            .crypto
            .construct_proofs(response.signatures, &premint, &keys)?;

        let proof_infos = self.proof_infos(&proofs).await?;
        self.localstore.update_proofs(proof_infos, vec![]).await?;

        self.localstore
            .add_token_history(TokenHistory::received(
                credited,
                token.to_string(),
                Some(mint_url),
                parsed.unit(),
            ))
            .await?;

        tracing::debug!("Received token worth {}", credited);

        Ok(credited)
    }
}
