//! Mint (receive over Lightning)

use tracing::instrument;

use crate::invoice::{InvoiceHistory, InvoiceStatus, TokenHistory};
use crate::nuts::{
    MintQuoteBolt11Request, MintQuoteBolt11Response, MintQuoteState, MintRequest, Proofs,
    ProofsMethods, Token,
};
use crate::seed::COUNTER_RESYNC_JUMP;
use crate::types::MintQuote;
use crate::{Amount, Error, Wallet};

impl Wallet {
    /// Request a mint quote for `amount` and record a pending incoming
    /// invoice entry for it.
    #[instrument(skip(self))]
    pub async fn request_mint_quote(&self, amount: Amount) -> Result<MintQuote, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;

        let response = self
            .client
            .post_mint_quote(
                mint_url.clone(),
                MintQuoteBolt11Request {
                    amount,
                    unit: unit.clone(),
                    description: None,
                },
            )
            .await?;

        let quote = MintQuote {
            id: response.quote,
            mint_url: mint_url.clone(),
            amount,
            unit: unit.clone(),
            request: response.request,
            state: response.state,
            expiry: response.expiry,
        };

        self.localstore
            .add_invoice(InvoiceHistory::incoming(
                amount,
                quote.request.clone(),
                quote.id.clone(),
                String::new(),
                Some(mint_url),
                Some(unit),
            ))
            .await?;

        Ok(quote)
    }

    /// Query the state of a mint quote
    #[instrument(skip(self))]
    pub async fn check_mint_quote(
        &self,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        self.client.get_mint_quote_status(mint_url, quote_id).await
    }

    /// Mint proofs for a paid quote
    #[instrument(skip(self))]
    pub async fn mint(&self, amount: Amount, quote_id: &str) -> Result<Proofs, Error> {
        let _operation = self.op_lock.lock().await;
        self.mint_internal(amount, quote_id).await
    }

    async fn mint_internal(&self, amount: Amount, quote_id: &str) -> Result<Proofs, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;

        let status = self
            .client
            .get_mint_quote_status(mint_url.clone(), quote_id)
            .await?;

        match status.state {
            MintQuoteState::Paid => {}
            MintQuoteState::Issued => {
                // minted elsewhere; settle the history entry and stop
                self.localstore
                    .update_invoice(quote_id, InvoiceStatus::Paid, None)
                    .await?;
                return Err(Error::InvoiceAlreadyPaid);
            }
            MintQuoteState::Unpaid => return Err(Error::InvoiceNotPaidYet),
        }

        let keyset = self.active_keyset().await?;
        let counter = self.seed_store.counter(&keyset.id).await?;
        let seed = self.seed_store.seed().await?;

        let premint =
            self.crypto
                .premint_secrets(&keyset.id, &seed, counter, &amount.split())?;

        let request = MintRequest {
            quote: quote_id.to_string(),
            outputs: premint.blinded_messages(),
        };

        let response = match self.client.post_mint(mint_url.clone(), request).await {
            Ok(response) => response,
            Err(err) if err.is_outputs_already_signed() => {
                // resync the derivation index and ask the user to retry
                self.seed_store
                    .bump_counter(&keyset.id, COUNTER_RESYNC_JUMP)
                    .await?;
                tracing::warn!(
                    "Mint already signed outputs for keyset {}; counter jumped",
                    keyset.id
                );
                return Err(Error::OutputsAlreadyBeenSigned);
            }
            Err(err) => return Err(err),
        };

        let keys = self.keyset_keys(&keyset.id).await?;
        let proofs = self
            .crypto
            .construct_proofs(response.signatures, &premint, &keys)?;

        self.seed_store
            .bump_counter(&keyset.id, proofs.len() as i64)
            .await?;

        let proof_infos = self.proof_infos(&proofs).await?;
        self.localstore.update_proofs(proof_infos, vec![]).await?;

        self.localstore
            .update_invoice(quote_id, InvoiceStatus::Paid, None)
            .await?;

        let total = proofs.total_amount()?;
        let token = Token::new(
            mint_url.clone(),
            proofs.clone(),
            None,
            Some(unit.clone()),
        );
        self.localstore
            .add_token_history(TokenHistory::received(
                total,
                token.to_string(),
                Some(mint_url),
                Some(unit),
            ))
            .await?;

        tracing::debug!("Minted {} for quote {}", total, quote_id);

        Ok(proofs)
    }

    /// Polling fallback for an incoming quote: mint when it is paid.
    #[instrument(skip(self))]
    pub async fn check_invoice(&self, amount: Amount, quote_id: &str) -> Result<Proofs, Error> {
        let status = self.check_mint_quote(quote_id).await?;

        match status.state {
            MintQuoteState::Paid => self.mint(amount, quote_id).await,
            MintQuoteState::Issued => {
                self.localstore
                    .update_invoice(quote_id, InvoiceStatus::Paid, None)
                    .await?;
                Err(Error::InvoiceAlreadyPaid)
            }
            MintQuoteState::Unpaid => Err(Error::InvoiceNotPaidYet),
        }
    }
}
