//! Proof selection

use tracing::instrument;

use crate::nuts::{Proof, Proofs, ProofsMethods};
use crate::types::Reservation;
use crate::{Amount, Error, Wallet};

impl Wallet {
    /// Unreserved proofs of the active mint and unit
    #[instrument(skip(self))]
    pub async fn get_unspent_proofs(&self) -> Result<Proofs, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;

        Ok(self
            .localstore
            .get_proofs(Some(mint_url), Some(unit))
            .await?
            .into_iter()
            .filter(|info| !info.reservation.is_reserved())
            .map(|info| info.proof)
            .collect())
    }

    /// Proofs currently reserved, optionally only those bound to a quote
    #[instrument(skip(self))]
    pub async fn get_reserved_proofs(&self, quote_id: Option<&str>) -> Result<Proofs, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;

        Ok(self
            .localstore
            .get_proofs(Some(mint_url), Some(unit))
            .await?
            .into_iter()
            .filter(|info| match (&info.reservation, quote_id) {
                (Reservation::Reserved { .. }, None) => true,
                (Reservation::Reserved { quote_id: bound }, Some(wanted)) => {
                    bound.as_deref() == Some(wanted)
                }
                (Reservation::Unreserved, _) => false,
            })
            .map(|info| info.proof)
            .collect())
    }

    /// The unreserved proofs, after asserting they cover `amount`
    #[instrument(skip(self, proofs))]
    pub fn spendable_proofs(&self, proofs: Proofs, amount: Amount) -> Result<Proofs, Error> {
        let available = proofs.total_amount()?;
        if available < amount {
            return Err(Error::BalanceTooLow {
                available,
                required: amount,
            });
        }

        Ok(proofs)
    }

    /// Select proofs covering `amount`, greedily largest-first, re-checking
    /// fees as the set grows when `include_fees` is set.
    ///
    /// Returns an empty selection when the input cannot cover the target.
    #[instrument(skip(self, proofs))]
    pub async fn select_proofs_to_send(
        &self,
        proofs: Proofs,
        amount: Amount,
        include_fees: bool,
    ) -> Result<Proofs, Error> {
        if proofs.total_amount()? < amount {
            return Ok(vec![]);
        }

        let mut remaining = proofs;
        remaining.sort_by(|a: &Proof, b: &Proof| b.amount.cmp(&a.amount));

        let mut selected: Proofs = Vec::new();

        for proof in remaining {
            selected.push(proof);

            let fees = if include_fees {
                self.get_proofs_fee(&selected).await?
            } else {
                Amount::ZERO
            };

            if selected.total_amount()? >= amount + fees {
                return Ok(selected);
            }
        }

        // fees pushed the target over the total
        Ok(vec![])
    }

    /// Fallback selection that drains legacy base64-keyset proofs:
    /// non-hex ids only, largest first, empty when unsatisfiable.
    #[instrument(skip(proofs))]
    pub fn select_legacy_base64(proofs: &Proofs, amount: Amount) -> Proofs {
        let mut legacy: Proofs = proofs
            .iter()
            .filter(|p| !p.keyset_id.is_hex())
            .cloned()
            .collect();
        legacy.sort_by(|a: &Proof, b: &Proof| b.amount.cmp(&a.amount));

        let mut selected: Proofs = Vec::new();
        let mut total = Amount::ZERO;

        for proof in legacy {
            if total >= amount {
                break;
            }
            total += proof.amount;
            selected.push(proof);
        }

        if total >= amount {
            selected
        } else {
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::nuts::{KeysetId, PublicKey};
    use crate::secret::Secret;
    use crate::wallet::test_utils::{test_wallet, TEST_KEYSET};
    use crate::wallet::Wallet;

    fn proof(amount: u64, keyset: &str, secret: &str) -> Proof {
        Proof::new(
            Amount::from(amount),
            KeysetId::from_str(keyset).unwrap(),
            Secret::new(secret),
            PublicKey::from_hex(
                "02bc9097997d81afb2cc7346b5e4345a9346bd2a506eb7958598a72f0cf85163ea",
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_select_covers_amount() {
        let (wallet, _db) = test_wallet(0).await;

        let proofs = vec![
            proof(512, TEST_KEYSET, "a"),
            proof(256, TEST_KEYSET, "b"),
            proof(64, TEST_KEYSET, "c"),
        ];

        let selected = wallet
            .select_proofs_to_send(proofs, Amount::from(300), false)
            .await
            .unwrap();
        assert_eq!(selected.total_amount().unwrap(), Amount::from(512));

        // empty input selects nothing
        let selected = wallet
            .select_proofs_to_send(vec![], Amount::from(1), false)
            .await
            .unwrap();
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_select_includes_fees() {
        let (wallet, _db) = test_wallet(1000).await;

        // 1000 ppk: every selected proof costs 1 in fees
        let proofs = vec![proof(8, TEST_KEYSET, "a"), proof(2, TEST_KEYSET, "b")];

        let selected = wallet
            .select_proofs_to_send(proofs.clone(), Amount::from(8), true)
            .await
            .unwrap();
        // 8 alone cannot cover 8 + fee(1); both proofs are needed
        assert_eq!(selected.total_amount().unwrap(), Amount::from(10));

        let selected = wallet
            .select_proofs_to_send(proofs, Amount::from(7), true)
            .await
            .unwrap();
        assert_eq!(selected.total_amount().unwrap(), Amount::from(8));
    }

    #[tokio::test]
    async fn test_select_insufficient_returns_empty() {
        let (wallet, _db) = test_wallet(0).await;
        let proofs = vec![proof(4, TEST_KEYSET, "a")];

        let selected = wallet
            .select_proofs_to_send(proofs, Amount::from(5), false)
            .await
            .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_select_legacy_base64() {
        let proofs = vec![
            proof(64, TEST_KEYSET, "hex"),
            proof(32, "vA9dYbPEPfon", "l1"),
            proof(8, "vA9dYbPEPfon", "l2"),
        ];

        // only legacy proofs are considered
        let selected = Wallet::select_legacy_base64(&proofs, Amount::from(33));
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|p| !p.keyset_id.is_hex()));

        // unsatisfiable from legacy alone
        let selected = Wallet::select_legacy_base64(&proofs, Amount::from(64));
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_spendable_proofs_asserts_balance() {
        let (wallet, _db) = test_wallet(0).await;
        let proofs = vec![proof(4, TEST_KEYSET, "a")];

        assert!(wallet
            .spendable_proofs(proofs.clone(), Amount::from(4))
            .is_ok());
        assert!(matches!(
            wallet.spendable_proofs(proofs, Amount::from(5)),
            Err(Error::BalanceTooLow { .. })
        ));
    }
}
