//! Keyset handling

use tracing::instrument;

use crate::nuts::{KeySetInfo, Keys, KeysetId};
use crate::{Error, Wallet};

impl Wallet {
    /// Get keys for a mint keyset
    ///
    /// From the localstore when they are already known, otherwise queried
    /// from the mint and cached.
    #[instrument(skip(self))]
    pub async fn keyset_keys(&self, keyset_id: &KeysetId) -> Result<Keys, Error> {
        let keys = if let Some(keys) = self.localstore.get_keys(keyset_id).await? {
            keys
        } else {
            let mint_url = self.registry.active_mint_url().await?;
            let keyset = self
                .client
                .get_mint_keyset(mint_url, keyset_id.clone())
                .await?;

            self.localstore
                .add_keys(keyset.id.clone(), keyset.keys.clone())
                .await?;

            keyset.keys
        };

        Ok(keys)
    }

    /// Query the mint for its keysets and cache them in mint order
    #[instrument(skip(self))]
    pub async fn refresh_keysets(&self) -> Result<Vec<KeySetInfo>, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let keysets = self.client.get_mint_keysets(mint_url.clone()).await?;

        self.localstore
            .add_mint_keysets(mint_url, keysets.keysets.clone())
            .await?;

        Ok(keysets.keysets)
    }

    /// Cached keysets of the active mint, fetched on miss
    #[instrument(skip(self))]
    pub async fn mint_keysets(&self) -> Result<Vec<KeySetInfo>, Error> {
        let mint_url = self.registry.active_mint_url().await?;

        match self.localstore.get_mint_keysets(&mint_url).await? {
            Some(keysets) => Ok(keysets),
            None => self.refresh_keysets().await,
        }
    }

    /// The keyset new outputs are derived for.
    ///
    /// Among the active keysets of the wallet unit, current hex ids win
    /// over legacy base64 ids; ties keep the mint's ordering.
    #[instrument(skip(self))]
    pub async fn active_keyset(&self) -> Result<KeySetInfo, Error> {
        let keysets = self.mint_keysets().await?;
        if keysets.is_empty() {
            return Err(Error::NoKeysets);
        }

        let unit = self.registry.active_unit().await;
        select_active_keyset(&keysets, &unit)
    }
}

/// Active-keyset selection rule, ordering hex ids before legacy ids and
/// preserving the mint's order within each group.
pub(crate) fn select_active_keyset(
    keysets: &[KeySetInfo],
    unit: &crate::nuts::CurrencyUnit,
) -> Result<KeySetInfo, Error> {
    let active: Vec<&KeySetInfo> = keysets
        .iter()
        .filter(|k| k.active && &k.unit == unit)
        .collect();

    active
        .iter()
        .find(|k| k.id.is_hex())
        .or_else(|| active.first())
        .map(|k| (*k).clone())
        .ok_or(Error::NoActiveKeysetsForUnit)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::nuts::CurrencyUnit;

    fn keyset(id: &str, unit: CurrencyUnit, active: bool) -> KeySetInfo {
        KeySetInfo {
            id: KeysetId::from_str(id).unwrap(),
            unit,
            active,
            input_fee_ppk: 0,
        }
    }

    #[test]
    fn test_hex_keysets_win_over_legacy() {
        let keysets = vec![
            keyset("vA9dYbPEPfon", CurrencyUnit::Sat, true),
            keyset("009a1f293253e41e", CurrencyUnit::Sat, true),
            keyset("00759e3f8b06b36f", CurrencyUnit::Sat, true),
        ];

        let selected = select_active_keyset(&keysets, &CurrencyUnit::Sat).unwrap();
        assert_eq!(selected.id.to_string(), "009a1f293253e41e");
    }

    #[test]
    fn test_legacy_selected_when_no_hex() {
        let keysets = vec![
            keyset("vA9dYbPEPfon", CurrencyUnit::Sat, true),
            keyset("xB3eZcQFQgpm", CurrencyUnit::Sat, true),
        ];

        let selected = select_active_keyset(&keysets, &CurrencyUnit::Sat).unwrap();
        assert_eq!(selected.id.to_string(), "vA9dYbPEPfon");
    }

    #[test]
    fn test_inactive_and_other_units_excluded() {
        let keysets = vec![
            keyset("009a1f293253e41e", CurrencyUnit::Sat, false),
            keyset("00759e3f8b06b36f", CurrencyUnit::Usd, true),
        ];

        assert!(matches!(
            select_active_keyset(&keysets, &CurrencyUnit::Sat),
            Err(Error::NoActiveKeysetsForUnit)
        ));
    }

    #[test]
    fn test_ties_keep_mint_order() {
        let keysets = vec![
            keyset("00759e3f8b06b36f", CurrencyUnit::Sat, true),
            keyset("009a1f293253e41e", CurrencyUnit::Sat, true),
        ];

        let selected = select_active_keyset(&keysets, &CurrencyUnit::Sat).unwrap();
        assert_eq!(selected.id.to_string(), "00759e3f8b06b36f");
    }
}
