//! Seed and keyset counter store
//!
//! Owns the BIP-39 mnemonic and the per-keyset derivation counters that
//! keep deterministic output derivation in sync with the mint. Rotated
//! mnemonics are archived together with their counters so old proofs stay
//! recoverable indefinitely.

use std::str::FromStr;
use std::sync::Arc;

use bip39::Mnemonic;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::WalletDatabase;
use crate::nuts::KeysetId;
use crate::Error;

/// Counter jump applied when the mint reports outputs already signed
pub const COUNTER_RESYNC_JUMP: i64 = 10;

/// A rotated-out mnemonic with its frozen counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedMnemonic {
    /// The rotated mnemonic
    pub mnemonic: String,
    /// Counter snapshot at rotation time
    #[serde(rename = "keysetCounters")]
    pub keyset_counters: Vec<ArchivedCounter>,
}

/// One archived counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedCounter {
    /// Keyset id
    pub id: KeysetId,
    /// Counter value
    pub counter: u64,
}

/// Seed and keyset counter store
#[derive(Debug, Clone)]
pub struct SeedStore {
    localstore: Arc<dyn WalletDatabase>,
}

impl SeedStore {
    /// Create new [`SeedStore`]
    pub fn new(localstore: Arc<dyn WalletDatabase>) -> Self {
        Self { localstore }
    }

    /// Get the active mnemonic, generating one on first use.
    ///
    /// Generation happens exactly once; an existing mnemonic is never
    /// overwritten.
    #[instrument(skip(self))]
    pub async fn get_or_create_mnemonic(&self) -> Result<Mnemonic, Error> {
        match self.localstore.get_mnemonic().await? {
            Some(phrase) => Ok(Mnemonic::from_str(&phrase)?),
            None => {
                let mnemonic = Mnemonic::generate(12)?;
                tracing::info!("Generated new wallet mnemonic");
                self.localstore.set_mnemonic(mnemonic.to_string()).await?;
                Ok(mnemonic)
            }
        }
    }

    /// 64-byte BIP-39 seed of the active mnemonic
    pub async fn seed(&self) -> Result<[u8; 64], Error> {
        let mnemonic = self.get_or_create_mnemonic().await?;
        Ok(mnemonic.to_seed(""))
    }

    /// Current counter for a keyset; a keyset seen for the first time is
    /// initialized to 1.
    #[instrument(skip(self))]
    pub async fn counter(&self, keyset_id: &KeysetId) -> Result<u64, Error> {
        match self.localstore.get_keyset_counter(keyset_id).await? {
            Some(counter) => Ok(counter),
            None => {
                self.localstore.set_keyset_counter(keyset_id, 1).await?;
                Ok(1)
            }
        }
    }

    /// Add `delta` to a keyset counter, clamping at zero, and return the
    /// new value. Negative deltas only occur on verified melt rollback.
    #[instrument(skip(self))]
    pub async fn bump_counter(&self, keyset_id: &KeysetId, delta: i64) -> Result<u64, Error> {
        let current = self
            .localstore
            .get_keyset_counter(keyset_id)
            .await?
            .unwrap_or(0);

        let next = if delta.is_negative() {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            current.saturating_add(delta as u64)
        };

        tracing::debug!("Keyset {} counter {} -> {}", keyset_id, current, next);
        self.localstore.set_keyset_counter(keyset_id, next).await?;
        Ok(next)
    }

    /// Archive the active mnemonic together with its counters, reset the
    /// counters and generate a fresh mnemonic.
    #[instrument(skip(self))]
    pub async fn rotate_mnemonic(&self) -> Result<Mnemonic, Error> {
        if let Some(old) = self.localstore.get_mnemonic().await? {
            let counters = self
                .localstore
                .get_keyset_counters()
                .await?
                .into_iter()
                .map(|(id, counter)| ArchivedCounter { id, counter })
                .collect();

            self.localstore
                .add_archived_mnemonic(ArchivedMnemonic {
                    mnemonic: old,
                    keyset_counters: counters,
                })
                .await?;
        }

        self.localstore.clear_keyset_counters().await?;

        let mnemonic = Mnemonic::generate(12)?;
        self.localstore.set_mnemonic(mnemonic.to_string()).await?;
        tracing::info!("Rotated wallet mnemonic");

        Ok(mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::WalletMemoryDatabase;

    fn store() -> SeedStore {
        SeedStore::new(Arc::new(WalletMemoryDatabase::new()))
    }

    #[tokio::test]
    async fn test_mnemonic_generated_once() {
        let store = store();
        let first = store.get_or_create_mnemonic().await.unwrap();
        let second = store.get_or_create_mnemonic().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.word_count(), 12);
    }

    #[tokio::test]
    async fn test_seed_is_deterministic() {
        let store = store();
        let a = store.seed().await.unwrap();
        let b = store.seed().await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_counter_initializes_to_one() {
        let store = store();
        let keyset_id = KeysetId::from_str("009a1f293253e41e").unwrap();
        assert_eq!(store.counter(&keyset_id).await.unwrap(), 1);
        assert_eq!(store.counter(&keyset_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bump_counter_clamps_at_zero() {
        let store = store();
        let keyset_id = KeysetId::from_str("009a1f293253e41e").unwrap();

        assert_eq!(store.bump_counter(&keyset_id, 5).await.unwrap(), 5);
        assert_eq!(store.bump_counter(&keyset_id, -3).await.unwrap(), 2);
        assert_eq!(store.bump_counter(&keyset_id, -10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rotation_archives_counters() {
        let store = store();
        let keyset_id = KeysetId::from_str("009a1f293253e41e").unwrap();

        let old = store.get_or_create_mnemonic().await.unwrap();
        store.bump_counter(&keyset_id, 42).await.unwrap();

        let new = store.rotate_mnemonic().await.unwrap();
        assert_ne!(old, new);

        // counters reset for the new mnemonic
        assert_eq!(store.counter(&keyset_id).await.unwrap(), 1);

        // old counters remain recoverable
        let archived = store
            .localstore
            .get_archived_mnemonics()
            .await
            .unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].mnemonic, old.to_string());
        assert_eq!(archived[0].keyset_counters[0].counter, 42);
    }
}
