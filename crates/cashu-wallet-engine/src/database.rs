//! Storage backend contract
//!
//! The engine only ever sees [`WalletDatabase`]; the backing store is a
//! collaborator. [`WalletMemoryDatabase`] is the in-memory implementation
//! used in tests and by hosts that persist through snapshots.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tokio::sync::RwLock;

use crate::invoice::{InvoiceHistory, InvoiceStatus, TokenHistory};
use crate::mint_url::MintUrl;
use crate::nuts::{CurrencyUnit, KeySetInfo, Keys, KeysetId, MintInfo, PublicKey};
use crate::seed::ArchivedMnemonic;
use crate::types::{ProofInfo, Reservation};

/// Database Error
#[derive(Debug, ThisError)]
pub enum Error {
    /// Serde error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Backend error
    #[error("`{0}`")]
    Internal(String),
}

/// Wallet storage backend
#[async_trait]
pub trait WalletDatabase: Debug + Send + Sync {
    /// Get the active mnemonic
    async fn get_mnemonic(&self) -> Result<Option<String>, Error>;
    /// Set the active mnemonic
    async fn set_mnemonic(&self, mnemonic: String) -> Result<(), Error>;
    /// Archive a rotated mnemonic with its counter snapshot
    async fn add_archived_mnemonic(&self, archived: ArchivedMnemonic) -> Result<(), Error>;
    /// All archived mnemonics
    async fn get_archived_mnemonics(&self) -> Result<Vec<ArchivedMnemonic>, Error>;

    /// Get counter for keyset
    async fn get_keyset_counter(&self, keyset_id: &KeysetId) -> Result<Option<u64>, Error>;
    /// Set counter for keyset
    async fn set_keyset_counter(&self, keyset_id: &KeysetId, counter: u64) -> Result<(), Error>;
    /// All keyset counters
    async fn get_keyset_counters(&self) -> Result<HashMap<KeysetId, u64>, Error>;
    /// Drop all keyset counters (mnemonic rotation)
    async fn clear_keyset_counters(&self) -> Result<(), Error>;

    /// Add mint with optional info
    async fn add_mint(&self, mint_url: MintUrl, mint_info: Option<MintInfo>)
        -> Result<(), Error>;
    /// Get mint info
    async fn get_mint(&self, mint_url: &MintUrl) -> Result<Option<MintInfo>, Error>;
    /// All known mints
    async fn get_mints(&self) -> Result<Vec<MintUrl>, Error>;
    /// Store keysets for a mint, preserving the mint's order
    async fn add_mint_keysets(
        &self,
        mint_url: MintUrl,
        keysets: Vec<KeySetInfo>,
    ) -> Result<(), Error>;
    /// Keysets of a mint in mint order
    async fn get_mint_keysets(&self, mint_url: &MintUrl)
        -> Result<Option<Vec<KeySetInfo>>, Error>;
    /// Look up a keyset anywhere
    async fn get_keyset_by_id(&self, keyset_id: &KeysetId) -> Result<Option<KeySetInfo>, Error>;
    /// Store keys of a keyset
    async fn add_keys(&self, keyset_id: KeysetId, keys: Keys) -> Result<(), Error>;
    /// Keys of a keyset
    async fn get_keys(&self, keyset_id: &KeysetId) -> Result<Option<Keys>, Error>;

    /// Add `added` and remove proofs with `removed_ys`, atomically
    ///
    /// Proofs are keyed by their `y`; re-adding an existing proof is an
    /// idempotent refresh.
    async fn update_proofs(
        &self,
        added: Vec<ProofInfo>,
        removed_ys: Vec<PublicKey>,
    ) -> Result<(), Error>;
    /// Proofs, optionally filtered by mint and unit
    async fn get_proofs(
        &self,
        mint_url: Option<MintUrl>,
        unit: Option<CurrencyUnit>,
    ) -> Result<Vec<ProofInfo>, Error>;
    /// Set the reservation state of proofs
    async fn set_reservation(
        &self,
        ys: Vec<PublicKey>,
        reservation: Reservation,
    ) -> Result<(), Error>;

    /// Append an invoice history entry
    async fn add_invoice(&self, invoice: InvoiceHistory) -> Result<(), Error>;
    /// Invoice entry by quote id
    async fn get_invoice(&self, quote_id: &str) -> Result<Option<InvoiceHistory>, Error>;
    /// All invoice entries in insertion order
    async fn get_invoices(&self) -> Result<Vec<InvoiceHistory>, Error>;
    /// Update status and optionally finalize the amount of an entry
    async fn update_invoice(
        &self,
        quote_id: &str,
        status: InvoiceStatus,
        amount: Option<i64>,
    ) -> Result<(), Error>;
    /// Remove an invoice entry
    async fn remove_invoice(&self, quote_id: &str) -> Result<(), Error>;

    /// Append a token history entry
    async fn add_token_history(&self, entry: TokenHistory) -> Result<(), Error>;
    /// All token history entries in insertion order
    async fn get_token_history(&self) -> Result<Vec<TokenHistory>, Error>;
    /// Remove a token history entry by its token string
    async fn remove_token_history(&self, token: &str) -> Result<(), Error>;
    /// Update the status of a token history entry
    async fn update_token_history_status(
        &self,
        token: &str,
        status: InvoiceStatus,
    ) -> Result<(), Error>;
}

/// Key-value snapshot of the durable wallet state
///
/// The keys match the layout hosts persist under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletSnapshot {
    /// `cashu.mnemonic`
    #[serde(
        rename = "cashu.mnemonic",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mnemonic: Option<String>,
    /// `cashu.invoiceHistory`
    #[serde(rename = "cashu.invoiceHistory", default)]
    pub invoice_history: Vec<InvoiceHistory>,
    /// `cashu.keysetCounters`
    #[serde(rename = "cashu.keysetCounters", default)]
    pub keyset_counters: Vec<KeysetCounterEntry>,
    /// `cashu.oldMnemonicCounters`
    #[serde(rename = "cashu.oldMnemonicCounters", default)]
    pub old_mnemonic_counters: Vec<ArchivedMnemonic>,
}

/// One `cashu.keysetCounters` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysetCounterEntry {
    /// Keyset id
    pub id: KeysetId,
    /// Counter value
    pub counter: u64,
}

/// Wallet in-memory database
#[derive(Debug, Clone, Default)]
pub struct WalletMemoryDatabase {
    mnemonic: Arc<RwLock<Option<String>>>,
    archived_mnemonics: Arc<RwLock<Vec<ArchivedMnemonic>>>,
    keyset_counters: Arc<RwLock<HashMap<KeysetId, u64>>>,
    mints: Arc<RwLock<HashMap<MintUrl, Option<MintInfo>>>>,
    mint_keysets: Arc<RwLock<HashMap<MintUrl, Vec<KeySetInfo>>>>,
    keys: Arc<RwLock<HashMap<KeysetId, Keys>>>,
    proofs: Arc<RwLock<HashMap<PublicKey, ProofInfo>>>,
    invoices: Arc<RwLock<Vec<InvoiceHistory>>>,
    token_history: Arc<RwLock<Vec<TokenHistory>>>,
}

impl WalletMemoryDatabase {
    /// Create new [`WalletMemoryDatabase`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the durable state from a snapshot
    pub async fn from_snapshot(snapshot: WalletSnapshot) -> Self {
        let db = Self::default();
        *db.mnemonic.write().await = snapshot.mnemonic;
        *db.invoices.write().await = snapshot.invoice_history;
        *db.keyset_counters.write().await = snapshot
            .keyset_counters
            .into_iter()
            .map(|e| (e.id, e.counter))
            .collect();
        *db.archived_mnemonics.write().await = snapshot.old_mnemonic_counters;
        db
    }

    /// Export the durable state
    pub async fn to_snapshot(&self) -> WalletSnapshot {
        WalletSnapshot {
            mnemonic: self.mnemonic.read().await.clone(),
            invoice_history: self.invoices.read().await.clone(),
            keyset_counters: self
                .keyset_counters
                .read()
                .await
                .iter()
                .map(|(id, counter)| KeysetCounterEntry {
                    id: id.clone(),
                    counter: *counter,
                })
                .collect(),
            old_mnemonic_counters: self.archived_mnemonics.read().await.clone(),
        }
    }
}

#[async_trait]
impl WalletDatabase for WalletMemoryDatabase {
    async fn get_mnemonic(&self) -> Result<Option<String>, Error> {
        Ok(self.mnemonic.read().await.clone())
    }

    async fn set_mnemonic(&self, mnemonic: String) -> Result<(), Error> {
        *self.mnemonic.write().await = Some(mnemonic);
        Ok(())
    }

    async fn add_archived_mnemonic(&self, archived: ArchivedMnemonic) -> Result<(), Error> {
        self.archived_mnemonics.write().await.push(archived);
        Ok(())
    }

    async fn get_archived_mnemonics(&self) -> Result<Vec<ArchivedMnemonic>, Error> {
        Ok(self.archived_mnemonics.read().await.clone())
    }

    async fn get_keyset_counter(&self, keyset_id: &KeysetId) -> Result<Option<u64>, Error> {
        Ok(self.keyset_counters.read().await.get(keyset_id).copied())
    }

    async fn set_keyset_counter(&self, keyset_id: &KeysetId, counter: u64) -> Result<(), Error> {
        self.keyset_counters
            .write()
            .await
            .insert(keyset_id.clone(), counter);
        Ok(())
    }

    async fn get_keyset_counters(&self) -> Result<HashMap<KeysetId, u64>, Error> {
        Ok(self.keyset_counters.read().await.clone())
    }

    async fn clear_keyset_counters(&self) -> Result<(), Error> {
        self.keyset_counters.write().await.clear();
        Ok(())
    }

    async fn add_mint(
        &self,
        mint_url: MintUrl,
        mint_info: Option<MintInfo>,
    ) -> Result<(), Error> {
        self.mints.write().await.insert(mint_url, mint_info);
        Ok(())
    }

    async fn get_mint(&self, mint_url: &MintUrl) -> Result<Option<MintInfo>, Error> {
        Ok(self.mints.read().await.get(mint_url).cloned().flatten())
    }

    async fn get_mints(&self) -> Result<Vec<MintUrl>, Error> {
        Ok(self.mints.read().await.keys().cloned().collect())
    }

    async fn add_mint_keysets(
        &self,
        mint_url: MintUrl,
        keysets: Vec<KeySetInfo>,
    ) -> Result<(), Error> {
        self.mint_keysets.write().await.insert(mint_url, keysets);
        Ok(())
    }

    async fn get_mint_keysets(
        &self,
        mint_url: &MintUrl,
    ) -> Result<Option<Vec<KeySetInfo>>, Error> {
        Ok(self.mint_keysets.read().await.get(mint_url).cloned())
    }

    async fn get_keyset_by_id(&self, keyset_id: &KeysetId) -> Result<Option<KeySetInfo>, Error> {
        Ok(self
            .mint_keysets
            .read()
            .await
            .values()
            .flatten()
            .find(|k| &k.id == keyset_id)
            .cloned())
    }

    async fn add_keys(&self, keyset_id: KeysetId, keys: Keys) -> Result<(), Error> {
        self.keys.write().await.insert(keyset_id, keys);
        Ok(())
    }

    async fn get_keys(&self, keyset_id: &KeysetId) -> Result<Option<Keys>, Error> {
        Ok(self.keys.read().await.get(keyset_id).cloned())
    }

    async fn update_proofs(
        &self,
        added: Vec<ProofInfo>,
        removed_ys: Vec<PublicKey>,
    ) -> Result<(), Error> {
        let mut proofs = self.proofs.write().await;
        for y in removed_ys {
            proofs.remove(&y);
        }
        for info in added {
            proofs.insert(info.y.clone(), info);
        }
        Ok(())
    }

    async fn get_proofs(
        &self,
        mint_url: Option<MintUrl>,
        unit: Option<CurrencyUnit>,
    ) -> Result<Vec<ProofInfo>, Error> {
        Ok(self
            .proofs
            .read()
            .await
            .values()
            .filter(|info| {
                mint_url.as_ref().map(|m| &info.mint_url == m).unwrap_or(true)
                    && unit.as_ref().map(|u| &info.unit == u).unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn set_reservation(
        &self,
        ys: Vec<PublicKey>,
        reservation: Reservation,
    ) -> Result<(), Error> {
        let mut proofs = self.proofs.write().await;
        for y in ys {
            if let Some(info) = proofs.get_mut(&y) {
                info.reservation = reservation.clone();
            }
        }
        Ok(())
    }

    async fn add_invoice(&self, invoice: InvoiceHistory) -> Result<(), Error> {
        self.invoices.write().await.push(invoice);
        Ok(())
    }

    async fn get_invoice(&self, quote_id: &str) -> Result<Option<InvoiceHistory>, Error> {
        Ok(self
            .invoices
            .read()
            .await
            .iter()
            .find(|i| i.quote_id == quote_id)
            .cloned())
    }

    async fn get_invoices(&self) -> Result<Vec<InvoiceHistory>, Error> {
        Ok(self.invoices.read().await.clone())
    }

    async fn update_invoice(
        &self,
        quote_id: &str,
        status: InvoiceStatus,
        amount: Option<i64>,
    ) -> Result<(), Error> {
        let mut invoices = self.invoices.write().await;
        if let Some(invoice) = invoices.iter_mut().find(|i| i.quote_id == quote_id) {
            invoice.status = status;
            if let Some(amount) = amount {
                invoice.amount = amount;
            }
        }
        Ok(())
    }

    async fn remove_invoice(&self, quote_id: &str) -> Result<(), Error> {
        self.invoices.write().await.retain(|i| i.quote_id != quote_id);
        Ok(())
    }

    async fn add_token_history(&self, entry: TokenHistory) -> Result<(), Error> {
        self.token_history.write().await.push(entry);
        Ok(())
    }

    async fn get_token_history(&self) -> Result<Vec<TokenHistory>, Error> {
        Ok(self.token_history.read().await.clone())
    }

    async fn remove_token_history(&self, token: &str) -> Result<(), Error> {
        self.token_history.write().await.retain(|t| t.token != token);
        Ok(())
    }

    async fn update_token_history_status(
        &self,
        token: &str,
        status: InvoiceStatus,
    ) -> Result<(), Error> {
        let mut history = self.token_history.write().await;
        if let Some(entry) = history.iter_mut().find(|t| t.token == token) {
            entry.status = status;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let db = WalletMemoryDatabase::new();
        db.set_mnemonic("abandon ability able".to_string())
            .await
            .unwrap();
        let keyset_id = KeysetId::from_str("009a1f293253e41e").unwrap();
        db.set_keyset_counter(&keyset_id, 7).await.unwrap();

        let snapshot = db.to_snapshot().await;
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("cashu.mnemonic").is_some());
        assert!(json.get("cashu.keysetCounters").is_some());

        let restored = WalletMemoryDatabase::from_snapshot(snapshot).await;
        assert_eq!(
            restored.get_mnemonic().await.unwrap().unwrap(),
            "abandon ability able"
        );
        assert_eq!(
            restored.get_keyset_counter(&keyset_id).await.unwrap(),
            Some(7)
        );
    }

    #[tokio::test]
    async fn test_update_proofs_is_upsert() {
        use crate::nuts::{Proof, PublicKey};
        use crate::secret::Secret;
        use crate::Amount;

        let db = WalletMemoryDatabase::new();
        let y = PublicKey::from_hex(
            "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104",
        )
        .unwrap();
        let proof = Proof::new(
            Amount::from(2),
            KeysetId::from_str("009a1f293253e41e").unwrap(),
            Secret::new("a"),
            y.clone(),
        );
        let info = ProofInfo::new(
            proof,
            y.clone(),
            MintUrl::from_str("https://mint.example.com").unwrap(),
            CurrencyUnit::Sat,
        );

        // remove-then-add of the same set acts as a refresh
        db.update_proofs(vec![info.clone()], vec![]).await.unwrap();
        db.update_proofs(vec![info.clone()], vec![]).await.unwrap();
        assert_eq!(db.get_proofs(None, None).await.unwrap().len(), 1);

        db.update_proofs(vec![], vec![y]).await.unwrap();
        assert!(db.get_proofs(None, None).await.unwrap().is_empty());
    }
}
