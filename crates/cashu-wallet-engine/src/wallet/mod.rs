//! Cashu wallet engine
//!
//! The [`Wallet`] executes the quote and proof protocols against mints. It
//! owns no cryptography and no storage of its own: the blinding library,
//! the database and the background worker queue are collaborators handed in
//! at construction.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::instrument;

use crate::blinding::BlindingCrypto;
use crate::database::WalletDatabase;
use crate::fees::calculate_fee;
use crate::nuts::{Proof, Proofs, PublicKey};
use crate::seed::SeedStore;
use crate::types::ProofInfo;
use crate::{Amount, Error};

pub mod client;
mod keysets;
pub mod melt;
mod issue;
mod proofs;
mod receive;
mod reconcile;
pub mod registry;
pub mod request;
pub mod session;
pub mod subscription;
mod send;
#[cfg(test)]
pub(crate) mod test_utils;

use client::MintConnector;
use registry::MintRegistry;
use session::PayInvoiceSession;

pub use request::DecodedRequest;

/// Background worker queue collaborator
///
/// The engine only enqueues; scheduling and retry policy live with the
/// host.
pub trait WorkerQueue: Debug + Send + Sync {
    /// Poll an incoming mint quote until it is paid and minted
    fn enqueue_invoice_check(&self, quote_id: &str);
    /// Poll a sent token until its proofs are seen spent
    fn enqueue_token_check(&self, token: &str);
}

/// Worker queue that drops every request, for hosts without background
/// scheduling
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWorkerQueue;

impl WorkerQueue for NullWorkerQueue {
    fn enqueue_invoice_check(&self, _quote_id: &str) {}
    fn enqueue_token_check(&self, _token: &str) {}
}

/// Cashu wallet engine
#[derive(Debug)]
pub struct Wallet {
    /// Storage backend
    pub localstore: Arc<dyn WalletDatabase>,
    /// Mint client
    pub client: Arc<dyn MintConnector>,
    /// Known mints and active selection
    pub registry: MintRegistry,
    /// Mnemonic and keyset counters
    pub seed_store: SeedStore,
    pub(crate) crypto: Arc<dyn BlindingCrypto>,
    pub(crate) workers: Arc<dyn WorkerQueue>,
    pub(crate) session: Arc<StdMutex<PayInvoiceSession>>,
    // critical section around operations that move proofs and counters
    pub(crate) op_lock: Mutex<()>,
    unloading: AtomicBool,
}

impl Wallet {
    /// Create new [`Wallet`]
    pub fn new(
        localstore: Arc<dyn WalletDatabase>,
        client: Arc<dyn MintConnector>,
        crypto: Arc<dyn BlindingCrypto>,
        workers: Arc<dyn WorkerQueue>,
    ) -> Self {
        Self {
            registry: MintRegistry::new(localstore.clone(), client.clone()),
            seed_store: SeedStore::new(localstore.clone()),
            localstore,
            client,
            crypto,
            workers,
            session: Arc::new(StdMutex::new(PayInvoiceSession::default())),
            op_lock: Mutex::new(()),
            unloading: AtomicBool::new(false),
        }
    }

    /// Signal that the host is about to exit.
    ///
    /// While set, melt failure handling will not roll back state: the
    /// payment may still settle after the process is gone.
    pub fn set_unloading(&self) {
        self.unloading.store(true, Ordering::SeqCst);
    }

    /// Whether the host is about to exit
    pub fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::SeqCst)
    }

    /// Read or mutate the pay-invoice session
    pub fn with_session<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut PayInvoiceSession) -> R,
    {
        let mut session = self.session.lock().expect("session lock");
        f(&mut session)
    }

    /// Handle to the pay-invoice session, for latching from the outside
    pub fn session_handle(&self) -> Arc<StdMutex<PayInvoiceSession>> {
        self.session.clone()
    }

    /// Spendable balance of the active mint
    #[instrument(skip(self))]
    pub async fn total_balance(&self) -> Result<Amount, Error> {
        self.registry.active_mint_balance().await
    }

    /// Fee required to spend a set of proofs
    #[instrument(skip_all)]
    pub async fn get_proofs_fee(&self, proofs: &Proofs) -> Result<Amount, Error> {
        let mut proofs_per_keyset = HashMap::new();
        let mut fee_per_keyset = HashMap::new();

        for proof in proofs {
            if !fee_per_keyset.contains_key(&proof.keyset_id) {
                let keyset_info = self
                    .localstore
                    .get_keyset_by_id(&proof.keyset_id)
                    .await?
                    .ok_or(Error::UnknownKeySet)?;
                fee_per_keyset.insert(proof.keyset_id.clone(), keyset_info.input_fee_ppk);
            }

            proofs_per_keyset
                .entry(proof.keyset_id.clone())
                .and_modify(|count| *count += 1)
                .or_insert(1);
        }

        calculate_fee(&proofs_per_keyset, &fee_per_keyset)
    }

    /// `y` fingerprints of proofs, in order
    pub(crate) fn ys(&self, proofs: &Proofs) -> Result<Vec<PublicKey>, Error> {
        proofs
            .iter()
            .map(|p| self.crypto.hash_to_curve(&p.secret))
            .collect()
    }

    /// Wrap proofs in store bookkeeping for the active mint
    pub(crate) async fn proof_infos(&self, proofs: &Proofs) -> Result<Vec<ProofInfo>, Error> {
        let mint_url = self.registry.active_mint_url().await?;
        let unit = self.registry.active_unit().await;

        proofs
            .iter()
            .map(|proof| {
                let y = self.crypto.hash_to_curve(&proof.secret)?;
                Ok(ProofInfo::new(
                    proof.clone(),
                    y,
                    mint_url.clone(),
                    unit.clone(),
                ))
            })
            .collect()
    }

    /// `y` of a single proof
    pub(crate) fn proof_y(&self, proof: &Proof) -> Result<PublicKey, Error> {
        self.crypto.hash_to_curve(&proof.secret)
    }
}
