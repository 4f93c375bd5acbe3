//! Blinding collaborator
//!
//! The BDHKE primitives (blinding, unblinding, hash-to-curve, NUT-13
//! deterministic secret derivation) live outside the engine behind
//! [`BlindingCrypto`]. The engine decides *when* outputs are derived and at
//! which counter; the collaborator decides *how*.

use std::fmt::Debug;

use crate::nuts::{BlindSignature, BlindedMessage, Keys, KeysetId, Proofs, PublicKey};
use crate::secret::Secret;
use crate::{Amount, Error};

/// A single pre-minted output: the blinded message sent to the mint together
/// with the secret and blinding factor needed to unblind its signature.
#[derive(Debug, Clone)]
pub struct PreMint {
    /// Amount of the output; zero for blank change outputs
    pub amount: Amount,
    /// Secret the proof will carry
    pub secret: Secret,
    /// Blinding factor, opaque to the engine
    pub r: Secret,
    /// Blinded message for the mint
    pub blinded_message: BlindedMessage,
}

/// Outputs derived from the seed at a counter range
#[derive(Debug, Clone)]
pub struct PreMintSecrets {
    /// Keyset the outputs belong to
    pub keyset_id: KeysetId,
    /// First derivation index used
    pub counter: u64,
    /// Outputs in derivation order
    pub secrets: Vec<PreMint>,
}

impl PreMintSecrets {
    /// Blinded messages in derivation order
    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.secrets.iter().map(|p| p.blinded_message.clone()).collect()
    }

    /// Number of outputs
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether there are no outputs
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

/// Contract of the cryptographic library the engine is built on
pub trait BlindingCrypto: Debug + Send + Sync {
    /// Derive deterministic premint outputs for `amounts`, starting at
    /// derivation index `counter` for `keyset_id` [NUT-13]
    fn premint_secrets(
        &self,
        keyset_id: &KeysetId,
        seed: &[u8; 64],
        counter: u64,
        amounts: &[Amount],
    ) -> Result<PreMintSecrets, Error>;

    /// Unblind mint signatures into proofs
    ///
    /// Signatures must be in the same order as the premint outputs; blank
    /// outputs take their amount from the signature.
    fn construct_proofs(
        &self,
        signatures: Vec<BlindSignature>,
        premint: &PreMintSecrets,
        keys: &Keys,
    ) -> Result<Proofs, Error>;

    /// `Y = hashToCurve(secret)`, the proof fingerprint used by NUT-07
    fn hash_to_curve(&self, secret: &Secret) -> Result<PublicKey, Error>;
}
