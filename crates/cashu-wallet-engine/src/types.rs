//! Types

use serde::{Deserialize, Serialize};

use crate::mint_url::MintUrl;
use crate::nuts::{
    CurrencyUnit, MeltQuoteState, MintQuoteState, Proof, Proofs, PublicKey,
};
use crate::Amount;

/// Reservation state of a stored proof
///
/// A reserved proof is excluded from spendable selection; the reservation
/// optionally remembers the melt quote that caused it so rollback is a
/// single assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Reservation {
    /// Available for selection
    #[default]
    Unreserved,
    /// Held for an in-flight operation
    Reserved {
        /// Melt quote the reservation is bound to, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        quote_id: Option<String>,
    },
}

impl Reservation {
    /// Whether the proof is reserved
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved { .. })
    }
}

/// A proof together with the bookkeeping the wallet keeps for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInfo {
    /// Proof
    pub proof: Proof,
    /// `y = hashToCurve(secret)`, the proof's identity with the mint
    pub y: PublicKey,
    /// Mint url the proof is valid at
    pub mint_url: MintUrl,
    /// Unit of the proof's keyset
    pub unit: CurrencyUnit,
    /// Reservation state
    #[serde(default)]
    pub reservation: Reservation,
}

impl ProofInfo {
    /// Create new [`ProofInfo`]
    pub fn new(proof: Proof, y: PublicKey, mint_url: MintUrl, unit: CurrencyUnit) -> Self {
        Self {
            proof,
            y,
            mint_url,
            unit,
            reservation: Reservation::Unreserved,
        }
    }

    /// Same info with a reservation applied
    pub fn reserved(mut self, quote_id: Option<String>) -> Self {
        self.reservation = Reservation::Reserved { quote_id };
        self
    }
}

/// Mint quote as tracked by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    /// Quote id
    pub id: String,
    /// Mint url
    pub mint_url: MintUrl,
    /// Amount of quote
    pub amount: Amount,
    /// Unit of quote
    pub unit: CurrencyUnit,
    /// Quote payment request (bolt11)
    pub request: String,
    /// Quote state
    pub state: MintQuoteState,
    /// Unix timestamp until the quote is valid
    pub expiry: Option<u64>,
}

/// Melt quote as tracked by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuote {
    /// Quote id
    pub id: String,
    /// Quote unit
    pub unit: CurrencyUnit,
    /// Quote amount
    pub amount: Amount,
    /// Bolt11 being paid
    pub request: String,
    /// Quote fee reserve
    pub fee_reserve: Amount,
    /// Quote state
    pub state: MeltQuoteState,
    /// Unix timestamp until the quote is valid
    pub expiry: Option<u64>,
}

impl MeltQuote {
    /// Total amount a melt of this quote may consume
    pub fn amount_with_fee_reserve(&self) -> Amount {
        self.amount + self.fee_reserve
    }
}

/// Result of a completed melt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melted {
    /// State of the quote after payment
    pub state: MeltQuoteState,
    /// Payment preimage
    pub preimage: Option<String>,
    /// Amount paid, inputs minus returned change
    pub amount_paid: Amount,
    /// Change proofs returned by the mint
    pub change: Proofs,
}

/// Seconds since the unix epoch
pub fn unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
