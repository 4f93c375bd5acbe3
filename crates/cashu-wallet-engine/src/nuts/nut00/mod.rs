//! NUT-00: Notation and Models
//!
//! <https://github.com/cashubtc/nuts/blob/main/00.md>

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut01::PublicKey;
use super::nut02::KeysetId;
use crate::amount;
use crate::secret::Secret;
use crate::Amount;

pub mod token;

pub use token::{Token, TokenV3, TokenV4};

/// List of [Proof]
pub type Proofs = Vec<Proof>;

/// NUT00 Error
#[derive(Debug, Error)]
pub enum Error {
    /// Proofs required
    #[error("Proofs required in token")]
    ProofsRequired,
    /// Unsupported token prefix
    #[error("Unsupported token")]
    UnsupportedToken,
    /// Unsupported unit
    #[error("Unsupported unit")]
    UnsupportedUnit,
    /// Serde json error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Base64 error
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    /// Ciborium de error
    #[error(transparent)]
    CiboriumDe(#[from] ciborium::de::Error<std::io::Error>),
    /// Ciborium ser error
    #[error(transparent)]
    CiboriumSer(#[from] ciborium::ser::Error<std::io::Error>),
    /// Amount error
    #[error(transparent)]
    Amount(#[from] amount::Error),
    /// Hex error
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    /// Keyset id error
    #[error(transparent)]
    KeysetId(#[from] super::nut02::Error),
    /// PublicKey error
    #[error(transparent)]
    PublicKey(#[from] super::nut01::Error),
    /// Mint url error
    #[error(transparent)]
    MintUrl(#[from] crate::mint_url::Error),
}

/// Proof [NUT-00]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proof {
    /// Amount
    pub amount: Amount,
    /// `Keyset id`
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    /// Secret message
    pub secret: Secret,
    /// Unblinded signature
    #[serde(rename = "C")]
    pub c: PublicKey,
    /// Witness (spending condition data, passed through untouched)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub witness: Option<String>,
}

impl Proof {
    /// Create new [`Proof`]
    pub fn new(amount: Amount, keyset_id: KeysetId, secret: Secret, c: PublicKey) -> Self {
        Proof {
            amount,
            keyset_id,
            secret,
            c,
            witness: None,
        }
    }
}

/// Methods on a set of [`Proofs`]
pub trait ProofsMethods {
    /// Sum of the proof amounts
    fn total_amount(&self) -> Result<Amount, amount::Error>;
}

impl ProofsMethods for Proofs {
    fn total_amount(&self) -> Result<Amount, amount::Error> {
        Amount::try_sum(self.iter().map(|p| p.amount))
    }
}

/// Blinded Message [NUT-00]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlindedMessage {
    /// Amount
    ///
    /// Zero for blank change outputs [NUT-08]
    pub amount: Amount,
    /// Keyset ID of the mint keys the message is to be signed with
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    /// Blinded secret `B_`
    #[serde(rename = "B_")]
    pub blinded_secret: PublicKey,
}

/// Blind Signature [NUT-00]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlindSignature {
    /// Amount
    pub amount: Amount,
    /// Keyset ID of the mint keys that signed
    #[serde(rename = "id")]
    pub keyset_id: KeysetId,
    /// Blinded signature `C_`
    #[serde(rename = "C_")]
    pub c: PublicKey,
}

/// Currency unit of a keyset
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurrencyUnit {
    /// Sat
    #[default]
    Sat,
    /// Msat
    Msat,
    /// Usd
    Usd,
    /// Euro
    Eur,
    /// Custom currency unit
    Custom(String),
}

impl FromStr for CurrencyUnit {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "sat" => Ok(Self::Sat),
            "msat" => Ok(Self::Msat),
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

impl fmt::Display for CurrencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyUnit::Sat => write!(f, "sat"),
            CurrencyUnit::Msat => write!(f, "msat"),
            CurrencyUnit::Usd => write!(f, "usd"),
            CurrencyUnit::Eur => write!(f, "eur"),
            CurrencyUnit::Custom(unit) => write!(f, "{unit}"),
        }
    }
}

impl Serialize for CurrencyUnit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CurrencyUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CurrencyUnit::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Payment method
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    /// Bolt11 invoice
    #[default]
    Bolt11,
    /// Custom method
    Custom(String),
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "bolt11" => Ok(Self::Bolt11),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Bolt11 => write!(f, "bolt11"),
            PaymentMethod::Custom(method) => write!(f, "{method}"),
        }
    }
}

impl Serialize for PaymentMethod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PaymentMethod::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_serde() {
        let proof = r#"{"amount":2,"id":"009a1f293253e41e","secret":"407915bc212be61a77e3e6d2aeb4c727980bda51cd06a6afc29e2861768a7837","C":"02bc9097997d81afb2cc7346b5e4345a9346bd2a506eb7958598a72f0cf85163ea"}"#;
        let proof: Proof = serde_json::from_str(proof).unwrap();

        assert_eq!(
            proof.keyset_id,
            KeysetId::from_str("009a1f293253e41e").unwrap()
        );
        assert_eq!(proof.amount, Amount::from(2));
        assert!(proof.witness.is_none());
    }

    #[test]
    fn test_currency_unit_round_trip() {
        for unit in ["sat", "msat", "usd", "eur", "hash"] {
            let parsed = CurrencyUnit::from_str(unit).unwrap();
            assert_eq!(parsed.to_string(), unit);
        }
    }

    #[test]
    fn test_total_amount() {
        let proofs: Proofs = serde_json::from_str(
            r#"[{"amount":2,"id":"009a1f293253e41e","secret":"a","C":"02bc9097997d81afb2cc7346b5e4345a9346bd2a506eb7958598a72f0cf85163ea"},
                {"amount":8,"id":"009a1f293253e41e","secret":"b","C":"02bc9097997d81afb2cc7346b5e4345a9346bd2a506eb7958598a72f0cf85163ea"}]"#,
        )
        .unwrap();
        assert_eq!(proofs.total_amount().unwrap(), Amount::from(10));
    }
}
