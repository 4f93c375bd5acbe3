//! NUT-01: Mint public key exchange
//!
//! <https://github.com/cashubtc/nuts/blob/main/01.md>
//!
//! Keys are carried as validated compressed-point hex; the curve math itself
//! lives in the blinding collaborator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::Amount;

/// NUT01 Error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Invalid public key
    #[error("Invalid public key: `{0}`")]
    InvalidPublicKey(String),
}

/// A compressed secp256k1 point, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(String);

impl PublicKey {
    /// Parse from a 33-byte compressed-point hex string
    pub fn from_hex<S>(hex_key: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        let hex_key = hex_key.as_ref();

        if hex_key.len() != 66
            || !(hex_key.starts_with("02") || hex_key.starts_with("03"))
            || hex::decode(hex_key).is_err()
        {
            return Err(Error::InvalidPublicKey(hex_key.to_string()));
        }

        Ok(Self(hex_key.to_lowercase()))
    }

    /// From raw compressed point bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        Self::from_hex(hex::encode(bytes))
    }

    /// Compressed-point hex
    pub fn to_hex(&self) -> String {
        self.0.clone()
    }

    /// Compressed point bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        hex::decode(&self.0).expect("Key is validated hex")
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(DeError::custom)
    }
}

/// Mint public keys per amount [NUT-01]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keys(BTreeMap<u64, PublicKey>);

impl Keys {
    /// Create new [`Keys`]
    pub fn new(keys: BTreeMap<u64, PublicKey>) -> Self {
        Self(keys)
    }

    /// Get [`PublicKey`] for [`Amount`]
    pub fn amount_key(&self, amount: Amount) -> Option<PublicKey> {
        self.0.get(&u64::from(amount)).cloned()
    }

    /// Iterate over (amount, key) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &PublicKey)> {
        self.0.iter()
    }
}

// Wire format keys amounts as strings: {"1": "02...", "2": "03..."}
impl Serialize for Keys {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let as_strings: BTreeMap<String, &PublicKey> = self
            .0
            .iter()
            .map(|(amount, key)| (amount.to_string(), key))
            .collect();
        as_strings.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Keys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let as_strings: BTreeMap<String, PublicKey> = BTreeMap::deserialize(deserializer)?;
        as_strings
            .into_iter()
            .map(|(amount, key)| {
                amount
                    .parse::<u64>()
                    .map(|amount| (amount, key))
                    .map_err(DeError::custom)
            })
            .collect::<Result<BTreeMap<u64, PublicKey>, _>>()
            .map(Keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_validation() {
        assert!(PublicKey::from_hex(
            "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
        )
        .is_ok());
        assert!(PublicKey::from_hex(
            "03194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
        )
        .is_ok());
        // uncompressed prefix
        assert!(PublicKey::from_hex(
            "04194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
        )
        .is_err());
        // wrong length
        assert!(PublicKey::from_hex("0219").is_err());
        // not hex
        assert!(PublicKey::from_hex(
            "02zz4603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
        )
        .is_err());
    }

    #[test]
    fn test_keys_wire_format() {
        let json = r#"{"1":"02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104","2":"03194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"}"#;
        let keys: Keys = serde_json::from_str(json).unwrap();
        assert!(keys.amount_key(Amount::from(1)).is_some());
        assert!(keys.amount_key(Amount::from(4)).is_none());
        assert_eq!(serde_json::to_string(&keys).unwrap(), json);
    }
}
