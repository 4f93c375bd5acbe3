//! NUT-02: Keysets and keyset ID
//!
//! <https://github.com/cashubtc/nuts/blob/main/02.md>

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut00::CurrencyUnit;
use super::nut01::Keys;

/// NUT02 Error
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Keyset id empty
    #[error("Keyset id cannot be empty")]
    Empty,
    /// Hex Error
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

impl Eq for Error {}

/// Keyset id version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeysetVersion {
    /// Version 00, hex encoded, `"00"` prefixed
    Version00,
    /// Pre-versioning base64 id
    LegacyBase64,
}

/// A keyset id
///
/// Current ids are a `"00"` version byte followed by 14 hex characters.
/// Mints that have been around longer may still hold proofs under base64
/// ids, which the engine must keep spendable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeysetId(String);

impl KeysetId {
    const HEX_STRLEN: usize = 16;

    /// [`KeysetVersion`] of this id
    pub fn version(&self) -> KeysetVersion {
        if self.0.len() == Self::HEX_STRLEN
            && self.0.starts_with("00")
            && self.0.chars().all(|c| c.is_ascii_hexdigit())
        {
            KeysetVersion::Version00
        } else {
            KeysetVersion::LegacyBase64
        }
    }

    /// Whether this is a current hex id
    pub fn is_hex(&self) -> bool {
        self.version() == KeysetVersion::Version00
    }

    /// Raw id bytes; only defined for hex ids (used by the V4 token codec)
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(hex::decode(&self.0)?)
    }

    /// Id from raw bytes (V4 token codec)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }
}

impl FromStr for KeysetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::Empty);
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for KeysetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for KeysetId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for KeysetId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        KeysetId::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Mint keysets [NUT-02]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetResponse {
    /// Keysets the mint generates
    pub keysets: Vec<KeySetInfo>,
}

/// Keyset with its keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Keyset [`KeysetId`]
    pub id: KeysetId,
    /// Keyset [`CurrencyUnit`]
    pub unit: CurrencyUnit,
    /// Keyset [`Keys`]
    pub keys: Keys,
}

/// Keys response from `/v1/keys/{keyset_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysResponse {
    /// Keysets
    pub keysets: Vec<KeySet>,
}

/// KeySetInfo
#[derive(Debug, Clone, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeySetInfo {
    /// Keyset [`KeysetId`]
    pub id: KeysetId,
    /// Keyset [`CurrencyUnit`]
    pub unit: CurrencyUnit,
    /// Mint will only sign from an active keyset
    pub active: bool,
    /// Input fee, per thousand proofs spent
    #[serde(default)]
    pub input_fee_ppk: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyset_id_versions() {
        let hex_id = KeysetId::from_str("009a1f293253e41e").unwrap();
        assert_eq!(hex_id.version(), KeysetVersion::Version00);
        assert!(hex_id.is_hex());

        let legacy = KeysetId::from_str("vA9dYbPEPfon").unwrap();
        assert_eq!(legacy.version(), KeysetVersion::LegacyBase64);
        assert!(!legacy.is_hex());

        // hex length but no version prefix stays legacy
        let unversioned = KeysetId::from_str("9a1f293253e41e00").unwrap();
        assert!(!unversioned.is_hex());

        assert!(KeysetId::from_str("").is_err());
    }

    #[test]
    fn test_keyset_info_default_fee() {
        let info: KeySetInfo = serde_json::from_str(
            r#"{"id":"009a1f293253e41e","unit":"sat","active":true}"#,
        )
        .unwrap();
        assert_eq!(info.input_fee_ppk, 0);
    }
}
