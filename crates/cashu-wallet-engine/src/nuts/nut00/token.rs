//! Cashu Token
//!
//! <https://github.com/cashubtc/nuts/blob/main/00.md>

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use serde::{Deserialize, Serialize};

use super::{CurrencyUnit, Error, Proof, Proofs, ProofsMethods};
use crate::mint_url::MintUrl;
use crate::nuts::nut01::PublicKey;
use crate::nuts::nut02::KeysetId;
use crate::secret::Secret;
use crate::Amount;

fn base64_decode(s: &str) -> Result<Vec<u8>, Error> {
    // Tokens in the wild carry both padded and unpadded base64
    let decode_config = GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent);
    Ok(GeneralPurpose::new(&alphabet::URL_SAFE, decode_config).decode(s)?)
}

fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(data)
}

/// Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `cashuA` base64 json token
    TokenV3(TokenV3),
    /// `cashuB` CBOR token
    TokenV4(TokenV4),
}

impl Token {
    /// Create a V3 token for a set of proofs at one mint
    pub fn new(
        mint_url: MintUrl,
        proofs: Proofs,
        memo: Option<String>,
        unit: Option<CurrencyUnit>,
    ) -> Self {
        Self::TokenV3(TokenV3 {
            token: vec![TokenV3Token { mint: mint_url, proofs }],
            memo,
            unit,
        })
    }

    /// The token's mint url
    pub fn mint_url(&self) -> Result<MintUrl, Error> {
        match self {
            Self::TokenV3(token) => token
                .token
                .first()
                .map(|t| t.mint.clone())
                .ok_or(Error::ProofsRequired),
            Self::TokenV4(token) => Ok(token.mint_url.clone()),
        }
    }

    /// All proofs in the token
    pub fn proofs(&self) -> Proofs {
        match self {
            Self::TokenV3(token) => token
                .token
                .iter()
                .flat_map(|t| t.proofs.clone())
                .collect(),
            Self::TokenV4(token) => token
                .token
                .iter()
                .flat_map(|t| {
                    t.proofs.iter().map(|p| p.clone().into_proof(&t.keyset_id))
                })
                .collect(),
        }
    }

    /// Total token value
    pub fn value(&self) -> Result<Amount, Error> {
        Ok(self.proofs().total_amount()?)
    }

    /// Token unit
    pub fn unit(&self) -> Option<CurrencyUnit> {
        match self {
            Self::TokenV3(token) => token.unit.clone(),
            Self::TokenV4(token) => Some(token.unit.clone()),
        }
    }

    /// Token memo
    pub fn memo(&self) -> Option<String> {
        match self {
            Self::TokenV3(token) => token.memo.clone(),
            Self::TokenV4(token) => token.memo.clone(),
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(s) = s.strip_prefix("cashuA") {
            let decoded = base64_decode(s)?;
            let token: TokenV3 = serde_json::from_slice(&decoded)?;
            Ok(Self::TokenV3(token))
        } else if let Some(s) = s.strip_prefix("cashuB") {
            let decoded = base64_decode(s)?;
            let token: TokenV4 = ciborium::from_reader(&decoded[..])?;
            Ok(Self::TokenV4(token))
        } else {
            Err(Error::UnsupportedToken)
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenV3(token) => {
                let json = serde_json::to_string(token).map_err(|_| fmt::Error)?;
                write!(f, "cashuA{}", base64_encode(json.as_bytes()))
            }
            Self::TokenV4(token) => {
                let mut data = Vec::new();
                ciborium::into_writer(token, &mut data).map_err(|_| fmt::Error)?;
                write!(f, "cashuB{}", base64_encode(&data))
            }
        }
    }
}

/// Token V3 mint entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV3Token {
    /// Url of mint
    pub mint: MintUrl,
    /// [`Proofs`]
    pub proofs: Proofs,
}

/// Token V3 (`cashuA`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV3 {
    /// Proofs grouped by mint
    pub token: Vec<TokenV3Token>,
    /// Memo for token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Token unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<CurrencyUnit>,
}

/// Token V4 (`cashuB`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV4 {
    /// Mint Url
    #[serde(rename = "m")]
    pub mint_url: MintUrl,
    /// Token unit
    #[serde(rename = "u")]
    pub unit: CurrencyUnit,
    /// Memo for token
    #[serde(rename = "d", skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Proofs grouped by keyset_id
    #[serde(rename = "t")]
    pub token: Vec<TokenV4Token>,
}

/// Token V4 keyset entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenV4Token {
    /// `Keyset id`
    #[serde(
        rename = "i",
        serialize_with = "serialize_keyset_id",
        deserialize_with = "deserialize_keyset_id"
    )]
    pub keyset_id: KeysetId,
    /// Proofs
    #[serde(rename = "p")]
    pub proofs: Vec<ProofV4>,
}

/// Proof V4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofV4 {
    /// Amount
    #[serde(rename = "a")]
    pub amount: Amount,
    /// Secret message
    #[serde(rename = "s")]
    pub secret: Secret,
    /// Unblinded signature
    #[serde(
        rename = "c",
        serialize_with = "serialize_pubkey",
        deserialize_with = "deserialize_pubkey"
    )]
    pub c: PublicKey,
}

impl ProofV4 {
    fn into_proof(self, keyset_id: &KeysetId) -> Proof {
        Proof {
            amount: self.amount,
            keyset_id: keyset_id.clone(),
            secret: self.secret,
            c: self.c,
            witness: None,
        }
    }
}

fn serialize_keyset_id<S>(id: &KeysetId, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let bytes = id.to_bytes().map_err(serde::ser::Error::custom)?;
    serde_bytes::Bytes::new(&bytes).serialize(serializer)
}

fn deserialize_keyset_id<'de, D>(deserializer: D) -> Result<KeysetId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
    Ok(KeysetId::from_bytes(&bytes))
}

fn serialize_pubkey<S>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serde_bytes::Bytes::new(&key.to_bytes()).serialize(serializer)
}

fn deserialize_pubkey<'de, D>(deserializer: D) -> Result<PublicKey, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
    PublicKey::from_slice(&bytes).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_v3_decode() {
        let token_str = "cashuAeyJ0b2tlbiI6W3sibWludCI6Imh0dHBzOi8vODMzMy5zcGFjZTozMzM4IiwicHJvb2ZzIjpbeyJhbW91bnQiOjIsImlkIjoiMDA5YTFmMjkzMjUzZTQxZSIsInNlY3JldCI6IjQwNzkxNWJjMjEyYmU2MWE3N2UzZTZkMmFlYjRjNzI3OTgwYmRhNTFjZDA2YTZhZmMyOWUyODYxNzY4YTc4MzciLCJDIjoiMDJiYzkwOTc5OTdkODFhZmIyY2M3MzQ2YjVlNDM0NWE5MzQ2YmQyYTUwNmViNzk1ODU5OGE3MmYwY2Y4NTE2M2VhIn0seyJhbW91bnQiOjgsImlkIjoiMDA5YTFmMjkzMjUzZTQxZSIsInNlY3JldCI6ImZlMTUxMDkzMTRlNjFkNzc1NmIwZjhlZTBmMjNhNjI0YWNhYTNmNGUwNDJmNjE0MzNjNzI4YzcwNTdiOTMxYmUiLCJDIjoiMDI5ZThlNTA1MGI4OTBhN2Q2YzA5NjhkYjE2YmMxZDVkNWZhMDQwZWExZGUyODRmNmVjNjlkNjEyOTlmNjcxMDU5In1dfV0sInVuaXQiOiJzYXQiLCJtZW1vIjoiVGhhbmsgeW91LiJ9";

        let token = Token::from_str(token_str).unwrap();
        assert_eq!(
            token.mint_url().unwrap().to_string(),
            "https://8333.space:3338"
        );
        assert_eq!(token.proofs().len(), 2);
        assert_eq!(token.value().unwrap(), Amount::from(10));
        assert_eq!(token.unit(), Some(CurrencyUnit::Sat));
        assert_eq!(token.memo(), Some("Thank you.".to_string()));
    }

    #[test]
    fn test_token_v3_decode_no_padding() {
        // same token, padding stripped
        let padded = "cashuAeyJ0b2tlbiI6W3sibWludCI6Imh0dHBzOi8vODMzMy5zcGFjZTozMzM4IiwicHJvb2ZzIjpbeyJhbW91bnQiOjIsImlkIjoiMDA5YTFmMjkzMjUzZTQxZSIsInNlY3JldCI6IjQwNzkxNWJjMjEyYmU2MWE3N2UzZTZkMmFlYjRjNzI3OTgwYmRhNTFjZDA2YTZhZmMyOWUyODYxNzY4YTc4MzciLCJDIjoiMDJiYzkwOTc5OTdkODFhZmIyY2M3MzQ2YjVlNDM0NWE5MzQ2YmQyYTUwNmViNzk1ODU5OGE3MmYwY2Y4NTE2M2VhIn1dfV0sInVuaXQiOiJzYXQifQ==";
        let unpadded = padded.trim_end_matches('=');
        assert_eq!(
            Token::from_str(padded).unwrap(),
            Token::from_str(unpadded).unwrap()
        );
    }

    #[test]
    fn test_token_v4_round_trip() {
        let keyset_id = KeysetId::from_str("009a1f293253e41e").unwrap();
        let token = Token::TokenV4(TokenV4 {
            mint_url: MintUrl::from_str("https://8333.space:3338").unwrap(),
            unit: CurrencyUnit::Sat,
            memo: Some("Thank you".to_string()),
            token: vec![TokenV4Token {
                keyset_id: keyset_id.clone(),
                proofs: vec![ProofV4 {
                    amount: Amount::from(8),
                    secret: Secret::new(
                        "407915bc212be61a77e3e6d2aeb4c727980bda51cd06a6afc29e2861768a7837",
                    ),
                    c: PublicKey::from_hex(
                        "02bc9097997d81afb2cc7346b5e4345a9346bd2a506eb7958598a72f0cf85163ea",
                    )
                    .unwrap(),
                }],
            }],
        });

        let encoded = token.to_string();
        assert!(encoded.starts_with("cashuB"));

        let decoded = Token::from_str(&encoded).unwrap();
        assert_eq!(decoded, token);
        let proofs = decoded.proofs();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].keyset_id, keyset_id);
    }

    #[test]
    fn test_unsupported_prefix() {
        assert!(Token::from_str("casshuA11").is_err());
        assert!(Token::from_str("lnbc1").is_err());
    }
}
