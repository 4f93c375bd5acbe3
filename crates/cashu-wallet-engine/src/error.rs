//! Errors

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::amount::Amount;

/// Wallet engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Mint has no keysets
    #[error("No keysets")]
    NoKeysets,
    /// Mint has keysets but none active for the wallet unit
    #[error("No active keysets for unit")]
    NoActiveKeysetsForUnit,
    /// No mint has been activated
    #[error("No active mint")]
    NoActiveMint,
    /// Not enough funds for the requested amount
    #[error("Balance too low: `{available}` available, `{required}` required")]
    BalanceTooLow {
        /// Spendable balance
        available: Amount,
        /// Amount needed
        required: Amount,
    },
    /// Mint quote has not been paid
    #[error("Invoice not paid yet")]
    InvoiceNotPaidYet,
    /// Melt quote is still pending
    #[error("Invoice still pending")]
    InvoiceStillPending,
    /// Invoice already paid by this wallet
    #[error("Invoice already paid")]
    InvoiceAlreadyPaid,
    /// A quote request is already in flight
    #[error("Already processing a quote request")]
    AlreadyProcessingQuote,
    /// Combined multi-mint balance cannot cover the invoice
    #[error("Insufficient multi-mint balance: `{available}` available, `{required}` required")]
    InsufficientMultiMintBalance {
        /// Combined balance over eligible mints
        available: Amount,
        /// Invoice amount
        required: Amount,
    },
    /// No mint supports NUT-15 for the method and unit
    #[error("No mint supports multi-path payments")]
    NoMintSupportsMpp,
    /// Mint already signed outputs at this derivation index; counter was
    /// jumped and the caller should retry
    #[error("Outputs have already been signed")]
    OutputsAlreadyBeenSigned,
    /// Error response from the mint
    #[error("Mint error: `{0}`")]
    Mint(ErrorResponse),
    /// Lightning payment failed; reservations were released
    #[error("Payment failed")]
    PaymentFailed,
    /// Melt failed but the quote is PAID or PENDING; nothing was rolled back
    #[error("Payment possibly in flight")]
    PaymentPossiblyInFlight,
    /// Process is unloading; rollback suppressed
    #[error("Unloading")]
    Unloading,
    /// Input could not be decoded
    #[error("Decode failed: `{0}`")]
    DecodeFailed(String),
    /// LNURL endpoint error
    #[error("LNURL error: `{0}`")]
    Lnurl(String),
    /// Keyset is not known
    #[error("Unknown keyset")]
    UnknownKeySet,
    /// Quote is not known
    #[error("Unknown quote")]
    UnknownQuote,
    /// Amount error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// Mint url error
    #[error(transparent)]
    MintUrl(#[from] crate::mint_url::Error),
    /// Database error
    #[error(transparent)]
    Database(#[from] crate::database::Error),
    /// NUT00 error
    #[error(transparent)]
    NUT00(#[from] crate::nuts::nut00::Error),
    /// NUT01 error
    #[error(transparent)]
    NUT01(#[from] crate::nuts::nut01::Error),
    /// NUT02 error
    #[error(transparent)]
    NUT02(#[from] crate::nuts::nut02::Error),
    /// Parse invoice error
    #[error(transparent)]
    Invoice(#[from] lightning_invoice::ParseOrSemanticError),
    /// Mnemonic error
    #[error(transparent)]
    Bip39(#[from] bip39::Error),
    /// Http error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Serde error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    /// Custom error
    #[error("`{0}`")]
    Custom(String),
}

impl Error {
    /// Whether a mint error means our derivation counter is behind
    pub fn is_outputs_already_signed(&self) -> bool {
        match self {
            Self::OutputsAlreadyBeenSigned => true,
            Self::Mint(response) => response.is_outputs_already_signed(),
            _ => false,
        }
    }
}

/// Mint error code [NUT-00 error codes]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Blinded message of output already signed
    OutputAlreadySigned,
    /// Token already spent
    TokenAlreadySpent,
    /// Quote is not paid
    QuoteNotPaid,
    /// Keyset is not known
    KeysetNotFound,
    /// Unknown code
    Unknown(u16),
}

impl ErrorCode {
    /// From the numeric wire code
    pub fn from_code(code: u16) -> Self {
        match code {
            10002 => Self::OutputAlreadySigned,
            11001 => Self::TokenAlreadySpent,
            20001 => Self::QuoteNotPaid,
            12001 => Self::KeysetNotFound,
            other => Self::Unknown(other),
        }
    }

    /// To the numeric wire code
    pub fn to_code(&self) -> u16 {
        match self {
            Self::OutputAlreadySigned => 10002,
            Self::TokenAlreadySpent => 11001,
            Self::QuoteNotPaid => 20001,
            Self::KeysetNotFound => 12001,
            Self::Unknown(code) => *code,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.to_code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;
        Ok(ErrorCode::from_code(code))
    }
}

/// Error response from the mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error Code
    pub code: ErrorCode,
    /// Human readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Longer error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Interpret a mint response body as an error envelope.
    ///
    /// Any response that does not parse as the expected type goes through
    /// here; bodies that are not even an error envelope are preserved
    /// verbatim so nothing the mint said is lost.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<ErrorResponse>(value.clone()) {
            Ok(response) => response,
            Err(_) => ErrorResponse {
                code: ErrorCode::Unknown(999),
                error: Some(value.to_string()),
                detail: None,
            },
        }
    }

    /// Whether this is the "outputs have already been signed" error
    pub fn is_outputs_already_signed(&self) -> bool {
        if self.code == ErrorCode::OutputAlreadySigned {
            return true;
        }

        // older mints only say it in the message
        self.error
            .as_deref()
            .map(|e| e.to_lowercase().contains("already signed"))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "code: {}, error: {}, detail: {}",
            self.code.to_code(),
            self.error.clone().unwrap_or_default(),
            self.detail.clone().unwrap_or_default()
        )
    }
}

impl From<ErrorResponse> for Error {
    fn from(response: ErrorResponse) -> Self {
        if response.is_outputs_already_signed() {
            Self::OutputsAlreadyBeenSigned
        } else {
            Self::Mint(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_from_value() {
        let value: Value =
            serde_json::from_str(r#"{"code": 20001, "error": "quote not paid"}"#).unwrap();
        let response = ErrorResponse::from_value(value);
        assert_eq!(response.code, ErrorCode::QuoteNotPaid);

        let not_an_envelope: Value = serde_json::from_str(r#"{"quote": "abc"}"#).unwrap();
        let response = ErrorResponse::from_value(not_an_envelope);
        assert!(matches!(response.code, ErrorCode::Unknown(_)));
        assert!(response.error.unwrap().contains("abc"));
    }

    #[test]
    fn test_outputs_already_signed_detection() {
        let by_code = ErrorResponse {
            code: ErrorCode::OutputAlreadySigned,
            error: None,
            detail: None,
        };
        assert!(by_code.is_outputs_already_signed());

        let by_message = ErrorResponse {
            code: ErrorCode::Unknown(999),
            error: Some("outputs have already been signed before".to_string()),
            detail: None,
        };
        assert!(by_message.is_outputs_already_signed());
        assert!(Error::from(by_message).is_outputs_already_signed());
    }
}
