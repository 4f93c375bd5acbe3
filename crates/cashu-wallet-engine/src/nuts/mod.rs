//! Nuts
//!
//! See all the nuts: <https://github.com/cashubtc/nuts>

pub mod nut00;
pub mod nut01;
pub mod nut02;
pub mod nut04;
pub mod nut05;
pub mod nut06;
pub mod nut07;
pub mod nut15;
pub mod nut17;

pub use nut00::{
    BlindSignature, BlindedMessage, CurrencyUnit, PaymentMethod, Proof, Proofs, ProofsMethods,
    Token, TokenV3, TokenV4,
};
pub use nut01::{Keys, PublicKey};
pub use nut02::{KeySet, KeySetInfo, KeysResponse, KeysetId, KeysetResponse, KeysetVersion};
pub use nut04::{
    MintQuoteBolt11Request, MintQuoteBolt11Response, MintQuoteState, MintRequest, MintResponse,
};
pub use nut05::{
    MeltOptions, MeltQuoteBolt11Request, MeltQuoteBolt11Response, MeltQuoteState, MeltRequest,
};
pub use nut06::{MintInfo, MintVersion, Nuts};
pub use nut07::{CheckStateRequest, CheckStateResponse, ProofState, State};
pub use nut15::Mpp;
pub use nut17::{Kind, NotificationPayload, Params};

/// Swap request [NUT-03]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SwapRequest {
    /// Proofs that are to be spent in a swap
    pub inputs: Proofs,
    /// Blinded messages for the mint to sign
    pub outputs: Vec<BlindedMessage>,
}

/// Swap response [NUT-03]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SwapResponse {
    /// Promises
    pub signatures: Vec<BlindSignature>,
}
