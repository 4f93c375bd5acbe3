//! Invoice and token history
//!
//! The invoice history is the wallet's durable record of Lightning
//! activity: one entry per quote id, signed amounts (positive incoming,
//! negative outgoing), append-only apart from status transitions and amount
//! finalization on melt completion.

use serde::{Deserialize, Serialize};

use crate::mint_url::MintUrl;
use crate::nuts::CurrencyUnit;
use crate::types::unix_time;
use crate::Amount;

/// Status of a history entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Awaiting settlement
    #[default]
    Pending,
    /// Settled
    Paid,
}

/// A Lightning invoice history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHistory {
    /// Signed amount: positive incoming, negative outgoing
    pub amount: i64,
    /// Bolt11 payment request
    pub bolt11: String,
    /// Quote id, unique per entry
    pub quote_id: String,
    /// Memo
    pub memo: String,
    /// Creation time, unix seconds
    pub date: u64,
    /// Status
    pub status: InvoiceStatus,
    /// Mint the quote belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_url: Option<MintUrl>,
    /// Unit of the amount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<CurrencyUnit>,
}

impl InvoiceHistory {
    /// Pending incoming entry; the sign convention is enforced here
    pub fn incoming(
        amount: Amount,
        bolt11: String,
        quote_id: String,
        memo: String,
        mint_url: Option<MintUrl>,
        unit: Option<CurrencyUnit>,
    ) -> Self {
        Self {
            amount: u64::from(amount) as i64,
            bolt11,
            quote_id,
            memo,
            date: unix_time(),
            status: InvoiceStatus::Pending,
            mint_url,
            unit,
        }
    }

    /// Pending outgoing entry; the sign convention is enforced here
    pub fn outgoing(
        amount: Amount,
        bolt11: String,
        quote_id: String,
        memo: String,
        mint_url: Option<MintUrl>,
        unit: Option<CurrencyUnit>,
    ) -> Self {
        Self {
            amount: -(u64::from(amount) as i64),
            bolt11,
            quote_id,
            memo,
            date: unix_time(),
            status: InvoiceStatus::Pending,
            mint_url,
            unit,
        }
    }

    /// Whether the underlying invoice has expired
    pub fn is_expired(&self, timestamp: u64, expiry: u64, now: u64) -> bool {
        timestamp + expiry < now
    }
}

/// A sent or received token history entry
///
/// Sent tokens stay pending until the mint reports their proofs spent; a
/// partially spent token is split into a paid portion and a new pending
/// portion holding the unspent proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHistory {
    /// Signed amount: positive received, negative sent
    pub amount: i64,
    /// Serialized token
    pub token: String,
    /// Creation time, unix seconds
    pub date: u64,
    /// Status
    pub status: InvoiceStatus,
    /// Mint the token belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_url: Option<MintUrl>,
    /// Unit of the amount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<CurrencyUnit>,
}

impl TokenHistory {
    /// Received-token entry, already settled
    pub fn received(
        amount: Amount,
        token: String,
        mint_url: Option<MintUrl>,
        unit: Option<CurrencyUnit>,
    ) -> Self {
        Self {
            amount: u64::from(amount) as i64,
            token,
            date: unix_time(),
            status: InvoiceStatus::Paid,
            mint_url,
            unit,
        }
    }

    /// Sent-token entry, pending until the proofs are seen spent
    pub fn sent(
        amount: Amount,
        token: String,
        mint_url: Option<MintUrl>,
        unit: Option<CurrencyUnit>,
    ) -> Self {
        Self {
            amount: -(u64::from(amount) as i64),
            token,
            date: unix_time(),
            status: InvoiceStatus::Pending,
            mint_url,
            unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_convention() {
        let incoming = InvoiceHistory::incoming(
            Amount::from(100),
            "lnbc1...".to_string(),
            "q1".to_string(),
            String::new(),
            None,
            None,
        );
        assert_eq!(incoming.amount, 100);
        assert_eq!(incoming.status, InvoiceStatus::Pending);

        let outgoing = InvoiceHistory::outgoing(
            Amount::from(205),
            "lnbc1...".to_string(),
            "q2".to_string(),
            "Outgoing invoice".to_string(),
            None,
            None,
        );
        assert_eq!(outgoing.amount, -205);

        let sent = TokenHistory::sent(Amount::from(5), "cashuB...".to_string(), None, None);
        assert_eq!(sent.amount, -5);
        assert_eq!(sent.status, InvoiceStatus::Pending);
    }

    #[test]
    fn test_expiry() {
        let entry = InvoiceHistory::incoming(
            Amount::from(1),
            "lnbc1...".to_string(),
            "q".to_string(),
            String::new(),
            None,
            None,
        );
        assert!(!entry.is_expired(1_000, 600, 1_500));
        assert!(entry.is_expired(1_000, 600, 1_700));
    }
}
