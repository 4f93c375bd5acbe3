//! Pay-invoice session
//!
//! Transient state for the payment currently being prepared: the decoded
//! target, quote responses, LNURL metadata and the `blocking` latch that
//! serializes quote requests. Quote operations hold a [`QuoteLatch`] so the
//! latch is released on every exit path.

use std::sync::{Arc, Mutex};

use crate::nuts::MeltQuoteBolt11Response;
use crate::wallet::client::LnurlPayResponse;
use crate::wallet::melt::MppQuotePart;
use crate::Error;

/// A decoded BOLT-11 target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInvoice {
    /// The raw bolt11 string
    pub bolt11: String,
    /// Invoice amount in sat, when present
    pub amount_sat: Option<u64>,
    /// Payment hash, hex
    pub payment_hash: String,
    /// Invoice description
    pub description: String,
    /// Invoice creation time, unix seconds
    pub timestamp: u64,
    /// Invoice expiry window, seconds
    pub expiry: u64,
}

impl DecodedInvoice {
    /// Unix time the invoice expires at
    pub fn expire_date(&self) -> u64 {
        self.timestamp + self.expiry
    }

    /// Whether the invoice is expired at `now`
    pub fn expired(&self, now: u64) -> bool {
        self.expire_date() < now
    }
}

/// Transient state of the payment being prepared
#[derive(Debug, Default)]
pub struct PayInvoiceSession {
    /// Decoded invoice currently being paid
    pub invoice: Option<DecodedInvoice>,
    /// Single-mint melt quote
    pub melt_quote: Option<MeltQuoteBolt11Response>,
    /// Multi-mint quote fan-out
    pub mpp_quotes: Vec<MppQuotePart>,
    /// LNURL-pay metadata of the current target
    pub lnurl_pay: Option<LnurlPayResponse>,
    /// Amount derived from LNURL metadata, sat
    pub lnurl_amount_sat: Option<u64>,
    /// Last error message, kept for display
    pub error: Option<String>,
    blocking: bool,
}

impl PayInvoiceSession {
    /// Whether a quote request is in flight
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Clear everything related to the previous payment target
    pub fn reset(&mut self) {
        self.invoice = None;
        self.melt_quote = None;
        self.mpp_quotes.clear();
        self.lnurl_pay = None;
        self.lnurl_amount_sat = None;
        self.error = None;
    }
}

/// Scoped hold of the session `blocking` latch
///
/// Releases the latch on drop, success and failure alike.
#[must_use = "the latch is released when the guard drops"]
#[derive(Debug)]
pub struct QuoteLatch {
    session: Arc<Mutex<PayInvoiceSession>>,
}

impl QuoteLatch {
    /// Engage the latch; fails when a quote request is already in flight
    pub fn engage(session: Arc<Mutex<PayInvoiceSession>>) -> Result<Self, Error> {
        {
            let mut guard = session.lock().expect("session lock");
            if guard.blocking {
                return Err(Error::AlreadyProcessingQuote);
            }
            guard.blocking = true;
        }

        Ok(Self { session })
    }
}

impl Drop for QuoteLatch {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.session.lock() {
            guard.blocking = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_is_exclusive_and_scoped() {
        let session = Arc::new(Mutex::new(PayInvoiceSession::default()));

        let latch = QuoteLatch::engage(session.clone()).unwrap();
        assert!(session.lock().unwrap().is_blocking());

        // second engage fails while held
        assert!(matches!(
            QuoteLatch::engage(session.clone()),
            Err(Error::AlreadyProcessingQuote)
        ));

        drop(latch);
        assert!(!session.lock().unwrap().is_blocking());

        // released on drop, so a new engage succeeds
        let _latch = QuoteLatch::engage(session.clone()).unwrap();
    }

    #[test]
    fn test_invoice_expiry() {
        let invoice = DecodedInvoice {
            bolt11: "lnbc1...".to_string(),
            amount_sat: Some(100),
            payment_hash: String::new(),
            description: String::new(),
            timestamp: 1_000,
            expiry: 600,
        };

        assert_eq!(invoice.expire_date(), 1_600);
        assert!(!invoice.expired(1_600));
        assert!(invoice.expired(1_601));
    }
}
