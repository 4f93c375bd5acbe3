//! Core wallet engine for a Cashu ecash client
//!
//! The engine mints, sends, receives and melts bearer proofs against one or
//! more Cashu mints, speaking the mint HTTP and WebSocket protocol. Blinding
//! cryptography, persistence and background scheduling are collaborators
//! injected at construction.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod amount;
pub mod blinding;
pub mod database;
pub mod error;
pub mod fees;
pub mod invoice;
pub mod mint_url;
pub mod nuts;
pub mod secret;
pub mod seed;
pub mod types;
pub mod wallet;

pub use amount::Amount;
pub use blinding::{BlindingCrypto, PreMint, PreMintSecrets};
pub use database::{WalletDatabase, WalletMemoryDatabase, WalletSnapshot};
pub use error::{Error, ErrorResponse};
pub use invoice::{InvoiceHistory, InvoiceStatus, TokenHistory};
pub use mint_url::MintUrl;
pub use seed::SeedStore;
pub use types::{Melted, MeltQuote, MintQuote, ProofInfo, Reservation};
pub use wallet::client::{HttpClient, MintConnector};
pub use wallet::{DecodedRequest, Wallet, WorkerQueue};
