//! Cashu Wallet Kit
//!
//! A Chaumian ecash wallet over Bitcoin Lightning: deterministic NUT-13
//! secrets, the BDHKE handshake, and the durable proof/counter store that
//! makes counter reuse impossible by construction. A reused counter
//! produces a duplicate secret the mint rejects, permanently stranding
//! funds.
//!
//! Protocol types and cryptography live in [`cashu_core`]; a durable redb
//! store ships in the `cwk-redb` crate.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod database;
pub mod error;
pub mod fees;
pub mod lightning_address;
pub mod wallet;

pub use cashu_core::{self, amount, dhke, nuts, secret, util, Amount, Bolt11Invoice, MintUrl};

pub use self::database::WalletDatabase;
pub use self::error::Error;
pub use self::wallet::{
    HttpClient, MeltQuote, Melted, MintConnector, MintQuote, ProofInfo, Wallet, WalletId,
};
