//! Redb storage backend for cwk
//!
//! A single ACID database file. Every mutation of one protocol round runs
//! inside one write transaction, and counter advances are an in-transaction
//! read+write, so no counter value is ever handed out twice, even across
//! processes sharing the file.

#![warn(missing_docs)]

mod error;
pub mod wallet;

pub use error::Error;
pub use wallet::WalletRedbDatabase;
