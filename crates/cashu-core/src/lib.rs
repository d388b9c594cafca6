//! Cashu protocol types and cryptography.
//!
//! Wire types for the mint's `/v1/*` endpoints, the BDHKE blinding scheme,
//! token encodings and deterministic (NUT-13) secret derivation. The wallet
//! state machine lives in the `cwk` crate.

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod amount;
pub mod dhke;
pub mod mint_url;
pub mod nuts;
pub mod secret;
pub mod util;

pub use bitcoin::hashes::sha256::Hash as Sha256;
pub use lightning_invoice::{self, Bolt11Invoice};

pub use self::amount::Amount;
pub use self::mint_url::MintUrl;
pub use self::nuts::*;
pub use self::util::SECP256K1;

/// Bail out of the current function with the given error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
