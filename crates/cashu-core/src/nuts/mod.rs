//! NUT definitions
//!
//! Compliant with [Cashu NUTs](https://github.com/cashubtc/nuts/)

pub mod nut00;
pub mod nut01;
pub mod nut02;
pub mod nut03;
pub mod nut04;
pub mod nut05;
pub mod nut06;
pub mod nut07;
pub mod nut09;
pub mod nut12;
pub mod nut13;
pub mod nut18;

pub use nut00::{
    BlindSignature, BlindedMessage, CurrencyUnit, PreMint, PreMintSecrets, Proof, Proofs,
    ProofsMethods, Token, TokenV3, TokenV4,
};
pub use nut01::{Keys, KeysResponse, PublicKey, SecretKey};
pub use nut02::{Id, KeySet, KeySetInfo, KeysetResponse};
pub use nut03::{SwapRequest, SwapResponse};
pub use nut04::{
    MintBolt11Request, MintBolt11Response, MintQuoteBolt11Request, MintQuoteBolt11Response,
    QuoteState as MintQuoteState,
};
pub use nut05::{
    MeltBolt11Request, MeltQuoteBolt11Request, MeltQuoteBolt11Response,
    QuoteState as MeltQuoteState,
};
pub use nut06::MintInfo;
pub use nut07::{CheckStateRequest, CheckStateResponse, ProofState, State};
pub use nut09::{RestoreRequest, RestoreResponse};
pub use nut12::{BlindSignatureDleq, ProofDleq};
pub use nut18::{PaymentRequest, Transport};
