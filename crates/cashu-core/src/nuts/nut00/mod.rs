//! NUT-00: Notation and Models
//!
//! <https://github.com/cashubtc/nuts/blob/main/00.md>

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::string::FromUtf8Error;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dhke::{blind_message, hash_to_curve};
use crate::nuts::nut01::{PublicKey, SecretKey};
use crate::nuts::nut02::Id;
use crate::nuts::nut12::{BlindSignatureDleq, ProofDleq};
use crate::secret::Secret;
use crate::Amount;

pub mod token;
pub use token::{Token, TokenV3, TokenV4};

/// List of [Proof]
pub type Proofs = Vec<Proof>;

/// NUT-00 error
#[derive(Debug, Error)]
pub enum Error {
    /// Tokens must carry at least one proof
    #[error("Proofs required in token")]
    ProofsRequired,
    /// Unknown or unsupported token prefix
    #[error("Unsupported token")]
    UnsupportedToken,
    /// Token unit missing where required
    #[error("Unsupported unit")]
    UnsupportedUnit,
    /// Duplicate proofs in token
    #[error("Duplicate proofs in token")]
    DuplicateProofs,
    /// Serde json error
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Utf8 parse error
    #[error(transparent)]
    Utf8Parse(#[from] FromUtf8Error),
    /// Base64 error
    #[error(transparent)]
    Base64(#[from] bitcoin::base64::DecodeError),
    /// Ciborium deserialization error
    #[error(transparent)]
    CiboriumDe(#[from] ciborium::de::Error<std::io::Error>),
    /// Ciborium serialization error
    #[error(transparent)]
    CiboriumSer(#[from] ciborium::ser::Error<std::io::Error>),
    /// Amount error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// Secret error
    #[error(transparent)]
    Secret(#[from] crate::secret::Error),
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] crate::dhke::Error),
    /// NUT-02 error
    #[error(transparent)]
    Nut02(#[from] crate::nuts::nut02::Error),
}

/// Utility methods for [Proofs]
pub trait ProofsMethods {
    /// Try to sum up the amounts of all proofs
    fn total_amount(&self) -> Result<Amount, Error>;

    /// Compute the `Y` lookup point of every proof
    fn ys(&self) -> Result<Vec<PublicKey>, Error>;

    /// Count proofs by keyset
    fn count_by_keyset(&self) -> HashMap<Id, u64>;
}

impl ProofsMethods for Proofs {
    fn total_amount(&self) -> Result<Amount, Error> {
        Amount::try_sum(self.iter().map(|p| p.amount)).map_err(Into::into)
    }

    fn ys(&self) -> Result<Vec<PublicKey>, Error> {
        self.iter().map(Proof::y).collect()
    }

    fn count_by_keyset(&self) -> HashMap<Id, u64> {
        let mut counts = HashMap::new();
        for proof in self.iter() {
            *counts.entry(proof.keyset_id).or_insert(0) += 1;
        }
        counts
    }
}

/// Blinded message (also called `output`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlindedMessage {
    /// Amount of the requested [`BlindSignature`]
    pub amount: Amount,
    /// Keyset from which a signature is expected
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Blinded secret message (`B_`)
    #[serde(rename = "B_")]
    pub blinded_secret: PublicKey,
}

impl BlindedMessage {
    /// Create new [`BlindedMessage`]
    pub fn new(amount: Amount, keyset_id: Id, blinded_secret: PublicKey) -> Self {
        Self {
            amount,
            keyset_id,
            blinded_secret,
        }
    }
}

/// Blinded signature (also called `promise`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    /// Amount the signature is worth
    pub amount: Amount,
    /// Keyset the signing key belongs to
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Blinded signature (`C_`)
    #[serde(rename = "C_")]
    pub c: PublicKey,
    /// DLEQ proof that `C_` was signed by the key advertised for `amount`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dleq: Option<BlindSignatureDleq>,
}

/// Proof: a bearer value token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Amount
    pub amount: Amount,
    /// Keyset that signed the proof
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Secret message
    pub secret: Secret,
    /// Unblinded signature (`C`)
    #[serde(rename = "C")]
    pub c: PublicKey,
    /// Witness, carried opaquely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
    /// DLEQ proof, with the blinding factor retained wallet side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dleq: Option<ProofDleq>,
}

impl Proof {
    /// Create new [`Proof`]
    pub fn new(amount: Amount, keyset_id: Id, secret: Secret, c: PublicKey) -> Self {
        Proof {
            amount,
            keyset_id,
            secret,
            c,
            witness: None,
            dleq: None,
        }
    }

    /// `Y = hash_to_curve(secret)`, the proof's lookup key for state checks
    pub fn y(&self) -> Result<PublicKey, Error> {
        Ok(hash_to_curve(self.secret.as_bytes())?)
    }
}

impl Hash for Proof {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.secret.hash(state);
    }
}

impl Ord for Proof {
    fn cmp(&self, other: &Self) -> Ordering {
        self.amount.cmp(&other.amount)
    }
}

impl PartialOrd for Proof {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Currency unit of a keyset
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurrencyUnit {
    /// Satoshi
    #[default]
    Sat,
    /// Millisatoshi
    Msat,
    /// US dollar cents
    Usd,
    /// Euro cents
    Eur,
    /// Any other unit the mint offers
    Custom(String),
}

impl FromStr for CurrencyUnit {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_uppercase().as_str() {
            "SAT" => Ok(Self::Sat),
            "MSAT" => Ok(Self::Msat),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            _ => Ok(Self::Custom(value.to_string())),
        }
    }
}

impl fmt::Display for CurrencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CurrencyUnit::Sat => "sat",
            CurrencyUnit::Msat => "msat",
            CurrencyUnit::Usd => "usd",
            CurrencyUnit::Eur => "eur",
            CurrencyUnit::Custom(unit) => unit,
        };
        f.write_str(s)
    }
}

impl Serialize for CurrencyUnit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CurrencyUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let unit = String::deserialize(deserializer)?;
        Self::from_str(&unit).map_err(serde::de::Error::custom)
    }
}

/// Blinded message with the secret and blinding factor it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreMint {
    /// Blinded message to submit
    pub blinded_message: BlindedMessage,
    /// Secret, held back until the proof is constructed
    pub secret: Secret,
    /// Blinding factor
    pub r: SecretKey,
    /// Amount
    pub amount: Amount,
}

impl Ord for PreMint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.amount.cmp(&other.amount)
    }
}

impl PartialOrd for PreMint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Secrets of one signing round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreMintSecrets {
    /// Secrets
    pub secrets: Vec<PreMint>,
    /// Keyset the outputs are addressed to
    pub keyset_id: Id,
}

impl PreMintSecrets {
    /// Create new [`PreMintSecrets`]
    pub fn new(keyset_id: Id) -> Self {
        Self {
            secrets: Vec::new(),
            keyset_id,
        }
    }

    /// Outputs with random secrets for the given amount split
    pub fn random(
        keyset_id: Id,
        amount: Amount,
        amount_split_target: &crate::amount::SplitTarget,
    ) -> Result<Self, Error> {
        let amount_split = amount.split_targeted(amount_split_target)?;
        let mut output = Self::new(keyset_id);

        for amount in amount_split {
            let secret = Secret::generate();
            let (blinded, r) = blind_message(secret.as_bytes(), None)?;

            output.secrets.push(PreMint {
                blinded_message: BlindedMessage::new(amount, keyset_id, blinded),
                secret,
                r,
                amount,
            });
        }

        Ok(output)
    }

    /// Blinded messages to submit to the mint
    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.secrets.iter().map(|pm| pm.blinded_message.clone()).collect()
    }

    /// Secrets in submission order
    pub fn secrets(&self) -> Vec<Secret> {
        self.secrets.iter().map(|pm| pm.secret.clone()).collect()
    }

    /// Blinding factors in submission order
    pub fn rs(&self) -> Vec<SecretKey> {
        self.secrets.iter().map(|pm| pm.r.clone()).collect()
    }

    /// Amounts in submission order
    pub fn amounts(&self) -> Vec<Amount> {
        self.secrets.iter().map(|pm| pm.amount).collect()
    }

    /// Total value of the round
    pub fn total_amount(&self) -> Result<Amount, Error> {
        Ok(Amount::try_sum(
            self.secrets.iter().map(|pm| pm.amount),
        )?)
    }

    /// Number of outputs
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether the round is empty
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Combine with the outputs of another round
    pub fn combine(&mut self, mut other: Self) {
        self.secrets.append(&mut other.secrets)
    }

    /// Sort secrets by amount to avoid fingerprinting
    pub fn sort_secrets(&mut self) {
        self.secrets.sort();
    }
}
