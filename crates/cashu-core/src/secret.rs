//! Secret

use std::fmt;
use std::str::FromStr;

use bitcoin::secp256k1::rand::{self, RngCore};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::util::hex;

/// Maximum allowed length of a secret in characters
pub const MAX_SECRET_LENGTH: usize = 512;

/// The secret data that allows spending ecash
///
/// Deterministically derived secrets are the hex encoding of a 32 byte key;
/// the mint only ever sees the hex ASCII bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

/// Secret error
#[derive(Debug, Error)]
pub enum Error {
    /// Secret is longer than the protocol allows
    #[error("Secret exceeds maximum allowed length")]
    InvalidLength,
    /// Hex error
    #[error(transparent)]
    Hex(#[from] hex::Error),
}

impl Secret {
    /// Create new [`Secret`]
    pub fn new<S>(secret: S) -> Result<Self, Error>
    where
        S: Into<String>,
    {
        let secret = secret.into();
        if secret.chars().count() > MAX_SECRET_LENGTH {
            return Err(Error::InvalidLength);
        }
        Ok(Self(secret))
    }

    /// Generate a new random secret as the recommended 32 byte hex
    pub fn generate() -> Self {
        let mut random_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        // 64 chars, always within the length limit
        Self(hex::encode(random_bytes))
    }

    /// [`Secret`] as bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// [`Secret`] to bytes
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Secret::new(s).map_err(serde::de::Error::custom)
    }
}

impl FromStr for Secret {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Secret> for Vec<u8> {
    fn from(value: Secret) -> Vec<u8> {
        value.to_bytes()
    }
}

impl From<&Secret> for Vec<u8> {
    fn from(value: &Secret) -> Vec<u8> {
        value.to_bytes()
    }
}
