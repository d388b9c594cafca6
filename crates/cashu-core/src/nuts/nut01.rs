//! NUT-01: Mint public key exchange
//!
//! <https://github.com/cashubtc/nuts/blob/main/01.md>

use core::fmt;
use core::ops::Deref;
use core::str::FromStr;
use std::collections::BTreeMap;

use bitcoin::secp256k1;
use bitcoin::secp256k1::rand::rngs::OsRng;
use bitcoin::secp256k1::Scalar;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};

use super::nut02::KeySet;
use crate::Amount;
use crate::SECP256K1;

/// NUT-01 error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Compressed public keys are 33 bytes
    #[error("Invalid public key size: expected {expected}, found {found}")]
    InvalidPublicKeySize {
        /// Expected size
        expected: usize,
        /// Actual size
        found: usize,
    },
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] secp256k1::Error),
}

/// Public key on the secp256k1 curve, compressed wire form
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
}

impl Deref for PublicKey {
    type Target = secp256k1::PublicKey;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<secp256k1::PublicKey> for PublicKey {
    fn from(inner: secp256k1::PublicKey) -> Self {
        Self { inner }
    }
}

impl PublicKey {
    /// Parse from compressed bytes
    ///
    /// Rejects anything that is not a valid point on the curve.
    #[inline]
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        if slice.len() != 33 {
            return Err(Error::InvalidPublicKeySize {
                expected: 33,
                found: slice.len(),
            });
        }
        Ok(Self {
            inner: secp256k1::PublicKey::from_slice(slice)?,
        })
    }

    /// Parse from a compressed hex string
    #[inline]
    pub fn from_hex<S>(hex: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        let hex = hex.as_ref();
        if hex.len() != 33 * 2 {
            return Err(Error::InvalidPublicKeySize {
                expected: 33,
                found: hex.len() / 2,
            });
        }
        Ok(Self {
            inner: secp256k1::PublicKey::from_str(hex)?,
        })
    }

    /// Compressed 33 byte serialization
    #[inline]
    pub fn to_bytes(&self) -> [u8; 33] {
        self.inner.serialize()
    }

    /// Uncompressed 65 byte serialization
    #[inline]
    pub fn to_uncompressed_bytes(&self) -> [u8; 65] {
        self.inner.serialize_uncompressed()
    }

    /// Compressed hex serialization
    #[inline]
    pub fn to_hex(&self) -> String {
        self.inner.to_string()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(hex: &str) -> Result<Self, Self::Err> {
        Self::from_hex(hex)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let public_key: String = String::deserialize(deserializer)?;
        Self::from_hex(public_key).map_err(serde::de::Error::custom)
    }
}

/// Secret key scalar in `[1, n-1]`
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    inner: secp256k1::SecretKey,
}

impl Deref for SecretKey {
    type Target = secp256k1::SecretKey;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<secp256k1::SecretKey> for SecretKey {
    fn from(inner: secp256k1::SecretKey) -> Self {
        Self { inner }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("inner", &"[REDACTED]")
            .finish()
    }
}

impl SecretKey {
    /// Parse from bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            inner: secp256k1::SecretKey::from_slice(slice)?,
        })
    }

    /// Parse from a hex string
    pub fn from_hex<S>(hex: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            inner: secp256k1::SecretKey::from_str(hex.as_ref())?,
        })
    }

    /// Generate a random secret key, rejection sampled in `[1, n-1]`
    pub fn generate() -> Self {
        let (secret_key, _) = SECP256K1.generate_keypair(&mut OsRng);
        Self { inner: secret_key }
    }

    /// Secret key as a hex string
    pub fn to_secret_hex(&self) -> String {
        self.inner.display_secret().to_string()
    }

    /// Secret key bytes
    pub fn as_secret_bytes(&self) -> &[u8] {
        self.inner.as_ref()
    }

    /// Secret key bytes
    pub fn to_secret_bytes(&self) -> [u8; 32] {
        self.inner.secret_bytes()
    }

    /// Public key for this secret key
    pub fn public_key(&self) -> PublicKey {
        self.inner.public_key(&SECP256K1).into()
    }

    /// [`SecretKey`] as [`Scalar`]
    #[inline]
    pub fn as_scalar(&self) -> Scalar {
        Scalar::from(self.inner)
    }

    /// Multiply by a scalar, mod n
    pub fn mul_tweak(&self, scalar: &Scalar) -> Result<Self, Error> {
        Ok(self.inner.mul_tweak(scalar).map(Self::from)?)
    }

    /// Add a scalar, mod n
    pub fn add_tweak(&self, scalar: &Scalar) -> Result<Self, Error> {
        Ok(self.inner.add_tweak(scalar).map(Self::from)?)
    }
}

impl FromStr for SecretKey {
    type Err = Error;

    fn from_str(secret_key: &str) -> Result<Self, Self::Err> {
        Self::from_hex(secret_key)
    }
}

impl Serialize for SecretKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match serializer.is_human_readable() {
            // JSON: hex string
            true => serializer.serialize_str(&self.to_secret_hex()),
            // CBOR: raw bytes
            false => serializer.serialize_bytes(self.as_secret_bytes()),
        }
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match deserializer.is_human_readable() {
            true => {
                let secret_key: String = String::deserialize(deserializer)?;
                SecretKey::from_hex(secret_key).map_err(serde::de::Error::custom)
            }
            false => {
                struct SecretKeyVisitor;

                impl Visitor<'_> for SecretKeyVisitor {
                    type Value = SecretKey;

                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        formatter.write_str("32 secret key bytes")
                    }

                    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        SecretKey::from_slice(v).map_err(serde::de::Error::custom)
                    }
                }

                deserializer.deserialize_bytes(SecretKeyVisitor)
            }
        }
    }
}

/// Keyset public keys, one per amount
///
/// Amounts larger than the host integer width are dropped on
/// deserialization; those denominations are unsupported, not fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Keys(BTreeMap<Amount, PublicKey>);

impl Keys {
    /// Create new [`Keys`]
    pub fn new(keys: BTreeMap<Amount, PublicKey>) -> Self {
        Self(keys)
    }

    /// Iterate over `(amount, key)` pairs in ascending amount order
    pub fn iter(&self) -> impl Iterator<Item = (&Amount, &PublicKey)> {
        self.0.iter()
    }

    /// Mint public key for `amount`
    pub fn amount_key(&self, amount: Amount) -> Option<PublicKey> {
        self.0.get(&amount).copied()
    }

    /// Number of amounts in the keyset
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the keyset is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Keys {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // NUT-01 keys objects map stringified amounts to compressed keys.
        // Unparseable amounts (wider than u64) are skipped.
        let raw: BTreeMap<String, PublicKey> = BTreeMap::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .filter_map(|(amount, key)| Some((Amount::from(amount.parse::<u64>().ok()?), key)))
                .collect(),
        ))
    }
}

/// Mint keys response [NUT-01]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysResponse {
    /// Keysets with their keys
    pub keysets: Vec<KeySet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_from_hex() {
        assert!(PublicKey::from_hex(
            "02194603ffa36356f4a56b7df9371fc3192472351453ec7398b8da8117e7c3e104"
        )
        .is_ok());

        // Uncompressed keys are rejected
        assert!(PublicKey::from_hex("04fd4ce5a16b65576145949e6f99f445f8249fee17c606b688b504a849cdc452de3625246cb2c27dac965cb7200a5986467eee92eb7d496bbf1453b074e223e481")
            .is_err());
    }

    #[test]
    fn test_compressed_round_trip() {
        for _ in 0..8 {
            let key = SecretKey::generate().public_key();
            let decoded = PublicKey::from_slice(&key.to_bytes()).unwrap();
            assert_eq!(key, decoded);
        }
    }

    #[test]
    fn test_keys_deserialization_drops_oversized_amounts() {
        let json = r#"
        {
            "1":"03a40f20667ed53513075dc51e715ff2046cad64eb68960632269ba7f0210e38bc",
            "2":"03fd4ce5a16b65576145949e6f99f445f8249fee17c606b688b504a849cdc452de",
            "36893488147419103232":"02648eccfa4c026960966276fa5a4cae46ce0fd432211a4f449bf84f13aa5f8303"
        }
        "#;

        let keys: Keys = serde_json::from_str(json).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.amount_key(Amount::from(1)).is_some());
        assert!(keys.amount_key(Amount::from(2)).is_some());
    }
}
