//! NUT-02: Keysets and keyset IDs
//!
//! <https://github.com/cashubtc/nuts/blob/main/02.md>

use core::fmt;
use core::str::FromStr;

use bitcoin::base64::engine::{general_purpose, GeneralPurpose};
use bitcoin::base64::{alphabet, Engine as _};
use bitcoin::hashes::{sha256, Hash};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, VecSkipError};
use thiserror::Error;

use super::nut01::Keys;
use super::CurrencyUnit;
use crate::util::hex;

/// NUT-02 error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Hex error
    #[error(transparent)]
    Hex(#[from] hex::Error),
    /// Keyset id could not be parsed in either form
    #[error("Keyset id invalid: `{0}`")]
    InvalidId(String),
    /// Keyset id length invalid
    #[error("Keyset id length invalid")]
    Length,
}

/// Keyset id version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySetVersion {
    /// `00`-prefixed hex id: version byte plus the first 7 bytes of the
    /// SHA-256 of the concatenated keyset public keys
    Version00,
    /// Pre-versioning base64 id, carried for old keysets only
    Legacy,
}

/// A keyset ID identifies a batch of mint keys for one unit
///
/// Derivable by anyone who knows the mint's public keys, and stored in
/// tokens so proofs can be matched to the signing keyset. Modern ids are 16
/// hex characters prefixed `00`; legacy ids are 12 base64 characters. Both
/// forms are accepted, and each round-trips back to its original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    version: KeySetVersion,
    bytes: [u8; Self::MAX_BYTES],
    len: u8,
}

impl Id {
    /// Hex form: version byte plus 7 hash bytes
    const BYTES: usize = 8;
    /// Legacy base64 ids decode to at most 12 bytes (16 base64 chars)
    const MAX_BYTES: usize = 12;
    const STRLEN: usize = 16;

    /// Raw bytes of the id
    ///
    /// For hex ids this includes the leading version byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes[..self.len as usize].to_vec()
    }

    /// Construct an [`Id`] from raw bytes
    ///
    /// Eight bytes starting with the `00` version byte are a modern id,
    /// anything else is treated as a legacy id.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() == Self::BYTES && bytes[0] == 0x00 {
            let mut buf = [0u8; Self::MAX_BYTES];
            buf[..Self::BYTES].copy_from_slice(bytes);
            return Ok(Self {
                version: KeySetVersion::Version00,
                bytes: buf,
                len: Self::BYTES as u8,
            });
        }

        if bytes.is_empty() || bytes.len() > Self::MAX_BYTES || bytes.len() % 3 != 0 {
            return Err(Error::Length);
        }

        let mut buf = [0u8; Self::MAX_BYTES];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            version: KeySetVersion::Legacy,
            bytes: buf,
            len: bytes.len() as u8,
        })
    }

    /// Whether this is a legacy base64 id
    pub fn is_legacy(&self) -> bool {
        self.version == KeySetVersion::Legacy
    }
}

/// The NUT-13 derivation integer for a keyset
///
/// Raw id bytes read big-endian, reduced mod (2^31 - 1). The hex and legacy
/// decodings feed the same reduction, which the NUT-13 reference vectors pin
/// down: `009a1f293253e41e` maps to `864559728`.
impl From<Id> for u32 {
    fn from(value: Id) -> Self {
        // Horner fold keeps legacy 9 and 12 byte ids inside u64
        const MODULUS: u64 = (1 << 31) - 1;

        value
            .to_bytes()
            .iter()
            .fold(0u64, |acc, byte| (acc * 256 + u64::from(*byte)) % MODULUS) as u32
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            KeySetVersion::Version00 => f.write_str(&hex::encode(self.to_bytes())),
            KeySetVersion::Legacy => {
                f.write_str(&general_purpose::STANDARD_NO_PAD.encode(self.to_bytes()))
            }
        }
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == Self::STRLEN && s.starts_with("00") {
            if let Ok(bytes) = hex::decode(s) {
                return Self::from_bytes(&bytes);
            }
        }

        // Legacy ids are unpadded base64; historical mints emitted both the
        // standard and the url-safe alphabet.
        let config = general_purpose::GeneralPurposeConfig::new()
            .with_decode_padding_mode(bitcoin::base64::engine::DecodePaddingMode::Indifferent);
        for alphabet in [alphabet::STANDARD, alphabet::URL_SAFE] {
            if let Ok(bytes) = GeneralPurpose::new(&alphabet, config).decode(s) {
                if let Ok(id) = Self::from_bytes(&bytes) {
                    return Ok(id);
                }
            }
        }

        Err(Error::InvalidId(s.to_string()))
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        Id::from_str(&id).map_err(serde::de::Error::custom)
    }
}

impl From<&Keys> for Id {
    /// Derive the id of a keyset from its public keys
    ///
    /// NUT-02: sort keys by amount ascending, concatenate the compressed
    /// keys, SHA-256, take the first 14 hex characters, prefix the version.
    fn from(map: &Keys) -> Self {
        let pubkeys_concat: Vec<u8> = map
            .iter()
            .flat_map(|(_, pubkey)| pubkey.to_bytes())
            .collect();

        let hash = sha256::Hash::hash(&pubkeys_concat);
        let hex_of_hash = hex::encode(hash.to_byte_array());

        // 14 hash chars after the version prefix; always valid hex
        Self::from_str(&format!("00{}", &hex_of_hash[0..14])).expect("valid id from hash")
    }
}

/// Keyset entry of the mint's `/v1/keysets` listing
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetInfo {
    /// Keyset id
    pub id: Id,
    /// Keyset unit
    pub unit: CurrencyUnit,
    /// Whether the mint still signs with this keyset
    pub active: bool,
    /// Input fee, parts per thousand per proof
    #[serde(default)]
    pub input_fee_ppk: u64,
}

/// Mint keysets listing [NUT-02]
///
/// Entries that fail to parse (future id versions) are skipped rather than
/// failing the whole listing.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetResponse {
    /// Keysets the mint has generated
    #[serde_as(as = "VecSkipError<_>")]
    pub keysets: Vec<KeySetInfo>,
}

/// Keyset with its keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    /// Keyset id
    pub id: Id,
    /// Keyset unit
    pub unit: CurrencyUnit,
    /// Keyset keys
    pub keys: Keys,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT_KEYSET_ID: &str = "00456a94ab4e1c46";
    const SHORT_KEYSET: &str = r#"
        {
            "1":"03a40f20667ed53513075dc51e715ff2046cad64eb68960632269ba7f0210e38bc",
            "2":"03fd4ce5a16b65576145949e6f99f445f8249fee17c606b688b504a849cdc452de",
            "4":"02648eccfa4c026960966276fa5a4cae46ce0fd432211a4f449bf84f13aa5f8303",
            "8":"02fdfd6796bfeac490cbee12f778f867f0a2c68f6508d17c649759ea0dc3547528"
        }
    "#;

    #[test]
    fn test_id_generation_from_keys() {
        let keys: Keys = serde_json::from_str(SHORT_KEYSET).unwrap();
        let id: Id = (&keys).into();
        assert_eq!(id, Id::from_str(SHORT_KEYSET_ID).unwrap());
    }

    #[test]
    fn test_hex_id_round_trip() {
        let id = Id::from_str("009a1f293253e41e").unwrap();
        assert_eq!(id.to_string(), "009a1f293253e41e");
        assert!(!id.is_legacy());
        assert_eq!(
            id.to_bytes(),
            vec![0x00, 0x9a, 0x1f, 0x29, 0x32, 0x53, 0xe4, 0x1e]
        );
    }

    #[test]
    fn test_legacy_id_round_trip() {
        // Base64 keyset id from a pre-versioning mint
        let id = Id::from_str("eGnEWtdJ0PIM").unwrap();
        assert!(id.is_legacy());
        assert_eq!(id.to_string(), "eGnEWtdJ0PIM");
    }

    #[test]
    fn test_id_to_int() {
        let id = Id::from_str("009a1f293253e41e").unwrap();
        assert_eq!(u32::from(id), 864559728);
    }

    #[test]
    fn test_legacy_id_to_int() {
        let id = Id::from_str("eGnEWtdJ0PIM").unwrap();
        // int.from_bytes(base64decode("eGnEWtdJ0PIM"), "big") % (2**31 - 1)
        assert_eq!(u32::from(id), 492415388);
    }

    #[test]
    fn test_keyset_response_skips_unknown_versions() {
        let json = r#"{"keysets":[
            {"id":"009a1f293253e41e","unit":"sat","active":true},
            {"id":"eGnEWtdJ0PIM","unit":"sat","active":false},
            {"id":"xx","unit":"sat","active":true},
            {"id":"00f7ca24d44c3e5e","unit":"usd","active":true,"input_fee_ppk":100}
        ]}"#;

        let response: KeysetResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.keysets.len(), 3);
        assert_eq!(response.keysets[2].input_fee_ppk, 100);
    }

    #[test]
    fn test_keyset_info_defaults_fee() {
        let json = r#"{"id":"009a1f293253e41e","unit":"sat","active":true}"#;
        let info: KeySetInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.input_fee_ppk, 0);
    }
}
