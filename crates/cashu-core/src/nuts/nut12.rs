//! NUT-12: Offline ecash signature validation
//!
//! <https://github.com/cashubtc/nuts/blob/main/12.md>

use bitcoin::secp256k1::{self, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut00::{BlindSignature, Proof};
use super::nut01::{PublicKey, SecretKey};
use crate::dhke::{hash_e, hash_to_curve};
use crate::SECP256K1;

/// NUT-12 error
#[derive(Debug, Error)]
pub enum Error {
    /// Signature carries no DLEQ proof
    #[error("No DLEQ proof provided")]
    MissingDleqProof,
    /// Challenge does not match, the mint key is not the one advertised
    #[error("Invalid DLEQ proof")]
    InvalidDleqProof,
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] crate::dhke::Error),
    /// NUT-01 error
    #[error(transparent)]
    Nut01(#[from] super::nut01::Error),
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] secp256k1::Error),
}

/// DLEQ proof attached to a blinded signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignatureDleq {
    /// Challenge
    pub e: SecretKey,
    /// Response
    pub s: SecretKey,
}

/// DLEQ proof carried on a proof
///
/// Includes the blinding factor so a recipient without the original
/// blinding state can verify against the mint key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDleq {
    /// Challenge
    pub e: SecretKey,
    /// Response
    pub s: SecretKey,
    /// Blinding factor
    pub r: SecretKey,
}

impl ProofDleq {
    /// Create new [`ProofDleq`]
    pub fn new(e: SecretKey, s: SecretKey, r: SecretKey) -> Self {
        Self { e, s, r }
    }
}

/// Verify that `C_` was produced with the key behind `A`
///
/// `R1 = s*G - e*A`, `R2 = s*B' - e*C'`, valid when
/// `e == hash(R1, R2, A, C')`.
fn verify_dleq(
    blinded_message: PublicKey,   // B'
    blinded_signature: PublicKey, // C'
    e: &SecretKey,
    s: &SecretKey,
    mint_pubkey: PublicKey, // A
) -> Result<(), Error> {
    let e_bytes: [u8; 32] = e.to_secret_bytes();
    let e: Scalar = e.as_scalar();

    // a = e*A
    let a: PublicKey = mint_pubkey.mul_tweak(&SECP256K1, &e)?.into();

    // R1 = s*G - a
    let a: PublicKey = a.negate(&SECP256K1).into();
    let r1: PublicKey = s.public_key().combine(&a)?.into();

    // b = s*B'
    let s: Scalar = s.as_scalar();
    let b: PublicKey = blinded_message.mul_tweak(&SECP256K1, &s)?.into();

    // c = e*C'
    let c: PublicKey = blinded_signature.mul_tweak(&SECP256K1, &e)?.into();

    // R2 = b - c
    let c: PublicKey = c.negate(&SECP256K1).into();
    let r2: PublicKey = b.combine(&c)?.into();

    let hash_e: [u8; 32] = hash_e([r1, r2, mint_pubkey, blinded_signature]);

    if e_bytes != hash_e {
        tracing::warn!("DLEQ on signature failed");
        return Err(Error::InvalidDleqProof);
    }

    Ok(())
}

/// Produce the DLEQ proof for a signature
///
/// Mint side; the wallet uses this for its in-process test mint.
pub fn calculate_dleq(
    blinded_signature: PublicKey, // C'
    blinded_message: &PublicKey,  // B'
    mint_secret_key: &SecretKey,  // a
) -> Result<BlindSignatureDleq, Error> {
    // Random nonce
    let r: SecretKey = SecretKey::generate();

    // R1 = r*G
    let r1 = r.public_key();

    // R2 = r*B'
    let r2: PublicKey = blinded_message
        .mul_tweak(&SECP256K1, &r.as_scalar())?
        .into();

    // e = hash(R1, R2, A, C')
    let e: [u8; 32] = hash_e([r1, r2, mint_secret_key.public_key(), blinded_signature]);
    let e_sk: SecretKey = SecretKey::from_slice(&e)?;

    // s = r + e*a
    let s1: SecretKey = e_sk.mul_tweak(&mint_secret_key.as_scalar())?;
    let s: SecretKey = r.add_tweak(&s1.as_scalar())?;

    Ok(BlindSignatureDleq { e: e_sk, s })
}

impl Proof {
    /// Verify the DLEQ proof carried on this proof
    pub fn verify_dleq(&self, mint_pubkey: PublicKey) -> Result<(), Error> {
        match &self.dleq {
            Some(dleq) => {
                let y = hash_to_curve(self.secret.as_bytes())?;

                // Reconstruct the blinded pair from the blinding factor
                let bs1: PublicKey = mint_pubkey
                    .mul_tweak(&SECP256K1, &dleq.r.as_scalar())?
                    .into();
                let blinded_signature: PublicKey = self.c.combine(&bs1)?.into();
                let blinded_message: PublicKey = y.combine(&dleq.r.public_key())?.into();

                verify_dleq(
                    blinded_message,
                    blinded_signature,
                    &dleq.e,
                    &dleq.s,
                    mint_pubkey,
                )
            }
            None => Err(Error::MissingDleqProof),
        }
    }
}

impl BlindSignature {
    /// Verify the DLEQ proof on this blinded signature
    pub fn verify_dleq(
        &self,
        mint_pubkey: PublicKey,
        blinded_message: PublicKey,
    ) -> Result<(), Error> {
        match &self.dleq {
            Some(dleq) => verify_dleq(blinded_message, self.c, &dleq.e, &dleq.s, mint_pubkey),
            None => Err(Error::MissingDleqProof),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::dhke::{blind_message, sign_message, unblind_message};
    use crate::nuts::nut02::Id;
    use crate::secret::Secret;
    use crate::Amount;

    #[test]
    fn test_blind_signature_dleq_round_trip() {
        let mint_key = SecretKey::generate();
        let secret = Secret::generate();

        let (blinded, _r) = blind_message(secret.as_bytes(), None).unwrap();
        let signed = sign_message(&mint_key, &blinded).unwrap();
        let dleq = calculate_dleq(signed, &blinded, &mint_key).unwrap();

        let signature = BlindSignature {
            amount: Amount::ONE,
            keyset_id: Id::from_str("009a1f293253e41e").unwrap(),
            c: signed,
            dleq: Some(dleq),
        };

        assert!(signature
            .verify_dleq(mint_key.public_key(), blinded)
            .is_ok());

        // Wrong mint key is rejected
        let other = SecretKey::generate();
        assert!(signature.verify_dleq(other.public_key(), blinded).is_err());
    }

    #[test]
    fn test_proof_dleq_round_trip() {
        let mint_key = SecretKey::generate();
        let secret = Secret::generate();

        let (blinded, r) = blind_message(secret.as_bytes(), None).unwrap();
        let signed = sign_message(&mint_key, &blinded).unwrap();
        let dleq = calculate_dleq(signed, &blinded, &mint_key).unwrap();

        let c = unblind_message(&signed, &r, &mint_key.public_key()).unwrap();

        let proof = Proof {
            amount: Amount::ONE,
            keyset_id: Id::from_str("009a1f293253e41e").unwrap(),
            secret,
            c,
            witness: None,
            dleq: Some(ProofDleq::new(dleq.e, dleq.s, r)),
        };

        assert!(proof.verify_dleq(mint_key.public_key()).is_ok());
    }

    #[test]
    fn test_missing_dleq_is_an_error() {
        let mint_key = SecretKey::generate();
        let secret = Secret::generate();

        let (blinded, r) = blind_message(secret.as_bytes(), None).unwrap();
        let signed = sign_message(&mint_key, &blinded).unwrap();
        let c = unblind_message(&signed, &r, &mint_key.public_key()).unwrap();

        let proof = Proof::new(
            Amount::ONE,
            Id::from_str("009a1f293253e41e").unwrap(),
            secret,
            c,
        );

        assert!(matches!(
            proof.verify_dleq(mint_key.public_key()),
            Err(Error::MissingDleqProof)
        ));
    }
}
