//! Blind Diffie-Hellman key exchange
//!
//! The wallet blinds `Y = hash_to_curve(secret)` with a random factor,
//! the mint signs the blinded point, and the wallet unblinds the result
//! into the proof signature `C`. The mint never sees `Y` and the wallet
//! never sees the mint's private key.

use std::ops::Deref;

use bitcoin::hashes::sha256::Hash as Sha256Hash;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Parity, PublicKey as NormalizedPublicKey, Scalar, XOnlyPublicKey};
use thiserror::Error;

use crate::nuts::nut01::{Keys, PublicKey, SecretKey};
use crate::nuts::nut12::ProofDleq;
use crate::nuts::{BlindSignature, Proof, Proofs};
use crate::secret::Secret;
use crate::util::hex;
use crate::SECP256K1;

const DOMAIN_SEPARATOR: &[u8; 28] = b"Secp256k1_HashToCurve_Cashu_";

/// DHKE error
#[derive(Debug, Error)]
pub enum Error {
    /// No point on the curve was found within the counter range
    #[error("Hash to curve exhausted")]
    HashToCurveExhausted,
    /// Signature could not be verified against the mint key
    #[error("Message not verified")]
    MessageNotVerified,
    /// Promises, blinding factors and secrets of a round must line up
    #[error("Length mismatch: {promises} promises, {rs} rs, {secrets} secrets")]
    LengthMismatch {
        /// Blinded signatures returned by the mint
        promises: usize,
        /// Blinding factors held back by the wallet
        rs: usize,
        /// Secrets held back by the wallet
        secrets: usize,
    },
    /// Mint has no key for the signed amount
    #[error("Mint has no key for amount {0}")]
    UnknownAmount(crate::Amount),
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
}

/// Deterministically map a message to a public key point on the secp256k1
/// curve.
///
/// Domain separated and byte exact per NUT-00: all wallets derived from the
/// same seed must agree on every `Y`.
pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey, Error> {
    let msg_to_hash: Vec<u8> = [DOMAIN_SEPARATOR, message].concat();
    let msg_hash: [u8; 32] = Sha256Hash::hash(&msg_to_hash).to_byte_array();

    for counter in 0_u32..65536 {
        let mut bytes_to_hash: Vec<u8> = Vec::with_capacity(36);
        bytes_to_hash.extend_from_slice(&msg_hash);
        bytes_to_hash.extend_from_slice(&counter.to_le_bytes());
        let hash: [u8; 32] = Sha256Hash::hash(&bytes_to_hash).to_byte_array();

        if let Ok(pk) = XOnlyPublicKey::from_slice(&hash) {
            return Ok(NormalizedPublicKey::from_x_only_public_key(pk, Parity::Even).into());
        }
    }

    Err(Error::HashToCurveExhausted)
}

/// Hash an ordered sequence of points into the DLEQ challenge `e`
pub fn hash_e<I>(public_keys: I) -> [u8; 32]
where
    I: IntoIterator<Item = PublicKey>,
{
    let mut e = String::new();

    for public_key in public_keys {
        let uncompressed: [u8; 65] = public_key.to_uncompressed_bytes();
        e.push_str(&hex::encode(uncompressed));
    }

    Sha256Hash::hash(e.as_bytes()).to_byte_array()
}

/// Blind a message
///
/// `B_ = Y + rG`. Returns the blinded point and the blinding factor; pass a
/// factor to make the blinding deterministic (NUT-13 derivation does).
pub fn blind_message(
    secret: &[u8],
    blinding_factor: Option<SecretKey>,
) -> Result<(PublicKey, SecretKey), Error> {
    let y: PublicKey = hash_to_curve(secret)?;
    let r: SecretKey = blinding_factor.unwrap_or_else(SecretKey::generate);
    Ok((y.combine(&r.public_key())?.into(), r))
}

/// Unblind a signed message
///
/// `C = C_ - rA` where `A` is the mint's public key for the signed amount.
pub fn unblind_message(
    blinded_key: &PublicKey,
    r: &SecretKey,
    mint_pubkey: &PublicKey,
) -> Result<PublicKey, Error> {
    let r: Scalar = Scalar::from(r.deref().to_owned());

    // a = r * A
    let a: PublicKey = mint_pubkey.mul_tweak(&SECP256K1, &r)?.into();

    // C_ - a
    let a: PublicKey = a.negate(&SECP256K1).into();
    Ok(blinded_key.combine(&a)?.into())
}

/// Construct proofs from the blinded signatures of one round
///
/// Carries the blinding factor into the proof's DLEQ so a later holder can
/// verify the mint's proof of equality.
pub fn construct_proofs(
    promises: Vec<BlindSignature>,
    rs: Vec<SecretKey>,
    secrets: Vec<Secret>,
    keys: &Keys,
) -> Result<Proofs, Error> {
    if promises.len() != rs.len() || promises.len() != secrets.len() {
        return Err(Error::LengthMismatch {
            promises: promises.len(),
            rs: rs.len(),
            secrets: secrets.len(),
        });
    }

    let mut proofs = Vec::with_capacity(promises.len());
    for ((blinded_signature, r), secret) in promises.into_iter().zip(rs).zip(secrets) {
        let amount = blinded_signature.amount;
        let a: PublicKey = keys
            .amount_key(amount)
            .ok_or(Error::UnknownAmount(amount))?;

        let c: PublicKey = unblind_message(&blinded_signature.c, &r, &a)?;

        let dleq = blinded_signature
            .dleq
            .map(|d| ProofDleq::new(d.e, d.s, r));

        proofs.push(Proof {
            amount,
            keyset_id: blinded_signature.keyset_id,
            secret,
            c,
            witness: None,
            dleq,
        });
    }

    Ok(proofs)
}

/// Sign a blinded message
///
/// `C_ = k * B_` where `k` is the mint private key for the amount. The wallet
/// only uses this to stand up an in-process mint in tests.
#[inline]
pub fn sign_message(k: &SecretKey, blinded_message: &PublicKey) -> Result<PublicKey, Error> {
    let k: Scalar = Scalar::from(k.deref().to_owned());
    Ok(blinded_message.mul_tweak(&SECP256K1, &k)?.into())
}

/// Verify that an unblinded signature is `a * hash_to_curve(msg)`
pub fn verify_message(
    a: &SecretKey,
    unblinded_message: PublicKey,
    msg: &[u8],
) -> Result<(), Error> {
    let y: PublicKey = hash_to_curve(msg)?;

    let expected: PublicKey = y
        .mul_tweak(&SECP256K1, &Scalar::from(*a.deref()))?
        .into();

    if unblinded_message == expected {
        return Ok(());
    }

    Err(Error::MessageNotVerified)
}
