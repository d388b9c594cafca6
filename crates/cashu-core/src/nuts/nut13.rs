//! NUT-13: Deterministic secrets
//!
//! Secrets and blinding factors are derived from the wallet seed along
//! `m/129372'/0'/{keyset}'/{counter}'/{0,1}`, so a wallet can be rebuilt
//! from its mnemonic alone. A counter value must never be used twice for
//! the same keyset.
//!
//! <https://github.com/cashubtc/nuts/blob/main/13.md>

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use thiserror::Error;

use super::nut00::{BlindedMessage, PreMint, PreMintSecrets};
use super::nut01::SecretKey;
use super::nut02::Id;
use crate::amount::SplitTarget;
use crate::dhke::blind_message;
use crate::secret::Secret;
use crate::util::hex;
use crate::{Amount, SECP256K1};

/// NUT-13 error
#[derive(Debug, Error)]
pub enum Error {
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] crate::dhke::Error),
    /// Amount error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// NUT-00 error
    #[error(transparent)]
    Nut00(#[from] super::nut00::Error),
    /// Secret error
    #[error(transparent)]
    Secret(#[from] crate::secret::Error),
    /// Bip32 error
    #[error(transparent)]
    Bip32(#[from] bitcoin::bip32::Error),
}

impl Secret {
    /// Derive the secret for `(keyset, counter)` from an xpriv
    ///
    /// The proof secret is the hex encoding of the derived key, not its raw
    /// bytes; the mint sees the hex ASCII bytes.
    pub fn from_xpriv(xpriv: Xpriv, keyset_id: Id, counter: u32) -> Result<Self, Error> {
        let path = derive_path_from_keyset_id(keyset_id)?
            .child(ChildNumber::from_hardened_idx(counter)?)
            .child(ChildNumber::from_normal_idx(0)?);
        let derived_xpriv = xpriv.derive_priv(&SECP256K1, &path)?;

        Ok(Self::new(hex::encode(
            derived_xpriv.private_key.secret_bytes(),
        ))?)
    }
}

impl SecretKey {
    /// Derive the blinding factor for `(keyset, counter)` from an xpriv
    pub fn from_xpriv(xpriv: Xpriv, keyset_id: Id, counter: u32) -> Result<Self, Error> {
        let path = derive_path_from_keyset_id(keyset_id)?
            .child(ChildNumber::from_hardened_idx(counter)?)
            .child(ChildNumber::from_normal_idx(1)?);
        let derived_xpriv = xpriv.derive_priv(&SECP256K1, &path)?;

        Ok(Self::from(derived_xpriv.private_key))
    }
}

impl PreMintSecrets {
    /// Blinded messages with deterministic secrets and blinding factors,
    /// one per part of the amount split, consuming counters from `counter`
    pub fn from_xpriv(
        keyset_id: Id,
        counter: u32,
        xpriv: Xpriv,
        amount: Amount,
        amount_split_target: &SplitTarget,
    ) -> Result<Self, Error> {
        let mut pre_mint_secrets = PreMintSecrets::new(keyset_id);

        let mut counter = counter;

        for amount in amount.split_targeted(amount_split_target)? {
            let secret = Secret::from_xpriv(xpriv, keyset_id, counter)?;
            let blinding_factor = SecretKey::from_xpriv(xpriv, keyset_id, counter)?;

            let (blinded, r) = blind_message(secret.as_bytes(), Some(blinding_factor))?;

            pre_mint_secrets.secrets.push(PreMint {
                blinded_message: BlindedMessage::new(amount, keyset_id, blinded),
                secret,
                r,
                amount,
            });
            counter += 1;
        }

        Ok(pre_mint_secrets)
    }

    /// Blank outputs for melt change
    ///
    /// The mint decides the change amounts when the payment settles, so the
    /// outputs carry amount zero and their count bounds what change can be
    /// expressed: `max(ceil(log2(amount)), 1)`.
    pub fn from_xpriv_blank(
        keyset_id: Id,
        counter: u32,
        xpriv: Xpriv,
        amount: Amount,
    ) -> Result<Self, Error> {
        if amount <= Amount::ZERO {
            return Ok(PreMintSecrets::new(keyset_id));
        }
        let count = ((u64::from(amount) as f64).log2().ceil() as u64).max(1);

        let mut pre_mint_secrets = PreMintSecrets::new(keyset_id);

        let mut counter = counter;

        for _ in 0..count {
            let secret = Secret::from_xpriv(xpriv, keyset_id, counter)?;
            let blinding_factor = SecretKey::from_xpriv(xpriv, keyset_id, counter)?;

            let (blinded, r) = blind_message(secret.as_bytes(), Some(blinding_factor))?;

            pre_mint_secrets.secrets.push(PreMint {
                blinded_message: BlindedMessage::new(Amount::ZERO, keyset_id, blinded),
                secret,
                r,
                amount: Amount::ZERO,
            });
            counter += 1;
        }

        Ok(pre_mint_secrets)
    }

    /// Outputs for counters `start_count..=end_count`, used to probe the
    /// mint during restore
    ///
    /// The amount is a placeholder; `/restore` returns each signature with
    /// the amount that was originally signed.
    pub fn restore_batch(
        keyset_id: Id,
        xpriv: Xpriv,
        start_count: u32,
        end_count: u32,
    ) -> Result<Self, Error> {
        let mut pre_mint_secrets = PreMintSecrets::new(keyset_id);

        for i in start_count..=end_count {
            let secret = Secret::from_xpriv(xpriv, keyset_id, i)?;
            let blinding_factor = SecretKey::from_xpriv(xpriv, keyset_id, i)?;

            let (blinded, r) = blind_message(secret.as_bytes(), Some(blinding_factor))?;

            pre_mint_secrets.secrets.push(PreMint {
                blinded_message: BlindedMessage::new(Amount::ONE, keyset_id, blinded),
                secret,
                r,
                amount: Amount::ONE,
            });
        }

        Ok(pre_mint_secrets)
    }
}

fn derive_path_from_keyset_id(id: Id) -> Result<DerivationPath, Error> {
    let index = u32::from(id);

    Ok(DerivationPath::from(vec![
        ChildNumber::from_hardened_idx(129372)?,
        ChildNumber::from_hardened_idx(0)?,
        ChildNumber::from_hardened_idx(index)?,
    ]))
}
