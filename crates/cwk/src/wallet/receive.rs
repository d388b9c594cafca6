//! Receiving tokens

use std::str::FromStr;

use cashu_core::nuts::{ProofsMethods, Token};
use cashu_core::Amount;
use tracing::instrument;

use crate::{Error, Wallet};

impl Wallet {
    /// Redeem a token by swapping its proofs for fresh ones
    ///
    /// Fails with [`Error::WrongMint`] before any counter is advanced or
    /// proof written when the token was issued by a different mint. After
    /// the swap the sender can no longer double-spend the token.
    #[instrument(skip_all)]
    pub async fn receive(&self, encoded_token: &str) -> Result<Amount, Error> {
        let token = Token::from_str(encoded_token)?;

        let token_mint = token.mint_url()?;
        if token_mint != self.mint_url {
            return Err(Error::WrongMint {
                expected: self.mint_url.clone(),
                got: token_mint,
            });
        }

        if let Some(unit) = token.unit() {
            if unit != self.unit {
                return Err(Error::UnsupportedUnit);
            }
        }

        let proofs = token.proofs();
        if proofs.is_empty() {
            return Err(cashu_core::nuts::nut00::Error::ProofsRequired.into());
        }

        // Token keysets may predate this wallet; make fee info available
        self.refresh_keysets().await?;

        // Verify any DLEQ the sender included before going online
        for proof in &proofs {
            if proof.dleq.is_some() {
                let keys = self.load_keyset_keys(proof.keyset_id).await?;
                let key = keys.amount_key(proof.amount).ok_or(Error::UnknownAmount {
                    keyset_id: proof.keyset_id,
                    amount: proof.amount,
                })?;
                proof
                    .verify_dleq(key)
                    .map_err(|_| Error::CouldNotVerifyDleq)?;
            }
        }

        let amount = proofs.total_amount()?;
        let fee = self.get_proofs_fee(&proofs).await?;

        let receive_amount = amount.checked_sub(fee).filter(|a| *a > Amount::ZERO).ok_or(
            Error::InsufficientFunds {
                have: amount,
                need: fee + Amount::ONE,
            },
        )?;

        let fresh = self.swap(proofs, receive_amount.split()).await?;

        Ok(fresh.total_amount()?)
    }

    /// Redeem a raw binary (`crawB`) token
    #[instrument(skip_all)]
    pub async fn receive_raw(&self, binary_token: &Vec<u8>) -> Result<Amount, Error> {
        let token = Token::try_from(binary_token)?;
        self.receive(&token.to_string()).await
    }
}
