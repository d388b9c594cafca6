//! Minting: exchange a paid Lightning invoice for proofs

use cashu_core::amount::SplitTarget;
use cashu_core::dhke::construct_proofs;
use cashu_core::nuts::{
    nut12, MintBolt11Request, MintQuoteBolt11Request, MintQuoteBolt11Response, PreMintSecrets,
    Proofs, State,
};
use cashu_core::util::unix_time;
use cashu_core::Amount;
use tracing::instrument;

use super::types::{MintQuote, ProofInfo};
use crate::{Error, Wallet};

impl Wallet {
    /// Request a quote to mint `amount`
    ///
    /// Thin pass-through: the quote is stored for later lookup but no
    /// wallet state is otherwise touched.
    #[instrument(skip(self))]
    pub async fn mint_quote(
        &self,
        amount: Amount,
        description: Option<String>,
    ) -> Result<MintQuote, Error> {
        let request = MintQuoteBolt11Request {
            amount,
            unit: self.unit.clone(),
            description,
        };

        let quote_res = self.client().post_mint_quote(request).await?;

        let quote = MintQuote {
            id: quote_res.quote,
            amount,
            unit: self.unit.clone(),
            request: quote_res.request,
            state: quote_res.state,
            expiry: quote_res.expiry.unwrap_or(0),
        };

        self.localstore
            .add_mint_quote(&self.wallet_id, quote.clone())
            .await?;

        Ok(quote)
    }

    /// Check the state of a mint quote with the mint
    #[instrument(skip(self))]
    pub async fn mint_quote_state(
        &self,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let response = self.client().get_mint_quote_status(quote_id).await?;

        match self
            .localstore
            .get_mint_quote(&self.wallet_id, quote_id)
            .await?
        {
            Some(mut quote) => {
                quote.state = response.state;
                self.localstore
                    .add_mint_quote(&self.wallet_id, quote)
                    .await?;
            }
            None => {
                tracing::info!("Mint quote {} unknown to this wallet", quote_id);
            }
        }

        Ok(response)
    }

    /// Mint proofs for a paid quote
    ///
    /// Counters are advanced and committed before the mint is contacted:
    /// if the call fails or the response is lost, those counter values are
    /// burned and a retry consumes fresh ones. The persisted proofs carry
    /// the quote id, so a caller that crashed between persist and return
    /// finds them again with [`Wallet::proofs_by_mint_quote`].
    #[instrument(skip(self))]
    pub async fn mint(
        &self,
        quote_id: &str,
        amount_split_target: SplitTarget,
    ) -> Result<Proofs, Error> {
        let xpriv = self.ensure_safe_state()?;

        let quote = self
            .localstore
            .get_mint_quote(&self.wallet_id, quote_id)
            .await?
            .ok_or_else(|| Error::UnknownQuote(quote_id.to_string()))?;

        if quote.expiry != 0 && quote.expiry < unix_time() {
            return Err(Error::ExpiredQuote(quote.expiry));
        }

        let active_keyset = self.get_active_keyset().await?;
        let keys = self.load_keyset_keys(active_keyset.id).await?;

        let output_count = quote.amount.split_targeted(&amount_split_target)?.len() as u32;

        // Committed before the network call; burned on failure
        let next_counter = self
            .localstore
            .increment_keyset_counter(&self.wallet_id, &active_keyset.id, output_count)
            .await?;
        let start_counter = next_counter - output_count;

        tracing::debug!(
            "Minting quote {} with counters {}..{} of keyset {}",
            quote_id,
            start_counter,
            next_counter,
            active_keyset.id
        );

        let premint_secrets = PreMintSecrets::from_xpriv(
            active_keyset.id,
            start_counter,
            xpriv,
            quote.amount,
            &amount_split_target,
        )?;

        let request = MintBolt11Request {
            quote: quote_id.to_string(),
            outputs: premint_secrets.blinded_messages(),
        };

        let mint_res = self.client().post_mint(request).await?;

        // A mint that supplies DLEQs must supply valid ones
        for (sig, premint) in mint_res.signatures.iter().zip(&premint_secrets.secrets) {
            let key = keys
                .amount_key(sig.amount)
                .ok_or(Error::UnknownAmount {
                    keyset_id: sig.keyset_id,
                    amount: sig.amount,
                })?;
            match sig.verify_dleq(key, premint.blinded_message.blinded_secret) {
                Ok(()) | Err(nut12::Error::MissingDleqProof) => (),
                Err(_) => return Err(Error::CouldNotVerifyDleq),
            }
        }

        let proofs = construct_proofs(
            mint_res.signatures,
            premint_secrets.rs(),
            premint_secrets.secrets(),
            &keys,
        )?;

        let proof_infos = proofs
            .iter()
            .map(|proof| {
                ProofInfo::new_for_quote(
                    proof.clone(),
                    State::Unspent,
                    quote.unit.clone(),
                    Some(quote_id.to_string()),
                )
            })
            .collect::<Result<Vec<ProofInfo>, _>>()?;

        self.localstore
            .update_proofs(&self.wallet_id, proof_infos, vec![])
            .await?;

        self.localstore
            .remove_mint_quote(&self.wallet_id, quote_id)
            .await?;

        Ok(proofs)
    }

    /// Proofs persisted under a mint quote
    ///
    /// A non-empty result means the quote was already redeemed, even if the
    /// caller never saw [`Wallet::mint`] return.
    #[instrument(skip(self))]
    pub async fn proofs_by_mint_quote(&self, quote_id: &str) -> Result<Proofs, Error> {
        Ok(self
            .localstore
            .get_proofs_by_quote(&self.wallet_id, quote_id)
            .await?
            .into_iter()
            .map(|info| info.proof)
            .collect())
    }
}
