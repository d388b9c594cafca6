//! Swapping: replace proofs with a fresh set of equal value minus fee

use cashu_core::amount::SplitTarget;
use cashu_core::dhke::construct_proofs;
use cashu_core::nuts::{PreMintSecrets, Proofs, ProofsMethods, State, SwapRequest};
use cashu_core::Amount;
use tracing::instrument;

use super::types::ProofInfo;
use crate::{Error, Wallet};

impl Wallet {
    /// Swap `inputs` for fresh proofs of the given amounts
    ///
    /// Requires `sum(inputs) - fee(inputs) == sum(target_amounts)`.
    /// Inputs go PENDING before the mint is contacted; on success the
    /// spent-marking of inputs and the insert of outputs commit as one
    /// transaction. On failure inputs stay PENDING for
    /// [`Wallet::reclaim_unspent`], never silently back to UNSPENT.
    #[instrument(skip(self, inputs))]
    pub async fn swap(
        &self,
        inputs: Proofs,
        target_amounts: Vec<Amount>,
    ) -> Result<Proofs, Error> {
        let xpriv = self.ensure_safe_state()?;

        let inputs_total = inputs.total_amount()?;
        let fee = self.get_proofs_fee(&inputs).await?;
        let targets_total = Amount::try_sum(target_amounts.iter().copied())?;

        if inputs_total
            .checked_sub(fee)
            .map(|net| net != targets_total)
            .unwrap_or(true)
        {
            return Err(Error::AmountMismatch);
        }

        let active_keyset = self.get_active_keyset().await?;
        let keys = self.load_keyset_keys(active_keyset.id).await?;

        let output_count = target_amounts.len() as u32;
        let next_counter = self
            .localstore
            .increment_keyset_counter(&self.wallet_id, &active_keyset.id, output_count)
            .await?;
        let start_counter = next_counter - output_count;

        let premint_secrets = PreMintSecrets::from_xpriv(
            active_keyset.id,
            start_counter,
            xpriv,
            targets_total,
            &SplitTarget::Values(target_amounts),
        )?;

        let input_ys = inputs.ys()?;
        self.localstore
            .update_proofs_state(&self.wallet_id, input_ys.clone(), State::Pending)
            .await?;

        let request = SwapRequest::new(inputs, premint_secrets.blinded_messages());

        let response = self.client().post_swap(request).await?;

        let proofs = construct_proofs(
            response.signatures,
            premint_secrets.rs(),
            premint_secrets.secrets(),
            &keys,
        )?;

        let proof_infos = proofs
            .iter()
            .map(|proof| ProofInfo::new(proof.clone(), State::Unspent, self.unit.clone()))
            .collect::<Result<Vec<ProofInfo>, _>>()?;

        // One transaction: outputs in, inputs spent
        self.localstore
            .update_proofs(&self.wallet_id, proof_infos, input_ys)
            .await?;

        Ok(proofs)
    }

    /// Split `inputs` into proofs to send and proofs to keep
    ///
    /// Send denominations are the powers-of-two decomposition of
    /// `send_amount`; the rest, minus fee, is kept. Returns
    /// `(keep, send)`.
    #[instrument(skip(self, inputs))]
    pub async fn split(
        &self,
        inputs: Proofs,
        send_amount: Amount,
    ) -> Result<(Proofs, Proofs), Error> {
        let inputs_total = inputs.total_amount()?;
        let fee = self.get_proofs_fee(&inputs).await?;

        let available = inputs_total.checked_sub(fee).unwrap_or(Amount::ZERO);
        if send_amount > available {
            return Err(Error::InsufficientFunds {
                have: available,
                need: send_amount,
            });
        }

        let send_amounts = send_amount.split();
        let keep_amounts = (available - send_amount).split();

        let mut targets = send_amounts.clone();
        targets.extend(keep_amounts.iter().copied());

        let outputs = self.swap(inputs, targets).await?;

        // Greedy match: consume one output per send denomination
        let mut send_remaining = send_amounts;
        let mut send = Proofs::new();
        let mut keep = Proofs::new();

        for proof in outputs {
            if let Some(idx) = send_remaining.iter().position(|&a| a == proof.amount) {
                send_remaining.swap_remove(idx);
                send.push(proof);
            } else {
                keep.push(proof);
            }
        }

        debug_assert!(send_remaining.is_empty());

        Ok((keep, send))
    }
}
