//! Proof queries, selection and state synchronization

use cashu_core::nuts::{CheckStateRequest, ProofState, Proofs, ProofsMethods, PublicKey, State};
use cashu_core::Amount;
use tracing::instrument;

use crate::{Error, Wallet};

impl Wallet {
    /// Unspent proofs of this wallet
    #[instrument(skip(self))]
    pub async fn get_unspent_proofs(&self) -> Result<Proofs, Error> {
        Ok(self
            .localstore
            .get_proofs(&self.wallet_id, Some(vec![State::Unspent]))
            .await?
            .into_iter()
            .map(|info| info.proof)
            .collect())
    }

    /// Pending proofs of this wallet
    #[instrument(skip(self))]
    pub async fn get_pending_proofs(&self) -> Result<Proofs, Error> {
        Ok(self
            .localstore
            .get_proofs(&self.wallet_id, Some(vec![State::Pending]))
            .await?
            .into_iter()
            .map(|info| info.proof)
            .collect())
    }

    /// Ask the mint for the state of each proof
    ///
    /// States come back in the order of `proofs`.
    #[instrument(skip(self, proofs))]
    pub async fn check_proofs_spent(&self, proofs: &Proofs) -> Result<Vec<ProofState>, Error> {
        let request = CheckStateRequest { ys: proofs.ys()? };
        Ok(self.client().post_check_state(request).await?.states)
    }

    /// Write back SPENT for every stored proof the mint considers spent
    ///
    /// Returns the value that moved to SPENT. Run this after a crash or a
    /// failed melt to resolve pending proofs.
    #[instrument(skip(self))]
    pub async fn sync_proof_states(&self) -> Result<Amount, Error> {
        let stored = self
            .localstore
            .get_proofs(
                &self.wallet_id,
                Some(vec![State::Unspent, State::Pending]),
            )
            .await?;

        if stored.is_empty() {
            return Ok(Amount::ZERO);
        }

        let proofs: Proofs = stored.iter().map(|info| info.proof.clone()).collect();
        let states = self.check_proofs_spent(&proofs).await?;

        let spent_ys: Vec<PublicKey> = states
            .into_iter()
            .filter(|state| state.state == State::Spent)
            .map(|state| state.y)
            .collect();

        let spent_total = Amount::try_sum(
            stored
                .iter()
                .filter(|info| spent_ys.contains(&info.y))
                .map(|info| info.proof.amount),
        )?;

        if !spent_ys.is_empty() {
            self.localstore
                .update_proofs_state(&self.wallet_id, spent_ys, State::Spent)
                .await?;
        }

        Ok(spent_total)
    }

    /// Swap proofs the mint still considers unspent into fresh ones
    ///
    /// For proofs handed to an outside party whose redemption fell
    /// through, and for inputs of a failed melt.
    #[instrument(skip(self, proofs))]
    pub async fn reclaim_unspent(&self, proofs: Proofs) -> Result<(), Error> {
        let states = self.check_proofs_spent(&proofs).await?;

        let unspent: Proofs = proofs
            .into_iter()
            .zip(states)
            .filter_map(|(proof, state)| (state.state == State::Unspent).then_some(proof))
            .collect();

        if unspent.is_empty() {
            return Ok(());
        }

        let total = unspent.total_amount()?;
        let fee = self.get_proofs_fee(&unspent).await?;
        let target = total
            .checked_sub(fee)
            .ok_or(Error::InsufficientFunds {
                have: total,
                need: fee,
            })?;

        self.swap(unspent, target.split()).await?;

        Ok(())
    }

    /// Select proofs covering at least `target`, greedy largest first
    pub fn select_proofs(target: Amount, proofs: Proofs) -> Result<Proofs, Error> {
        let mut sorted = proofs;
        sorted.sort_by(|a, b| b.amount.cmp(&a.amount));

        let mut selected = Proofs::new();
        let mut selected_total = Amount::ZERO;

        for proof in sorted {
            if selected_total >= target {
                break;
            }
            selected_total = selected_total
                .checked_add(proof.amount)
                .ok_or(cashu_core::amount::Error::AmountOverflow)?;
            selected.push(proof);
        }

        if selected_total < target {
            return Err(Error::InsufficientFunds {
                have: selected_total,
                need: target,
            });
        }

        Ok(selected)
    }
}
