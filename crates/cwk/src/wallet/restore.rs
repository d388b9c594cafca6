//! Restore proofs and counters from the seed alone

use cashu_core::dhke::construct_proofs;
use cashu_core::nuts::{PreMintSecrets, Proofs, ProofsMethods, RestoreRequest, State};
use cashu_core::Amount;
use tracing::instrument;

use super::types::{ProofInfo, WalletId};
use crate::{Error, Wallet};

/// Outputs probed per `/restore` request
const DEFAULT_BATCH_SIZE: u32 = 25;
/// Consecutive empty batches before a keyset is considered exhausted
const DEFAULT_EMPTY_BATCHES: u32 = 3;

impl Wallet {
    /// Recover proofs and counters from the seed
    ///
    /// Walks every keyset of the mint across all units. Melt fee-reserve
    /// change can come back in a different unit than the operation that
    /// produced it; restoring a single unit would miss those counters and
    /// risk reuse on a future mint of the missed unit.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Amount, Error> {
        self.restore_with_options(DEFAULT_BATCH_SIZE, DEFAULT_EMPTY_BATCHES, true)
            .await
    }

    /// Restore with explicit batching and unit scope
    ///
    /// `all_units = false` restores only this wallet's unit. Overriding the
    /// default is a counter-safety trade-off, see [`Wallet::restore`].
    #[instrument(skip(self))]
    pub async fn restore_with_options(
        &self,
        batch_size: u32,
        empty_batches: u32,
        all_units: bool,
    ) -> Result<Amount, Error> {
        let xpriv = self.xpriv()?;

        let keysets = self.refresh_keysets().await?;

        let mut restored_value = Amount::ZERO;

        for keyset in keysets {
            if !all_units && keyset.unit != self.unit {
                continue;
            }

            let keys = self.load_keyset_keys(keyset.id).await?;

            // Rows land in the partition of the keyset's own unit, so a
            // wallet later opened for that unit sees its proofs and never
            // reuses its counters
            let partition = WalletId::new(&self.mint_url, &keyset.unit);

            let mut start_counter: u32 = 0;
            let mut next_counter: u32 = 0;
            let mut empty_batch_count: u32 = 0;

            while empty_batch_count < empty_batches {
                let premint_secrets = PreMintSecrets::restore_batch(
                    keyset.id,
                    xpriv,
                    start_counter,
                    start_counter + batch_size - 1,
                )?;

                tracing::debug!(
                    "Restoring counters {}..{} of keyset {}",
                    start_counter,
                    start_counter + batch_size,
                    keyset.id
                );

                let request = RestoreRequest {
                    outputs: premint_secrets.blinded_messages(),
                };

                let response = self.client().post_restore(request).await?;

                if response.signatures.is_empty() {
                    empty_batch_count += 1;
                    start_counter += batch_size;
                    continue;
                }

                // Pair returned signatures with our blinding data by B_
                let recovered: Vec<_> = premint_secrets
                    .secrets
                    .iter()
                    .filter(|premint| {
                        response
                            .outputs
                            .iter()
                            .any(|output| output.blinded_secret == premint.blinded_message.blinded_secret)
                    })
                    .collect();

                if recovered.len() != response.signatures.len() {
                    return Err(Error::Protocol {
                        code: None,
                        detail: "restore response does not match request outputs".to_string(),
                    });
                }

                let proofs = construct_proofs(
                    response.signatures,
                    recovered.iter().map(|premint| premint.r.clone()).collect(),
                    recovered.iter().map(|premint| premint.secret.clone()).collect(),
                    &keys,
                )?;

                tracing::debug!("Restored {} proofs for keyset {}", proofs.len(), keyset.id);

                next_counter = start_counter + proofs.len() as u32;

                // Recovered proofs the mint considers spent are dropped
                let states = self.check_proofs_spent(&proofs).await?;
                let unspent: Proofs = proofs
                    .into_iter()
                    .zip(states)
                    .filter_map(|(proof, state)| {
                        (state.state != State::Spent).then_some(proof)
                    })
                    .collect();

                restored_value = restored_value
                    .checked_add(unspent.total_amount()?)
                    .ok_or(cashu_core::amount::Error::AmountOverflow)?;

                let proof_infos = unspent
                    .into_iter()
                    .map(|proof| ProofInfo::new(proof, State::Unspent, keyset.unit.clone()))
                    .collect::<Result<Vec<ProofInfo>, _>>()?;

                self.localstore
                    .update_proofs(&partition, proof_infos, vec![])
                    .await?;

                empty_batch_count = 0;
                start_counter += batch_size;
            }

            // The next mint must start above everything the mint has seen
            self.localstore
                .set_keyset_counter(&partition, &keyset.id, next_counter)
                .await?;
        }

        self.mark_counters_restored();

        Ok(restored_value)
    }
}
