//! Input fee calculation
//!
//! <https://github.com/cashubtc/nuts/blob/main/02.md>

use std::collections::HashMap;

use cashu_core::nuts::Id;
use cashu_core::Amount;

use crate::Error;

/// Fee required to spend a set of proofs
///
/// Each input contributes its keyset's `input_fee_ppk`; the sum is rounded
/// up to the next whole unit: `ceil(sum_ppk / 1000)`.
pub fn calculate_fee(
    proofs_count: &HashMap<Id, u64>,
    keyset_fee: &HashMap<Id, u64>,
) -> Result<Amount, Error> {
    let mut sum_fee: u64 = 0;

    for (keyset_id, proof_count) in proofs_count {
        let keyset_fee_ppk = keyset_fee
            .get(keyset_id)
            .ok_or(Error::UnknownKeyset(*keyset_id))?;

        sum_fee += keyset_fee_ppk * proof_count;
    }

    let fee = sum_fee.div_ceil(1000);

    Ok(fee.into())
}
