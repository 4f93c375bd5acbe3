//! Calculate fees
//!
//! <https://github.com/cashubtc/nuts/blob/main/02.md>

use std::collections::HashMap;

use crate::nuts::KeysetId;
use crate::{Amount, Error};

/// Fee required for a set of proof inputs
///
/// `proofs_count` is proofs-per-keyset, `keyset_fee` the `input_fee_ppk` of
/// each keyset. The sum of per-proof ppk fees is rounded up to the next
/// whole unit.
pub fn calculate_fee(
    proofs_count: &HashMap<KeysetId, u64>,
    keyset_fee: &HashMap<KeysetId, u64>,
) -> Result<Amount, Error> {
    let mut sum_fee_ppk: u64 = 0;

    for (keyset_id, count) in proofs_count {
        let keyset_fee_ppk = keyset_fee.get(keyset_id).ok_or(Error::UnknownKeySet)?;

        sum_fee_ppk = sum_fee_ppk
            .checked_add(keyset_fee_ppk.checked_mul(*count).ok_or(
                crate::amount::Error::AmountOverflow,
            )?)
            .ok_or(crate::amount::Error::AmountOverflow)?;
    }

    let fee = sum_fee_ppk.div_ceil(1000);

    Ok(Amount::from(fee))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_calculate_fee() {
        let keyset_id = KeysetId::from_str("009a1f293253e41e").unwrap();

        let fee_ppk: HashMap<KeysetId, u64> = [(keyset_id.clone(), 100)].into_iter().collect();

        // 3 proofs at 100 ppk -> 300 ppk -> 1
        let count: HashMap<KeysetId, u64> = [(keyset_id.clone(), 3)].into_iter().collect();
        assert_eq!(
            calculate_fee(&count, &fee_ppk).unwrap(),
            Amount::from(1)
        );

        // 10 proofs at 100 ppk -> exactly 1
        let count: HashMap<KeysetId, u64> = [(keyset_id.clone(), 10)].into_iter().collect();
        assert_eq!(
            calculate_fee(&count, &fee_ppk).unwrap(),
            Amount::from(1)
        );

        // 11 proofs at 100 ppk -> 1100 ppk -> 2
        let count: HashMap<KeysetId, u64> = [(keyset_id.clone(), 11)].into_iter().collect();
        assert_eq!(
            calculate_fee(&count, &fee_ppk).unwrap(),
            Amount::from(2)
        );

        // zero-fee keyset
        let fee_ppk: HashMap<KeysetId, u64> = [(keyset_id.clone(), 0)].into_iter().collect();
        let count: HashMap<KeysetId, u64> = [(keyset_id, 100)].into_iter().collect();
        assert_eq!(calculate_fee(&count, &fee_ppk).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_calculate_fee_unknown_keyset() {
        let keyset_id = KeysetId::from_str("009a1f293253e41e").unwrap();
        let count: HashMap<KeysetId, u64> = [(keyset_id, 1)].into_iter().collect();
        assert!(calculate_fee(&count, &HashMap::new()).is_err());
    }
}
