// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{BPS_DENOMINATOR, MAX_FEE_BASIS_POINTS};
use crate::domain::error::AppError;
use crate::domain::pool::TransferFee;

/// An amount before and after the mint's transfer fee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferFeeAmount {
    pub amount: u64,
    pub fee: u64,
}

fn fee_on(amount: u64, fee: &TransferFee) -> u64 {
    if fee.basis_points == 0 || amount == 0 {
        return 0;
    }
    let raw = (u128::from(amount) * u128::from(fee.basis_points)).div_ceil(u128::from(BPS_DENOMINATOR));
    u64::try_from(raw).unwrap_or(u64::MAX).min(fee.maximum_fee)
}

/// What arrives when `amount` is sent.
pub fn fee_excluded_amount(amount: u64, fee: Option<&TransferFee>) -> TransferFeeAmount {
    let Some(fee) = fee else {
        return TransferFeeAmount { amount, fee: 0 };
    };
    let charged = fee_on(amount, fee);
    TransferFeeAmount {
        amount: amount - charged,
        fee: charged,
    }
}

/// What must be sent for `amount` to arrive.
pub fn fee_included_amount(amount: u64, fee: Option<&TransferFee>) -> Result<TransferFeeAmount, AppError> {
    let Some(fee) = fee else {
        return Ok(TransferFeeAmount { amount, fee: 0 });
    };
    if amount == 0 || fee.basis_points == 0 {
        return Ok(TransferFeeAmount { amount, fee: 0 });
    }

    let charged = if fee.basis_points >= MAX_FEE_BASIS_POINTS {
        fee.maximum_fee
    } else {
        let bps = u128::from(fee.basis_points);
        let denominator = u128::from(BPS_DENOMINATOR);
        // gross = amount * D / (D - bps), rounded up
        let gross = (u128::from(amount) * denominator).div_ceil(denominator - bps);
        let raw = gross - u128::from(amount);
        if raw >= u128::from(fee.maximum_fee) {
            fee.maximum_fee
        } else {
            // rounding can leave the recipient one unit short
            let mut candidate = raw as u64;
            while candidate < fee.maximum_fee && fee_on(amount.saturating_add(candidate), fee) > candidate {
                candidate += 1;
            }
            candidate
        }
    };

    let total = amount
        .checked_add(charged)
        .ok_or_else(|| AppError::math("fee-included amount exceeds u64"))?;
    Ok(TransferFeeAmount {
        amount: total,
        fee: charged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee(bps: u16, max: u64) -> TransferFee {
        TransferFee {
            basis_points: bps,
            maximum_fee: max,
        }
    }

    #[test]
    fn plain_mint_is_untouched() {
        assert_eq!(fee_excluded_amount(1_000, None).amount, 1_000);
        assert_eq!(fee_included_amount(1_000, None).unwrap().amount, 1_000);
    }

    #[test]
    fn excluded_rounds_fee_up_and_caps() {
        let f = fee(100, 5);
        assert_eq!(fee_excluded_amount(101, Some(&f)), TransferFeeAmount { amount: 99, fee: 2 });
        assert_eq!(fee_excluded_amount(1_000_000, Some(&f)).fee, 5);
    }

    #[test]
    fn included_amount_delivers_the_request() {
        let f = fee(250, u64::MAX);
        for amount in [1u64, 7, 999, 123_456, 10_000_000] {
            let gross = fee_included_amount(amount, Some(&f)).unwrap();
            let net = fee_excluded_amount(gross.amount, Some(&f));
            assert!(net.amount >= amount, "amount {amount}");
            assert!(net.amount <= amount + 1, "amount {amount}");
        }
    }

    #[test]
    fn included_amount_at_cap_and_full_fee() {
        assert_eq!(fee_included_amount(1_000_000, Some(&fee(100, 50))).unwrap().amount, 1_000_050);
        assert_eq!(fee_included_amount(10, Some(&fee(10_000, 3))).unwrap().amount, 13);
        assert!(fee_included_amount(u64::MAX, Some(&fee(100, 10))).is_err());
    }
}
