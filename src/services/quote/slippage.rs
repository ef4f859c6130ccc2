// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::BPS_DENOMINATOR;
use crate::domain::error::AppError;

/// Tolerated deviation between an estimate and its worst case, as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slippage {
    numerator: u64,
    denominator: u64,
}

impl Slippage {
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, AppError> {
        if denominator == 0 || numerator > denominator {
            return Err(AppError::validation(
                "slippage",
                format!("{numerator}/{denominator} is not a fraction in [0, 1]"),
            ));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn from_bps(bps: u16) -> Result<Self, AppError> {
        Self::new(u64::from(bps), BPS_DENOMINATOR)
    }

    /// Smallest acceptable amount when receiving.
    pub fn floor(&self, amount: u64) -> u64 {
        let kept = u128::from(amount) * u128::from(self.denominator - self.numerator);
        (kept / u128::from(self.denominator)) as u64
    }

    /// Largest acceptable amount when paying; saturates at `u64::MAX`.
    pub fn ceil(&self, amount: u64) -> u64 {
        // Past u128 the quotient is already beyond u64::MAX.
        let factor = u128::from(self.denominator) + u128::from(self.numerator);
        u128::from(amount)
            .checked_mul(factor)
            .and_then(|grown| u64::try_from(grown.div_ceil(u128::from(self.denominator))).ok())
            .unwrap_or(u64::MAX)
    }
}

impl Default for Slippage {
    fn default() -> Self {
        Self {
            numerator: 1,
            denominator: 100,
        }
    }
}
