// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::Q64_RESOLUTION;
use crate::domain::error::AppError;
use alloy_primitives::U256;

/// Token amounts backing a liquidity figure at a given price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenAmounts {
    pub a: u64,
    pub b: u64,
}

fn ordered(p0: u128, p1: u128) -> (u128, u128) {
    if p0 <= p1 { (p0, p1) } else { (p1, p0) }
}

fn to_u64(value: U256, what: &str) -> Result<u64, AppError> {
    u64::try_from(value).map_err(|_| AppError::math(format!("{what} exceeds u64")))
}

fn to_u128(value: U256, what: &str) -> Result<u128, AppError> {
    u128::try_from(value).map_err(|_| AppError::math(format!("{what} exceeds u128")))
}

fn div_round(numerator: U256, denominator: U256, round_up: bool) -> U256 {
    let quotient = numerator / denominator;
    if round_up && !(numerator % denominator).is_zero() {
        quotient + U256::from(1u8)
    } else {
        quotient
    }
}

/// Token A owed for `liquidity` between two square-root prices.
pub fn amount_a_delta(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u64, AppError> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if liquidity == 0 || lower == upper {
        return Ok(0);
    }
    if lower == 0 {
        return Err(AppError::math("zero square-root price"));
    }
    let product = U256::from(liquidity) * U256::from(upper - lower);
    if product.leading_zeros() < Q64_RESOLUTION {
        return Err(AppError::math("token A numerator overflow"));
    }
    let numerator = product << Q64_RESOLUTION;
    let denominator = U256::from(upper) * U256::from(lower);
    to_u64(div_round(numerator, denominator, round_up), "token A amount")
}

/// Token B owed for `liquidity` between two square-root prices.
pub fn amount_b_delta(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u64, AppError> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if liquidity == 0 || lower == upper {
        return Ok(0);
    }
    let product = U256::from(liquidity) * U256::from(upper - lower);
    let denominator = U256::from(1u8) << Q64_RESOLUTION;
    to_u64(div_round(product, denominator, round_up), "token B amount")
}

/// Amounts for `liquidity` in `[sqrt_lower, sqrt_upper)` at `sqrt_current`.
///
/// Below the range everything is held as A, above it as B; inside, the split
/// follows the current price.
pub fn amounts_for_liquidity(
    sqrt_current: u128,
    sqrt_lower: u128,
    sqrt_upper: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<TokenAmounts, AppError> {
    if sqrt_current < sqrt_lower {
        Ok(TokenAmounts {
            a: amount_a_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?,
            b: 0,
        })
    } else if sqrt_current < sqrt_upper {
        Ok(TokenAmounts {
            a: amount_a_delta(sqrt_current, sqrt_upper, liquidity, round_up)?,
            b: amount_b_delta(sqrt_lower, sqrt_current, liquidity, round_up)?,
        })
    } else {
        Ok(TokenAmounts {
            a: 0,
            b: amount_b_delta(sqrt_lower, sqrt_upper, liquidity, round_up)?,
        })
    }
}

/// Largest liquidity that `amount` of token A fully backs between two prices.
pub fn liquidity_from_a(amount: u64, sqrt_price_0: u128, sqrt_price_1: u128) -> Result<u128, AppError> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if lower == upper {
        return Err(AppError::math("empty price range"));
    }
    let numerator = U256::from(amount)
        .checked_mul(U256::from(upper))
        .and_then(|v| v.checked_mul(U256::from(lower)))
        .ok_or_else(|| AppError::math("liquidity from A overflow"))?;
    let denominator = U256::from(upper - lower) << Q64_RESOLUTION;
    to_u128(numerator / denominator, "liquidity")
}

/// Largest liquidity that `amount` of token B fully backs between two prices.
pub fn liquidity_from_b(amount: u64, sqrt_price_0: u128, sqrt_price_1: u128) -> Result<u128, AppError> {
    let (lower, upper) = ordered(sqrt_price_0, sqrt_price_1);
    if lower == upper {
        return Err(AppError::math("empty price range"));
    }
    let numerator = U256::from(amount) << Q64_RESOLUTION;
    to_u128(numerator / U256::from(upper - lower), "liquidity")
}

/// Liquidity for a single-sided token amount, as used by the price/amount
/// target table. The amount is token B when the range sits entirely below
/// the current price and token A otherwise.
pub fn liquidity_for_single_amount(
    amount: u64,
    sqrt_current: u128,
    sqrt_lower: u128,
    sqrt_upper: u128,
) -> Result<u128, AppError> {
    if sqrt_current >= sqrt_upper {
        liquidity_from_b(amount, sqrt_lower, sqrt_upper)
    } else {
        let from = sqrt_current.max(sqrt_lower);
        liquidity_from_a(amount, from, sqrt_upper)
    }
}
