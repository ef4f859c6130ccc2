// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

//! Conversions between tick indices, Q64.64 square-root prices and UI prices.
//!
//! The tick to price direction is exact fixed-point and equal to the pool
//! program: negative ticks multiply Q128.128 factors of `sqrt(1.0001^-2^i)`,
//! positive ticks multiply Q96.96 factors of `sqrt(1.0001^2^i)`, and both
//! floor into Q64.64. The UI price direction goes through `f64` and is then
//! corrected against the exact table, so a resolved tick always satisfies
//! `sqrt_price_at_tick(t) <= sqrt_price < sqrt_price_at_tick(t + 1)`.

use crate::domain::constants::{
    MAX_SQRT_PRICE_X64, MAX_TICK_INDEX, MIN_SQRT_PRICE_X64, MIN_TICK_INDEX, Q64_RESOLUTION,
};
use crate::domain::error::AppError;
use alloy_primitives::U256;

// sqrt(1.0001^-2^i) in Q128.128 for i = 0..=18.
const NEGATIVE_TICK_FACTORS: [u128; 19] = [
    0xfffcb933bd6fad37aa2d162d1a594001,
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x09aa508b5b7a84e1c677de54f3e99bc9,
    0x005d6af8dedb81196699c329225ee604,
    0x00002216e584f5fa1ea926041bedfe98,
];

// sqrt(1.0001^2^i) in Q96.96 for i = 0..=18.
const POSITIVE_TICK_FACTORS: [u128; 19] = [
    79232123823359799118286999567,
    79236085330515764027303304731,
    79244008939048815603706035061,
    79259858533276714757314932305,
    79291567232598584799939703904,
    79355022692464371645785046466,
    79482085999252804386437311141,
    79736823300114093921829183326,
    80248749790819932309965073892,
    81282483887344747381513967011,
    83390072131320151908154831281,
    87770609709833776024991924138,
    97234110755111693312479820773,
    119332217159966728226237229890,
    179736315981702064433883588727,
    407748233172238350107850275304,
    2098478828474011932436660412517,
    55581415166113811149459800483533,
    38992368544603139932233054999993551,
];

const Q64: f64 = 18_446_744_073_709_551_616.0;

/// Q64.64 square-root price at `tick`.
pub fn sqrt_price_at_tick(tick: i32) -> Result<u128, AppError> {
    if !(MIN_TICK_INDEX..=MAX_TICK_INDEX).contains(&tick) {
        return Err(AppError::math(format!(
            "tick {tick} outside [{MIN_TICK_INDEX}, {MAX_TICK_INDEX}]"
        )));
    }
    let abs_tick = tick.unsigned_abs();

    let sqrt_price = if tick >= 0 {
        let mut ratio = U256::from(1u8) << 96;
        for (bit, factor) in POSITIVE_TICK_FACTORS.iter().enumerate() {
            if abs_tick & (1u32 << bit) != 0 {
                ratio = (ratio * U256::from(*factor)) >> 96;
            }
        }
        ratio >> 32
    } else {
        let mut ratio = U256::from(1u8) << 128;
        for (bit, factor) in NEGATIVE_TICK_FACTORS.iter().enumerate() {
            if abs_tick & (1u32 << bit) != 0 {
                ratio = (ratio * U256::from(*factor)) >> 128;
            }
        }
        ratio >> Q64_RESOLUTION
    };

    u128::try_from(sqrt_price)
        .map_err(|_| AppError::math(format!("sqrt price at tick {tick} exceeds 128 bits")))
}

/// Greatest tick whose square-root price does not exceed `sqrt_price`.
pub fn tick_at_sqrt_price(sqrt_price: u128) -> Result<i32, AppError> {
    if !(MIN_SQRT_PRICE_X64..=MAX_SQRT_PRICE_X64).contains(&sqrt_price) {
        return Err(AppError::math(format!(
            "sqrt price {sqrt_price} outside [{MIN_SQRT_PRICE_X64}, {MAX_SQRT_PRICE_X64}]"
        )));
    }
    let price = (sqrt_price as f64 / Q64).powi(2);
    let estimate = (price.ln() / 1.0001f64.ln()).floor() as i64;
    let mut tick = estimate.clamp(i64::from(MIN_TICK_INDEX), i64::from(MAX_TICK_INDEX)) as i32;

    while tick > MIN_TICK_INDEX && sqrt_price_at_tick(tick)? > sqrt_price {
        tick -= 1;
    }
    while tick < MAX_TICK_INDEX && sqrt_price_at_tick(tick + 1)? <= sqrt_price {
        tick += 1;
    }
    Ok(tick)
}

/// Nearest multiple of `tick_spacing`, kept inside the usable bound range.
pub fn initializable_tick(tick: i32, tick_spacing: u16) -> i32 {
    let spacing = i32::from(tick_spacing.max(1));
    let floor = tick.div_euclid(spacing) * spacing;
    let snapped = if tick - floor >= spacing - (tick - floor) && tick != floor {
        floor + spacing
    } else {
        floor
    };
    let min = (MIN_TICK_INDEX / spacing) * spacing;
    let max = (MAX_TICK_INDEX / spacing) * spacing;
    snapped.clamp(min, max)
}

/// UI price of token A in units of token B, as a Q64.64 square-root price.
pub fn sqrt_price_from_ui_price(
    price: f64,
    decimals_a: u8,
    decimals_b: u8,
) -> Result<u128, AppError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::math(format!("price {price} must be positive")));
    }
    let scale = 10f64.powi(i32::from(decimals_b) - i32::from(decimals_a));
    let raw = (price * scale).sqrt() * Q64;
    if !raw.is_finite() || raw < MIN_SQRT_PRICE_X64 as f64 || raw > MAX_SQRT_PRICE_X64 as f64 {
        return Err(AppError::math(format!("price {price} outside the pool price range")));
    }
    Ok(raw as u128)
}

/// Inverse of [`sqrt_price_from_ui_price`]; display only.
pub fn ui_price_from_sqrt_price(sqrt_price: u128, decimals_a: u8, decimals_b: u8) -> f64 {
    let scale = 10f64.powi(i32::from(decimals_a) - i32::from(decimals_b));
    (sqrt_price as f64 / Q64).powi(2) * scale
}

/// Tick at `price`, snapped to the pool granularity.
pub fn ui_price_to_initializable_tick(
    price: f64,
    decimals_a: u8,
    decimals_b: u8,
    tick_spacing: u16,
) -> Result<i32, AppError> {
    let sqrt_price = sqrt_price_from_ui_price(price, decimals_a, decimals_b)?;
    Ok(initializable_tick(tick_at_sqrt_price(sqrt_price)?, tick_spacing))
}
