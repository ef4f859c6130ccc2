// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

//! Owed trading fees and rewards for a position, recomputed from the pool's
//! global accumulators. Accumulators are modular: every subtraction wraps.

use crate::domain::bundle::CurrentSlot;
use crate::domain::constants::{NUM_REWARDS, Q64_RESOLUTION};
use crate::domain::error::AppError;
use crate::domain::pool::PoolState;
use alloy_primitives::U256;

/// Growth accrued strictly between two ticks.
pub fn growth_inside(
    tick_current: i32,
    tick_lower: i32,
    tick_upper: i32,
    growth_global: u128,
    lower_outside: u128,
    upper_outside: u128,
) -> u128 {
    let below = if tick_current >= tick_lower {
        lower_outside
    } else {
        growth_global.wrapping_sub(lower_outside)
    };
    let above = if tick_current < tick_upper {
        upper_outside
    } else {
        growth_global.wrapping_sub(upper_outside)
    };
    growth_global.wrapping_sub(below).wrapping_sub(above)
}

fn accrued(owed: u64, growth_inside: u128, checkpoint: u128, liquidity: u128) -> Result<u64, AppError> {
    let delta = growth_inside.wrapping_sub(checkpoint);
    let earned = (U256::from(delta) * U256::from(liquidity)) >> Q64_RESOLUTION;
    let earned = u64::try_from(earned).map_err(|_| AppError::math("accrued amount exceeds u64"))?;
    owed.checked_add(earned)
        .ok_or_else(|| AppError::math("owed amount exceeds u64"))
}

/// Trading fees owed to `slot` in token A and token B.
pub fn owed_fees(pool: &PoolState, slot: &CurrentSlot) -> Result<(u64, u64), AppError> {
    let inside_a = growth_inside(
        pool.tick_current_index,
        slot.lower,
        slot.upper,
        pool.fee_growth_global_a,
        slot.lower_tick.fee_growth_outside_a,
        slot.upper_tick.fee_growth_outside_a,
    );
    let inside_b = growth_inside(
        pool.tick_current_index,
        slot.lower,
        slot.upper,
        pool.fee_growth_global_b,
        slot.lower_tick.fee_growth_outside_b,
        slot.upper_tick.fee_growth_outside_b,
    );
    Ok((
        accrued(slot.fee_owed_a, inside_a, slot.fee_growth_checkpoint_a, slot.liquidity)?,
        accrued(slot.fee_owed_b, inside_b, slot.fee_growth_checkpoint_b, slot.liquidity)?,
    ))
}

/// Reward growth globals advanced from the pool's last update to `now`.
pub fn reward_growths_at(pool: &PoolState, now: u64) -> Result<[u128; NUM_REWARDS], AppError> {
    let mut growths = pool.reward_infos.map(|r| r.growth_global_x64);
    if pool.liquidity == 0 || now <= pool.reward_last_updated_timestamp {
        return Ok(growths);
    }
    let elapsed = U256::from(now - pool.reward_last_updated_timestamp);
    for (growth, info) in growths.iter_mut().zip(pool.reward_infos.iter()) {
        if !info.initialized() {
            continue;
        }
        let delta = elapsed * U256::from(info.emissions_per_second_x64) / U256::from(pool.liquidity);
        let delta = u128::try_from(delta).map_err(|_| AppError::math("reward growth exceeds u128"))?;
        *growth = growth.wrapping_add(delta);
    }
    Ok(growths)
}

/// Rewards owed to `slot` per channel; uninitialised channels owe nothing.
pub fn owed_rewards(pool: &PoolState, slot: &CurrentSlot, now: u64) -> Result<[u64; NUM_REWARDS], AppError> {
    let globals = reward_growths_at(pool, now)?;
    let mut owed = [0u64; NUM_REWARDS];
    for (i, amount) in owed.iter_mut().enumerate() {
        if !pool.reward_infos[i].initialized() {
            continue;
        }
        let inside = growth_inside(
            pool.tick_current_index,
            slot.lower,
            slot.upper,
            globals[i],
            slot.lower_tick.reward_growths_outside[i],
            slot.upper_tick.reward_growths_outside[i],
        );
        let reward = &slot.rewards[i];
        *amount = accrued(reward.amount_owed, inside, reward.growth_inside_checkpoint, slot.liquidity)?;
    }
    Ok(owed)
}
