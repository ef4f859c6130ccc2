// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Token quotes for bundle slot changes.
//!
//! Withdrawals quote the amount that arrives (net of transfer fees) and a
//! slippage floor; deposits quote the amount that must be sent (gross of
//! transfer fees) and a slippage ceiling.

pub mod fees;
pub mod liquidity;
pub mod slippage;
pub mod tick_math;
pub mod transfer_fee;

use crate::domain::bundle::{ActionKind, CurrentSlot};
use crate::domain::constants::NUM_REWARDS;
use crate::domain::error::AppError;
use crate::domain::pool::{MintInfo, PoolState};
use liquidity::{TokenAmounts, amounts_for_liquidity};
use slippage::Slippage;
use solana_sdk::pubkey::Pubkey;
use tick_math::sqrt_price_at_tick;
use transfer_fee::{fee_excluded_amount, fee_included_amount};

/// Pool snapshot and token metadata a pass quotes against.
#[derive(Debug, Clone)]
pub struct QuoteContext {
    pub pool: PoolState,
    pub mint_a: MintInfo,
    pub mint_b: MintInfo,
    pub reward_mints: [Option<MintInfo>; NUM_REWARDS],
    pub slippage: Slippage,
    /// Unix seconds used to advance reward accumulators.
    pub now: u64,
}

/// Fees and rewards released when a slot is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectQuote {
    pub fee_a: u64,
    pub fee_b: u64,
    pub rewards: [u64; NUM_REWARDS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub index: u16,
    pub kind: ActionKind,
    /// Existing position, absent for `Open`.
    pub position: Option<Pubkey>,
    pub lower: i32,
    pub upper: i32,
    pub liquidity_delta: u128,
    pub token_est_a: u64,
    pub token_est_b: u64,
    /// Minimum received for withdrawals, maximum sent for deposits.
    pub token_bound_a: u64,
    pub token_bound_b: u64,
    pub collect: Option<CollectQuote>,
}

impl Quote {
    /// Increase/decrease quotes with nothing to move emit no instructions.
    pub fn is_noop(&self) -> bool {
        self.liquidity_delta == 0 && matches!(self.kind, ActionKind::Increase | ActionKind::Decrease)
    }

    /// Whether a deposit or withdrawal instruction belongs in the group.
    ///
    /// An `Open` or `Close` with a zero delta still opens or closes the
    /// position (and collects for `Close`) but must not carry the liquidity
    /// instruction; the program rejects zero amounts.
    pub fn moves_liquidity(&self) -> bool {
        self.liquidity_delta > 0
    }
}

fn range_prices(lower: i32, upper: i32) -> Result<(u128, u128), AppError> {
    Ok((sqrt_price_at_tick(lower)?, sqrt_price_at_tick(upper)?))
}

fn withdrawal_amounts(
    ctx: &QuoteContext,
    lower: i32,
    upper: i32,
    liquidity: u128,
) -> Result<(TokenAmounts, TokenAmounts), AppError> {
    let (sqrt_lower, sqrt_upper) = range_prices(lower, upper)?;
    let raw = amounts_for_liquidity(ctx.pool.sqrt_price, sqrt_lower, sqrt_upper, liquidity, false)?;
    let fee_a = ctx.mint_a.transfer_fee.as_ref();
    let fee_b = ctx.mint_b.transfer_fee.as_ref();
    let est = TokenAmounts {
        a: fee_excluded_amount(raw.a, fee_a).amount,
        b: fee_excluded_amount(raw.b, fee_b).amount,
    };
    let min = TokenAmounts {
        a: fee_excluded_amount(ctx.slippage.floor(raw.a), fee_a).amount,
        b: fee_excluded_amount(ctx.slippage.floor(raw.b), fee_b).amount,
    };
    Ok((est, min))
}

fn deposit_amounts(
    ctx: &QuoteContext,
    lower: i32,
    upper: i32,
    liquidity: u128,
) -> Result<(TokenAmounts, TokenAmounts), AppError> {
    let (sqrt_lower, sqrt_upper) = range_prices(lower, upper)?;
    let raw = amounts_for_liquidity(ctx.pool.sqrt_price, sqrt_lower, sqrt_upper, liquidity, true)?;
    let fee_a = ctx.mint_a.transfer_fee.as_ref();
    let fee_b = ctx.mint_b.transfer_fee.as_ref();
    let est = TokenAmounts {
        a: fee_included_amount(raw.a, fee_a)?.amount,
        b: fee_included_amount(raw.b, fee_b)?.amount,
    };
    let max = TokenAmounts {
        a: fee_included_amount(ctx.slippage.ceil(raw.a), fee_a)?.amount,
        b: fee_included_amount(ctx.slippage.ceil(raw.b), fee_b)?.amount,
    };
    Ok((est, max))
}

fn build(
    index: u16,
    kind: ActionKind,
    position: Option<Pubkey>,
    (lower, upper): (i32, i32),
    liquidity_delta: u128,
    (est, bound): (TokenAmounts, TokenAmounts),
) -> Quote {
    Quote {
        index,
        kind,
        position,
        lower,
        upper,
        liquidity_delta,
        token_est_a: est.a,
        token_est_b: est.b,
        token_bound_a: bound.a,
        token_bound_b: bound.b,
        collect: None,
    }
}

/// Shrink an existing slot down to `target_liquidity`.
pub fn quote_decrease(
    index: u16,
    current: &CurrentSlot,
    target_liquidity: u128,
    ctx: &QuoteContext,
) -> Result<Quote, AppError> {
    let delta = current.liquidity.saturating_sub(target_liquidity);
    let amounts = withdrawal_amounts(ctx, current.lower, current.upper, delta)?;
    Ok(build(
        index,
        ActionKind::Decrease,
        Some(current.position),
        (current.lower, current.upper),
        delta,
        amounts,
    ))
}

/// Grow an existing slot up to `target_liquidity`.
pub fn quote_increase(
    index: u16,
    current: &CurrentSlot,
    target_liquidity: u128,
    ctx: &QuoteContext,
) -> Result<Quote, AppError> {
    let delta = target_liquidity.saturating_sub(current.liquidity);
    let amounts = deposit_amounts(ctx, current.lower, current.upper, delta)?;
    Ok(build(
        index,
        ActionKind::Increase,
        Some(current.position),
        (current.lower, current.upper),
        delta,
        amounts,
    ))
}

/// Open a fresh slot and fund it with `liquidity`.
pub fn quote_open(
    index: u16,
    lower: i32,
    upper: i32,
    liquidity: u128,
    ctx: &QuoteContext,
) -> Result<Quote, AppError> {
    let amounts = deposit_amounts(ctx, lower, upper, liquidity)?;
    Ok(build(index, ActionKind::Open, None, (lower, upper), liquidity, amounts))
}

/// Withdraw everything from a slot, collect what it owes and close it.
pub fn quote_close(index: u16, current: &CurrentSlot, ctx: &QuoteContext) -> Result<Quote, AppError> {
    let amounts = withdrawal_amounts(ctx, current.lower, current.upper, current.liquidity)?;
    let mut quote = build(
        index,
        ActionKind::Close,
        Some(current.position),
        (current.lower, current.upper),
        current.liquidity,
        amounts,
    );

    let (fee_a, fee_b) = fees::owed_fees(&ctx.pool, current)?;
    let owed_rewards = fees::owed_rewards(&ctx.pool, current, ctx.now)?;
    let mut rewards = [0u64; NUM_REWARDS];
    for (i, amount) in owed_rewards.into_iter().enumerate() {
        let transfer_fee = ctx.reward_mints[i].as_ref().and_then(|m| m.transfer_fee.as_ref());
        rewards[i] = fee_excluded_amount(amount, transfer_fee).amount;
    }
    quote.collect = Some(CollectQuote {
        fee_a: fee_excluded_amount(fee_a, ctx.mint_a.transfer_fee.as_ref()).amount,
        fee_b: fee_excluded_amount(fee_b, ctx.mint_b.transfer_fee.as_ref()).amount,
        rewards,
    });

    tracing::debug!(
        target: "quote",
        index,
        liquidity = %current.liquidity,
        fee_a,
        fee_b,
        "Close quote"
    );
    Ok(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bundle::PositionReward;
    use crate::domain::pool::{RewardInfo, TickGrowth, TransferFee};

    fn context(sqrt_price: u128) -> QuoteContext {
        let pool = PoolState {
            address: Pubkey::new_unique(),
            token_mint_a: Pubkey::new_unique(),
            token_mint_b: Pubkey::new_unique(),
            tick_spacing: 8,
            sqrt_price,
            tick_current_index: tick_math::tick_at_sqrt_price(sqrt_price).unwrap(),
            liquidity: 1_000_000,
            fee_growth_global_a: 0,
            fee_growth_global_b: 0,
            reward_last_updated_timestamp: 0,
            reward_infos: [RewardInfo::default(); NUM_REWARDS],
        };
        QuoteContext {
            mint_a: MintInfo::plain(pool.token_mint_a, 9),
            mint_b: MintInfo::plain(pool.token_mint_b, 6),
            pool,
            reward_mints: [None, None, None],
            slippage: Slippage::default(),
            now: 0,
        }
    }

    fn slot(lower: i32, upper: i32, liquidity: u128) -> CurrentSlot {
        CurrentSlot {
            position: Pubkey::new_unique(),
            pool: Pubkey::new_unique(),
            lower,
            upper,
            liquidity,
            fee_growth_checkpoint_a: 0,
            fee_owed_a: 3,
            fee_growth_checkpoint_b: 0,
            fee_owed_b: 4,
            rewards: [PositionReward::default(); NUM_REWARDS],
            lower_tick: TickGrowth::default(),
            upper_tick: TickGrowth::default(),
        }
    }

    #[test]
    fn open_at_midpoint_is_balanced() {
        let ctx = context(1u128 << 64);
        let q = quote_open(5, -1000, 1000, 500_000_000, &ctx).unwrap();
        assert_eq!(q.kind, ActionKind::Open);
        assert!(q.token_est_a > 0 && q.token_est_b > 0);
        assert!(q.token_est_a.abs_diff(q.token_est_b) <= 1);
        assert!(q.token_bound_a >= q.token_est_a);
        assert!(q.token_bound_b >= q.token_est_b);
        assert!(q.position.is_none());
    }

    #[test]
    fn decrease_withdraws_with_floor() {
        let ctx = context(sqrt_price_at_tick(100).unwrap());
        let current = slot(0, 200, 100_000_000);
        let q = quote_decrease(7, &current, 40_000_000, &ctx).unwrap();
        assert_eq!(q.liquidity_delta, 60_000_000);
        assert!(q.token_est_a > 0 && q.token_est_b > 0);
        assert!(q.token_bound_a <= q.token_est_a);
        assert!(q.token_bound_b <= q.token_est_b);
        assert!(q.collect.is_none());
    }

    #[test]
    fn equal_liquidity_is_a_noop() {
        let ctx = context(1u128 << 64);
        let current = slot(-8, 8, 10);
        let q = quote_increase(1, &current, 10, &ctx).unwrap();
        assert!(q.is_noop());
        assert_eq!((q.token_est_a, q.token_est_b), (0, 0));
    }

    #[test]
    fn empty_open_keeps_the_slot_but_moves_nothing() {
        let ctx = context(1u128 << 64);
        let q = quote_open(4, -800, 800, 0, &ctx).unwrap();
        assert!(!q.is_noop());
        assert!(!q.moves_liquidity());
        assert_eq!((q.token_est_a, q.token_est_b), (0, 0));
        assert_eq!((q.token_bound_a, q.token_bound_b), (0, 0));

        let drained = quote_close(4, &slot(-800, 800, 0), &ctx).unwrap();
        assert!(!drained.moves_liquidity());
        assert!(drained.collect.is_some());
    }

    #[test]
    fn close_reports_fees_net_of_transfer_fee() {
        let mut ctx = context(1u128 << 64);
        ctx.mint_b.transfer_fee = Some(TransferFee {
            basis_points: 5_000,
            maximum_fee: u64::MAX,
        });
        let current = slot(-80, 80, 1_000);
        let q = quote_close(3, &current, &ctx).unwrap();
        let collect = q.collect.unwrap();
        assert_eq!(collect.fee_a, 3);
        assert_eq!(collect.fee_b, 2);
        assert!(!q.is_noop());
    }

    #[test]
    fn deposit_is_grossed_up_for_transfer_fee() {
        let mut ctx = context(1u128 << 64);
        let plain = quote_open(0, -800, 800, 1_000_000_000, &ctx).unwrap();
        ctx.mint_a.transfer_fee = Some(TransferFee {
            basis_points: 100,
            maximum_fee: u64::MAX,
        });
        let taxed = quote_open(0, -800, 800, 1_000_000_000, &ctx).unwrap();
        assert!(taxed.token_est_a > plain.token_est_a);
        assert_eq!(taxed.token_est_b, plain.token_est_b);
    }
}
