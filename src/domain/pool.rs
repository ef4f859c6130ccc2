// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{MAX_TICK_INDEX, MIN_TICK_INDEX, NUM_REWARDS};
use solana_sdk::pubkey::Pubkey;

/// One emission channel of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewardInfo {
    pub mint: Pubkey,
    pub emissions_per_second_x64: u128,
    pub growth_global_x64: u128,
}

impl RewardInfo {
    pub fn initialized(&self) -> bool {
        self.mint != Pubkey::default()
    }
}

/// Price and accrual state of the pool being reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub address: Pubkey,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
    pub tick_spacing: u16,
    /// Q64.64 square root of the B-per-A price.
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    pub liquidity: u128,
    pub fee_growth_global_a: u128,
    pub fee_growth_global_b: u128,
    pub reward_last_updated_timestamp: u64,
    pub reward_infos: [RewardInfo; NUM_REWARDS],
}

impl PoolState {
    /// Widest bound pair usable at this pool's granularity.
    pub fn bound_range(&self) -> (i32, i32) {
        let spacing = i32::from(self.tick_spacing.max(1));
        (
            (MIN_TICK_INDEX / spacing) * spacing,
            (MAX_TICK_INDEX / spacing) * spacing,
        )
    }

    pub fn reward_mints(&self) -> impl Iterator<Item = (usize, Pubkey)> + '_ {
        self.reward_infos
            .iter()
            .enumerate()
            .filter(|(_, r)| r.initialized())
            .map(|(i, r)| (i, r.mint))
    }
}

/// Accumulators a tick keeps for the side of the price it is not on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickGrowth {
    pub fee_growth_outside_a: u128,
    pub fee_growth_outside_b: u128,
    pub reward_growths_outside: [u128; NUM_REWARDS],
}

/// Fee withheld by the token program on every transfer of a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferFee {
    pub basis_points: u16,
    pub maximum_fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    pub address: Pubkey,
    pub decimals: u8,
    pub transfer_fee: Option<TransferFee>,
}

impl MintInfo {
    pub fn plain(address: Pubkey, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            transfer_fee: None,
        }
    }
}
