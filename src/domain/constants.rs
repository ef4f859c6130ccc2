// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

// =============================================================================
// POSITION BUNDLE
// =============================================================================

/// Number of addressable slots in one position bundle.
pub const POSITION_BUNDLE_SIZE: usize = 256;

/// Reward channels tracked per pool and per position.
pub const NUM_REWARDS: usize = 3;

// =============================================================================
// POOL BOUNDS (Q64.64 square-root price)
// =============================================================================

pub const MIN_TICK_INDEX: i32 = -443_636;
pub const MAX_TICK_INDEX: i32 = 443_636;

pub const MIN_SQRT_PRICE_X64: u128 = 4_295_048_016;
pub const MAX_SQRT_PRICE_X64: u128 = 79_226_673_515_401_279_992_447_579_055;

/// Fixed-point resolution of the square-root price.
pub const Q64_RESOLUTION: usize = 64;

// =============================================================================
// TOKEN MATH
// =============================================================================

pub const MAX_FEE_BASIS_POINTS: u16 = 10_000;
pub const BPS_DENOMINATOR: u64 = 10_000;

// =============================================================================
// TRANSACTION & DISPATCH
// =============================================================================

/// Blocks a signed transaction stays acceptable after its blockhash was fetched.
pub const BLOCKHASH_VALIDITY_LOOKAHEAD: u64 = 151;

pub const DEFAULT_CONFIRM_POLL_MS: u64 = 1_000;
pub const MIN_CONFIRM_POLL_MS: u64 = 100;

pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 400_000;

/// Micro-lamports per lamport, for compute-unit price conversion.
pub const MICRO_LAMPORTS_PER_LAMPORT: u64 = 1_000_000;

pub const DEFAULT_SLIPPAGE_BPS: u16 = 100;
