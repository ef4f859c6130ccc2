// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{MAX_TICK_INDEX, MIN_TICK_INDEX, NUM_REWARDS, POSITION_BUNDLE_SIZE};
use crate::domain::error::AppError;
use crate::domain::pool::TickGrowth;
use solana_sdk::pubkey::Pubkey;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Desired or observed shape of one bundle slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BundleSlot {
    #[default]
    Closed,
    Open {
        lower: i32,
        upper: i32,
        liquidity: u128,
    },
}

impl BundleSlot {
    pub fn is_open(&self) -> bool {
        matches!(self, BundleSlot::Open { .. })
    }

    pub fn bounds(&self) -> Option<(i32, i32)> {
        match self {
            BundleSlot::Open { lower, upper, .. } => Some((*lower, *upper)),
            BundleSlot::Closed => None,
        }
    }

    pub fn liquidity(&self) -> u128 {
        match self {
            BundleSlot::Open { liquidity, .. } => *liquidity,
            BundleSlot::Closed => 0,
        }
    }
}

/// Reject bounds that are inverted, off-granularity or outside the pool range.
pub fn validate_bounds(index: usize, lower: i32, upper: i32, tick_spacing: u16) -> Result<(), AppError> {
    if tick_spacing == 0 {
        return Err(AppError::validation("tick_spacing", "must be non-zero"));
    }
    let spacing = i32::from(tick_spacing);
    if lower >= upper {
        return Err(AppError::validation(
            format!("slot {index} lower"),
            format!("lower bound {lower} must be below upper bound {upper}"),
        ));
    }
    for (name, bound) in [("lower", lower), ("upper", upper)] {
        if !(MIN_TICK_INDEX..=MAX_TICK_INDEX).contains(&bound) {
            return Err(AppError::validation(
                format!("slot {index} {name}"),
                format!("{bound} outside [{MIN_TICK_INDEX}, {MAX_TICK_INDEX}]"),
            ));
        }
        if bound % spacing != 0 {
            return Err(AppError::validation(
                format!("slot {index} {name}"),
                format!("{bound} is not a multiple of tick spacing {tick_spacing}"),
            ));
        }
    }
    Ok(())
}

/// The declared state of every slot, position-addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetState {
    slots: Vec<BundleSlot>,
}

impl TargetState {
    pub fn new(slots: Vec<BundleSlot>, tick_spacing: u16) -> Result<Self, AppError> {
        if slots.len() != POSITION_BUNDLE_SIZE {
            return Err(AppError::validation(
                "target table",
                format!("expected {POSITION_BUNDLE_SIZE} slots, found {}", slots.len()),
            ));
        }
        for (index, slot) in slots.iter().enumerate() {
            if let BundleSlot::Open { lower, upper, .. } = slot {
                validate_bounds(index, *lower, *upper, tick_spacing)?;
            }
        }
        Ok(Self { slots })
    }

    /// A target with every slot closed.
    pub fn all_closed() -> Self {
        Self {
            slots: vec![BundleSlot::Closed; POSITION_BUNDLE_SIZE],
        }
    }

    pub fn slot(&self, index: usize) -> BundleSlot {
        self.slots.get(index).copied().unwrap_or_default()
    }

    pub fn slots(&self) -> &[BundleSlot] {
        &self.slots
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_open()).count()
    }
}

/// A slot declared by price range and a single-sided UI token amount.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PriceSlot {
    #[default]
    Closed,
    Open {
        min_price: f64,
        max_price: f64,
        token_amount: f64,
    },
}

/// Target table as loaded, before price rows are resolved against a pool.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetTable {
    Ticks(TargetState),
    Prices(Vec<PriceSlot>),
}

impl TargetTable {
    pub fn open_count(&self) -> usize {
        match self {
            TargetTable::Ticks(state) => state.open_count(),
            TargetTable::Prices(rows) => rows.iter().filter(|r| matches!(r, PriceSlot::Open { .. })).count(),
        }
    }
}

/// Per-position checkpoint for one reward channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionReward {
    pub growth_inside_checkpoint: u128,
    pub amount_owed: u64,
}

/// A live bundled position as read from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSlot {
    pub position: Pubkey,
    pub pool: Pubkey,
    pub lower: i32,
    pub upper: i32,
    pub liquidity: u128,
    pub fee_growth_checkpoint_a: u128,
    pub fee_owed_a: u64,
    pub fee_growth_checkpoint_b: u128,
    pub fee_owed_b: u64,
    pub rewards: [PositionReward; NUM_REWARDS],
    pub lower_tick: TickGrowth,
    pub upper_tick: TickGrowth,
}

impl CurrentSlot {
    pub fn as_slot(&self) -> BundleSlot {
        BundleSlot::Open {
            lower: self.lower,
            upper: self.upper,
            liquidity: self.liquidity,
        }
    }
}

/// Occupied slots of one bundle; unoccupied indices are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentState {
    slots: BTreeMap<u16, CurrentSlot>,
}

impl CurrentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: u16, slot: CurrentSlot) -> Result<(), AppError> {
        if usize::from(index) >= POSITION_BUNDLE_SIZE {
            return Err(AppError::Consistency(format!(
                "bundle index {index} outside 0..{POSITION_BUNDLE_SIZE}"
            )));
        }
        self.slots.insert(index, slot);
        Ok(())
    }

    pub fn get(&self, index: u16) -> Option<&CurrentSlot> {
        self.slots.get(&index)
    }

    pub fn occupied(&self) -> BTreeSet<u16> {
        self.slots.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &CurrentSlot)> {
        self.slots.iter().map(|(i, s)| (*i, s))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// The four ways a slot can change on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Decrease,
    Close,
    Open,
    Increase,
}

impl ActionKind {
    /// Withdrawals move tokens out of positions and are dispatched first.
    pub fn is_withdrawal(self) -> bool {
        matches!(self, ActionKind::Decrease | ActionKind::Close)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Decrease => "decrease",
            ActionKind::Close => "close",
            ActionKind::Open => "open",
            ActionKind::Increase => "increase",
        };
        f.write_str(name)
    }
}
