// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::bundle::{ActionKind, BundleSlot, CurrentState, TargetState};
use crate::domain::constants::POSITION_BUNDLE_SIZE;
use crate::domain::error::AppError;
use solana_sdk::pubkey::Pubkey;

/// Slot indices grouped by what has to happen to them. A bounds change puts
/// the same index in both `close` and `open`; every other index is in
/// exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub no_change: Vec<u16>,
    pub decrease: Vec<u16>,
    pub close: Vec<u16>,
    pub open: Vec<u16>,
    pub increase: Vec<u16>,
}

impl ActionSet {
    pub fn is_settled(&self) -> bool {
        self.decrease.is_empty() && self.close.is_empty() && self.open.is_empty() && self.increase.is_empty()
    }

    pub fn indices(&self, kind: ActionKind) -> &[u16] {
        match kind {
            ActionKind::Decrease => &self.decrease,
            ActionKind::Close => &self.close,
            ActionKind::Open => &self.open,
            ActionKind::Increase => &self.increase,
        }
    }

    pub fn action_count(&self) -> usize {
        self.decrease.len() + self.close.len() + self.open.len() + self.increase.len()
    }
}

/// Compare the live bundle against the target, slot by slot.
///
/// Every occupied slot must belong to `pool`; a foreign slot means the
/// snapshot is stale or the bundle is shared, and nothing is diffed.
pub fn diff(current: &CurrentState, target: &TargetState, pool: &Pubkey) -> Result<ActionSet, AppError> {
    if let Some((index, slot)) = current.iter().find(|(_, slot)| slot.pool != *pool) {
        return Err(AppError::Consistency(format!(
            "slot {index} belongs to pool {}, expected {pool}",
            slot.pool
        )));
    }

    let mut actions = ActionSet::default();
    for index in 0..POSITION_BUNDLE_SIZE as u16 {
        let live = current.get(index);
        match (target.slot(usize::from(index)), live) {
            (BundleSlot::Closed, None) => actions.no_change.push(index),
            (BundleSlot::Closed, Some(_)) => actions.close.push(index),
            (BundleSlot::Open { .. }, None) => actions.open.push(index),
            (
                BundleSlot::Open {
                    lower,
                    upper,
                    liquidity,
                },
                Some(live),
            ) => {
                if (live.lower, live.upper) != (lower, upper) {
                    actions.close.push(index);
                    actions.open.push(index);
                } else if live.liquidity < liquidity {
                    actions.increase.push(index);
                } else if live.liquidity > liquidity {
                    actions.decrease.push(index);
                } else {
                    actions.no_change.push(index);
                }
            }
        }
    }

    tracing::debug!(
        target: "differ",
        no_change = actions.no_change.len(),
        decrease = actions.decrease.len(),
        close = actions.close.len(),
        open = actions.open.len(),
        increase = actions.increase.len(),
        "Bundle diffed"
    );
    Ok(actions)
}
