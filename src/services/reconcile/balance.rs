// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::NUM_REWARDS;
use crate::services::quote::Quote;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub a: u128,
    pub b: u128,
}

impl TokenTotals {
    fn add(&mut self, a: u64, b: u64) {
        self.a += u128::from(a);
        self.b += u128::from(b);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSide {
    A,
    B,
}

impl fmt::Display for TokenSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSide::A => f.write_str("token A"),
            TokenSide::B => f.write_str("token B"),
        }
    }
}

/// Worst-case deposit the wallet cannot cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingShortfall {
    pub token: TokenSide,
    pub required: u128,
    pub available: u64,
}

/// Totals across one pass's quotes, shown to the operator before dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSummary {
    pub withdraw_est: TokenTotals,
    pub withdraw_min: TokenTotals,
    pub deposit_est: TokenTotals,
    pub deposit_max: TokenTotals,
    pub fees: TokenTotals,
    pub rewards: [u128; NUM_REWARDS],
}

impl BalanceSummary {
    /// Estimated wallet change per token, withdrawals minus deposits.
    /// Collected fees and rewards are reported separately.
    pub fn net_delta(&self) -> (i128, i128) {
        (
            self.withdraw_est.a as i128 - self.deposit_est.a as i128,
            self.withdraw_est.b as i128 - self.deposit_est.b as i128,
        )
    }

    pub fn underfunded(&self, held_a: u64, held_b: u64) -> Vec<FundingShortfall> {
        [
            (TokenSide::A, self.deposit_max.a, held_a),
            (TokenSide::B, self.deposit_max.b, held_b),
        ]
        .into_iter()
        .filter(|(_, required, available)| *required > u128::from(*available))
        .map(|(token, required, available)| FundingShortfall {
            token,
            required,
            available,
        })
        .collect()
    }
}

impl fmt::Display for BalanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (net_a, net_b) = self.net_delta();
        writeln!(
            f,
            "withdraw  est A={} B={}  min A={} B={}",
            self.withdraw_est.a, self.withdraw_est.b, self.withdraw_min.a, self.withdraw_min.b
        )?;
        writeln!(
            f,
            "deposit   est A={} B={}  max A={} B={}",
            self.deposit_est.a, self.deposit_est.b, self.deposit_max.a, self.deposit_max.b
        )?;
        writeln!(f, "fees      A={} B={}", self.fees.a, self.fees.b)?;
        writeln!(f, "rewards   {:?}", self.rewards)?;
        write!(f, "net       A={net_a:+} B={net_b:+}")
    }
}

pub fn aggregate<'a>(quotes: impl IntoIterator<Item = &'a Quote>) -> BalanceSummary {
    let mut summary = BalanceSummary::default();
    for quote in quotes {
        if quote.kind.is_withdrawal() {
            summary.withdraw_est.add(quote.token_est_a, quote.token_est_b);
            summary.withdraw_min.add(quote.token_bound_a, quote.token_bound_b);
        } else {
            summary.deposit_est.add(quote.token_est_a, quote.token_est_b);
            summary.deposit_max.add(quote.token_bound_a, quote.token_bound_b);
        }
        if let Some(collect) = &quote.collect {
            summary.fees.add(collect.fee_a, collect.fee_b);
            for (total, amount) in summary.rewards.iter_mut().zip(collect.rewards) {
                *total += u128::from(amount);
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bundle::ActionKind;
    use crate::services::quote::CollectQuote;

    fn quote(kind: ActionKind, est: (u64, u64), bound: (u64, u64)) -> Quote {
        Quote {
            index: 0,
            kind,
            position: None,
            lower: 0,
            upper: 8,
            liquidity_delta: 1,
            token_est_a: est.0,
            token_est_b: est.1,
            token_bound_a: bound.0,
            token_bound_b: bound.1,
            collect: None,
        }
    }

    #[test]
    fn sums_by_direction() {
        let mut close = quote(ActionKind::Close, (100, 50), (90, 45));
        close.collect = Some(CollectQuote {
            fee_a: 3,
            fee_b: 4,
            rewards: [1, 0, 2],
        });
        let quotes = [
            close,
            quote(ActionKind::Decrease, (10, 0), (9, 0)),
            quote(ActionKind::Open, (30, 70), (31, 71)),
            quote(ActionKind::Increase, (0, 5), (0, 6)),
        ];
        let summary = aggregate(&quotes);
        assert_eq!(summary.withdraw_est, TokenTotals { a: 110, b: 50 });
        assert_eq!(summary.withdraw_min, TokenTotals { a: 99, b: 45 });
        assert_eq!(summary.deposit_est, TokenTotals { a: 30, b: 75 });
        assert_eq!(summary.deposit_max, TokenTotals { a: 31, b: 77 });
        assert_eq!(summary.fees, TokenTotals { a: 3, b: 4 });
        assert_eq!(summary.rewards, [1, 0, 2]);
        assert_eq!(summary.net_delta(), (80, -25));
    }

    #[test]
    fn shortfall_uses_worst_case_deposit() {
        let summary = aggregate(&[quote(ActionKind::Open, (100, 100), (101, 101))]);
        assert!(summary.underfunded(101, 101).is_empty());
        let short = summary.underfunded(100, 500);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].token, TokenSide::A);
        assert_eq!(short[0].required, 101);
    }
}
