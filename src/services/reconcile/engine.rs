// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! The reconciliation loop: snapshot, diff, quote, review, build, pack and
//! dispatch, repeated until the bundle matches its target.

use crate::domain::bundle::{BundleSlot, CurrentState, PriceSlot, TargetState, TargetTable};
use crate::domain::constants::NUM_REWARDS;
use crate::domain::error::AppError;
use crate::domain::pool::{MintInfo, PoolState};
use crate::services::quote::liquidity::liquidity_for_single_amount;
use crate::services::quote::slippage::Slippage;
use crate::services::quote::tick_math::{sqrt_price_at_tick, ui_price_from_sqrt_price, ui_price_to_initializable_tick};
use crate::services::quote::{Quote, QuoteContext, quote_close, quote_decrease, quote_increase, quote_open};
use crate::services::reconcile::balance::{BalanceSummary, FundingShortfall, aggregate};
use crate::services::reconcile::batcher::{GroupLabel, TransactionBatch, TransactionSizeOracle, pack};
use crate::services::reconcile::differ::{ActionSet, diff};
use crate::services::reconcile::dispatcher::{BatchPosition, DispatchOutcome, DispatchSettings, Dispatcher};
use crate::services::reconcile::ports::{
    InstructionBuilder, NetworkSubmitter, Operator, PositionReader, ReadMode, TargetStateSource,
};
use crate::services::reconcile::stats::ReconcileStats;
use futures::future::try_join_all;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// Handles to everything outside the engine, passed in explicitly.
#[derive(Clone)]
pub struct ReconcileContext {
    pub reader: Arc<dyn PositionReader>,
    pub builder: Arc<dyn InstructionBuilder>,
    pub submitter: Arc<dyn NetworkSubmitter>,
    pub operator: Arc<dyn Operator>,
    pub payer: Arc<Keypair>,
}

#[derive(Debug, Clone)]
pub struct ReconcileParams {
    pub position_bundle: Pubkey,
    pub pool: Pubkey,
    pub tick_spacing: u16,
    pub slippage: Slippage,
    pub lookup_tables: Vec<Pubkey>,
    pub max_passes: u32,
    pub dispatch: DispatchSettings,
}

/// Everything one pass reads from the ledger.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub pool: PoolState,
    pub current: CurrentState,
    pub mint_a: MintInfo,
    pub mint_b: MintInfo,
    pub reward_mints: [Option<MintInfo>; NUM_REWARDS],
    pub lookup_tables: Vec<AddressLookupTableAccount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Withdraw,
    Deposit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub phase: Phase,
    pub position: BatchPosition,
    pub groups: Vec<GroupLabel>,
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Settled,
    Declined,
    Dispatched,
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass: u32,
    pub status: PassStatus,
    pub actions: ActionSet,
    pub summary: Option<BalanceSummary>,
    pub shortfalls: Vec<FundingShortfall>,
    pub batches: Vec<BatchReport>,
}

impl PassReport {
    pub fn all_landed(&self) -> bool {
        self.batches.iter().all(|b| b.outcome.landed())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub passes: Vec<PassReport>,
    /// Whether the last read of the bundle matched the target.
    pub settled: bool,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn ui_to_raw(amount: f64, decimals: u8, index: usize) -> Result<u64, AppError> {
    let raw = (amount * 10f64.powi(i32::from(decimals))).floor();
    if !raw.is_finite() || raw < 0.0 || raw > u64::MAX as f64 {
        return Err(AppError::validation(
            format!("slot {index} token amount"),
            format!("{amount} does not fit the mint's raw range"),
        ));
    }
    Ok(raw as u64)
}

/// Turn a price/amount table into tick bounds and liquidity at the pool's
/// current price. Tick tables pass through unchanged.
pub fn resolve_target(table: TargetTable, snapshot: &Snapshot) -> Result<TargetState, AppError> {
    let rows = match table {
        TargetTable::Ticks(state) => return Ok(state),
        TargetTable::Prices(rows) => rows,
    };
    let pool = &snapshot.pool;
    let (decimals_a, decimals_b) = (snapshot.mint_a.decimals, snapshot.mint_b.decimals);

    let mut slots = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        let PriceSlot::Open {
            min_price,
            max_price,
            token_amount,
        } = row
        else {
            slots.push(BundleSlot::Closed);
            continue;
        };
        let lower = ui_price_to_initializable_tick(min_price, decimals_a, decimals_b, pool.tick_spacing)?;
        let upper = ui_price_to_initializable_tick(max_price, decimals_a, decimals_b, pool.tick_spacing)?;
        if lower >= upper {
            return Err(AppError::validation(
                format!("slot {index} max price"),
                format!("range {min_price}..{max_price} collapses to tick {lower} at spacing {}", pool.tick_spacing),
            ));
        }
        let sqrt_lower = sqrt_price_at_tick(lower)?;
        let sqrt_upper = sqrt_price_at_tick(upper)?;
        let decimals = if pool.sqrt_price >= sqrt_upper {
            decimals_b
        } else {
            decimals_a
        };
        let amount = ui_to_raw(token_amount, decimals, index)?;
        let liquidity = liquidity_for_single_amount(amount, pool.sqrt_price, sqrt_lower, sqrt_upper)?;
        tracing::debug!(target: "reconcile", index, lower, upper, %liquidity, "Resolved price row");
        slots.push(BundleSlot::Open {
            lower,
            upper,
            liquidity,
        });
    }
    TargetState::new(slots, pool.tick_spacing)
}

/// Quotes for every action, withdrawals first, in index order.
pub fn quote_actions(
    actions: &ActionSet,
    current: &CurrentState,
    target: &TargetState,
    ctx: &QuoteContext,
) -> Result<(Vec<Quote>, Vec<Quote>), AppError> {
    let live = |index: u16| {
        current
            .get(index)
            .ok_or_else(|| AppError::Consistency(format!("slot {index} vanished from the snapshot")))
    };

    let mut withdrawals = Vec::new();
    for &index in &actions.decrease {
        let liquidity = target.slot(usize::from(index)).liquidity();
        withdrawals.push(quote_decrease(index, live(index)?, liquidity, ctx)?);
    }
    for &index in &actions.close {
        withdrawals.push(quote_close(index, live(index)?, ctx)?);
    }

    let mut deposits = Vec::new();
    for &index in &actions.open {
        if let BundleSlot::Open {
            lower,
            upper,
            liquidity,
        } = target.slot(usize::from(index))
        {
            deposits.push(quote_open(index, lower, upper, liquidity, ctx)?);
        }
    }
    for &index in &actions.increase {
        let liquidity = target.slot(usize::from(index)).liquidity();
        deposits.push(quote_increase(index, live(index)?, liquidity, ctx)?);
    }

    withdrawals.retain(|q| !q.is_noop());
    deposits.retain(|q| !q.is_noop());
    Ok((withdrawals, deposits))
}

pub struct Reconciler {
    ctx: ReconcileContext,
    params: ReconcileParams,
    dispatcher: Dispatcher,
    stats: Arc<ReconcileStats>,
}

impl Reconciler {
    pub fn new(ctx: ReconcileContext, params: ReconcileParams) -> Self {
        let stats = Arc::new(ReconcileStats::default());
        let dispatcher = Dispatcher::new(
            ctx.submitter.clone(),
            ctx.operator.clone(),
            ctx.payer.clone(),
            params.dispatch,
            stats.clone(),
        );
        Self {
            ctx,
            params,
            dispatcher,
            stats,
        }
    }

    pub fn stats(&self) -> &ReconcileStats {
        &self.stats
    }

    /// Fresh, concurrent read of everything a pass needs.
    pub async fn snapshot(&self) -> Result<Snapshot, AppError> {
        let reader = self.ctx.reader.as_ref();
        let bundle = &self.params.position_bundle;
        let (pool, current, occupied, lookup_tables) = futures::try_join!(
            reader.pool(&self.params.pool, ReadMode::Fresh),
            reader.bundle(bundle, ReadMode::Fresh),
            reader.occupied_slots(bundle, ReadMode::Fresh),
            reader.lookup_tables(&self.params.lookup_tables),
        )?;

        if pool.tick_spacing != self.params.tick_spacing {
            return Err(AppError::Consistency(format!(
                "pool {} has tick spacing {}, configured {}",
                pool.address, pool.tick_spacing, self.params.tick_spacing
            )));
        }
        if occupied != current.occupied() {
            return Err(AppError::Consistency(format!(
                "bundle {bundle} occupancy lists {} slots, fetched {} positions",
                occupied.len(),
                current.len()
            )));
        }

        let mut mints = vec![pool.token_mint_a, pool.token_mint_b];
        let rewards: Vec<(usize, Pubkey)> = pool.reward_mints().collect();
        mints.extend(rewards.iter().map(|(_, mint)| *mint));
        let mut infos = try_join_all(mints.iter().map(|mint| reader.mint(mint))).await?.into_iter();

        let (Some(mint_a), Some(mint_b)) = (infos.next(), infos.next()) else {
            return Err(AppError::Consistency("mint metadata missing".into()));
        };
        let mut reward_mints: [Option<MintInfo>; NUM_REWARDS] = Default::default();
        for ((slot, _), info) in rewards.into_iter().zip(infos) {
            reward_mints[slot] = Some(info);
        }

        tracing::debug!(
            target: "reconcile",
            pool = %pool.address,
            occupied = current.len(),
            tick = pool.tick_current_index,
            price = ui_price_from_sqrt_price(pool.sqrt_price, mint_a.decimals, mint_b.decimals),
            "Snapshot read"
        );
        Ok(Snapshot {
            pool,
            current,
            mint_a,
            mint_b,
            reward_mints,
            lookup_tables,
        })
    }

    async fn dispatch_phase(
        &self,
        phase: Phase,
        batches: &[TransactionBatch],
        lookup_tables: &[AddressLookupTableAccount],
    ) -> Result<Vec<BatchReport>, AppError> {
        let mut reports = Vec::with_capacity(batches.len());
        for (i, batch) in batches.iter().enumerate() {
            let position = BatchPosition {
                number: i + 1,
                of: batches.len(),
            };
            let outcome = self.dispatcher.dispatch(batch, position, lookup_tables).await?;
            self.stats.record_outcome(&outcome);
            if outcome.landed() {
                tracing::info!(target: "reconcile", ?phase, batch = position.number, of = position.of, "Batch landed");
            } else {
                tracing::warn!(
                    target: "reconcile",
                    ?phase,
                    outcome = ?outcome,
                    "batch {} of {} did not land",
                    position.number,
                    position.of
                );
            }
            reports.push(BatchReport {
                phase,
                position,
                groups: batch.labels(),
                outcome,
            });
        }
        Ok(reports)
    }

    /// One diff-to-dispatch pass against `snapshot`.
    pub async fn run_pass(&self, pass: u32, target: &TargetState, snapshot: Snapshot) -> Result<PassReport, AppError> {
        self.stats.passes.fetch_add(1, Ordering::Relaxed);
        let actions = diff(&snapshot.current, target, &snapshot.pool.address)?;
        let mut report = PassReport {
            pass,
            status: PassStatus::Settled,
            actions,
            summary: None,
            shortfalls: Vec::new(),
            batches: Vec::new(),
        };
        if report.actions.is_settled() {
            tracing::info!(target: "reconcile", pass, "Bundle matches target");
            return Ok(report);
        }

        let quote_ctx = QuoteContext {
            pool: snapshot.pool.clone(),
            mint_a: snapshot.mint_a.clone(),
            mint_b: snapshot.mint_b.clone(),
            reward_mints: snapshot.reward_mints.clone(),
            slippage: self.params.slippage,
            now: now_unix(),
        };
        let (withdrawals, deposits) = quote_actions(&report.actions, &snapshot.current, target, &quote_ctx)?;
        let summary = aggregate(withdrawals.iter().chain(deposits.iter()));

        let owner = self.ctx.payer.pubkey();
        let reader = self.ctx.reader.as_ref();
        let (held_a, held_b) = futures::try_join!(
            reader.token_balance(&owner, &snapshot.mint_a.address),
            reader.token_balance(&owner, &snapshot.mint_b.address),
        )?;
        report.shortfalls = summary.underfunded(held_a, held_b);
        for shortfall in &report.shortfalls {
            tracing::warn!(
                target: "reconcile",
                token = %shortfall.token,
                required = %shortfall.required,
                available = shortfall.available,
                "Projected deposit exceeds held balance"
            );
        }
        tracing::info!(
            target: "reconcile",
            pass,
            decrease = report.actions.decrease.len(),
            close = report.actions.close.len(),
            open = report.actions.open.len(),
            increase = report.actions.increase.len(),
            "Balance summary:\n{summary}"
        );
        report.summary = Some(summary);

        if !self.ctx.operator.confirm_summary(&summary).await {
            tracing::info!(target: "reconcile", pass, "Operator declined the balance summary");
            report.status = PassStatus::Declined;
            return Ok(report);
        }

        let build = |quotes: &[Quote]| {
            quotes
                .iter()
                .map(|q| self.ctx.builder.build(q))
                .collect::<Result<Vec<_>, AppError>>()
        };
        let oracle = TransactionSizeOracle::new(owner, snapshot.lookup_tables.clone());
        let withdraw_batches = pack(build(&withdrawals)?, &oracle)?;
        let deposit_batches = pack(build(&deposits)?, &oracle)?;
        self.stats
            .batches_built
            .fetch_add((withdraw_batches.len() + deposit_batches.len()) as u64, Ordering::Relaxed);

        report.status = PassStatus::Dispatched;
        report.batches = self
            .dispatch_phase(Phase::Withdraw, &withdraw_batches, &snapshot.lookup_tables)
            .await?;
        report.batches.extend(
            self.dispatch_phase(Phase::Deposit, &deposit_batches, &snapshot.lookup_tables)
                .await?,
        );
        Ok(report)
    }

    /// Load the target, then run passes until the bundle matches it, the
    /// operator declines or the pass limit is reached.
    pub async fn reconcile(&self, source: &dyn TargetStateSource) -> Result<ReconcileReport, AppError> {
        let table = source.load().await?;
        tracing::info!(target: "reconcile", open = table.open_count(), "Target table loaded");

        let mut snapshot = self.snapshot().await?;
        let target = resolve_target(table, &snapshot)?;

        let mut report = ReconcileReport::default();
        let max_passes = self.params.max_passes.max(1);
        for pass in 1..=max_passes {
            let pass_report = self.run_pass(pass, &target, snapshot).await?;
            let status = pass_report.status;
            report.passes.push(pass_report);
            self.stats.log_summary();
            snapshot = match status {
                PassStatus::Settled => {
                    report.settled = true;
                    break;
                }
                PassStatus::Declined => break,
                PassStatus::Dispatched => self.snapshot().await?,
            };
            if pass == max_passes {
                report.settled = diff(&snapshot.current, &target, &snapshot.pool.address)?.is_settled();
            }
        }

        if !report.settled {
            tracing::warn!(target: "reconcile", passes = report.passes.len(), "Bundle not yet at target");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::POSITION_BUNDLE_SIZE;
    use crate::domain::pool::RewardInfo;

    fn snapshot(tick_spacing: u16) -> Snapshot {
        let pool = PoolState {
            address: Pubkey::new_unique(),
            token_mint_a: Pubkey::new_unique(),
            token_mint_b: Pubkey::new_unique(),
            tick_spacing,
            sqrt_price: 1u128 << 64,
            tick_current_index: 0,
            liquidity: 0,
            fee_growth_global_a: 0,
            fee_growth_global_b: 0,
            reward_last_updated_timestamp: 0,
            reward_infos: [RewardInfo::default(); NUM_REWARDS],
        };
        Snapshot {
            mint_a: MintInfo::plain(pool.token_mint_a, 6),
            mint_b: MintInfo::plain(pool.token_mint_b, 6),
            pool,
            current: CurrentState::new(),
            reward_mints: Default::default(),
            lookup_tables: Vec::new(),
        }
    }

    fn price_rows(rows: &[(usize, PriceSlot)]) -> TargetTable {
        let mut slots = vec![PriceSlot::Closed; POSITION_BUNDLE_SIZE];
        for (index, row) in rows {
            slots[*index] = *row;
        }
        TargetTable::Prices(slots)
    }

    #[test]
    fn price_rows_resolve_to_aligned_ticks() {
        let table = price_rows(&[(
            4,
            PriceSlot::Open {
                min_price: 0.9,
                max_price: 1.1,
                token_amount: 1.0,
            },
        )]);
        let target = resolve_target(table, &snapshot(64)).unwrap();
        let BundleSlot::Open {
            lower,
            upper,
            liquidity,
        } = target.slot(4)
        else {
            panic!("slot 4 should be open");
        };
        assert_eq!(lower % 64, 0);
        assert_eq!(upper % 64, 0);
        assert!(lower < 0 && upper > 0);
        assert!(liquidity > 0);
        assert_eq!(target.open_count(), 1);
    }

    #[test]
    fn collapsed_price_range_is_rejected() {
        let table = price_rows(&[(
            2,
            PriceSlot::Open {
                min_price: 1.0,
                max_price: 1.0001,
                token_amount: 1.0,
            },
        )]);
        let err = resolve_target(table, &snapshot(64)).unwrap_err();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "slot 2 max price"));
    }

    #[test]
    fn tick_tables_pass_through() {
        let state = TargetState::all_closed();
        let resolved = resolve_target(TargetTable::Ticks(state.clone()), &snapshot(8)).unwrap();
        assert_eq!(resolved, state);
    }
}
