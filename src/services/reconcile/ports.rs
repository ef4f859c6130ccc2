// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Contracts the engine consumes. Ledger reads, instruction encoding, network
//! submission, the target table and operator decisions all live behind these.

use crate::domain::bundle::{CurrentState, TargetTable};
use crate::domain::error::AppError;
use crate::domain::pool::{MintInfo, PoolState};
use crate::services::quote::Quote;
use crate::services::reconcile::balance::BalanceSummary;
use crate::services::reconcile::batcher::InstructionGroup;
use async_trait::async_trait;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Local caches may answer.
    #[default]
    Cached,
    /// Always go to the ledger.
    Fresh,
}

#[async_trait]
pub trait PositionReader: Send + Sync {
    async fn pool(&self, address: &Pubkey, mode: ReadMode) -> Result<PoolState, AppError>;

    async fn occupied_slots(&self, bundle: &Pubkey, mode: ReadMode) -> Result<BTreeSet<u16>, AppError>;

    async fn bundle(&self, bundle: &Pubkey, mode: ReadMode) -> Result<CurrentState, AppError>;

    async fn mint(&self, mint: &Pubkey) -> Result<MintInfo, AppError>;

    /// Balance the operator wallet holds of `mint`, in raw units.
    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, AppError>;

    async fn lookup_tables(&self, addresses: &[Pubkey]) -> Result<Vec<AddressLookupTableAccount>, AppError>;
}

/// Maps a quote onto its atomic instruction group.
///
/// Implementations skip the increase/decrease-liquidity instruction when
/// [`Quote::moves_liquidity`] is false.
pub trait InstructionBuilder: Send + Sync {
    fn build(&self, quote: &Quote) -> Result<InstructionGroup, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Pending,
    Confirmed { error: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Simulation {
    pub units_consumed: Option<u64>,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

#[async_trait]
pub trait NetworkSubmitter: Send + Sync {
    /// Fire and forget; the node must not retry on its own.
    async fn submit_raw(&self, bytes: &[u8]) -> Result<(), AppError>;

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, AppError>;

    async fn block_height(&self) -> Result<u64, AppError>;

    async fn latest_blockhash(&self) -> Result<Hash, AppError>;

    async fn simulate(&self, bytes: &[u8]) -> Result<Simulation, AppError>;
}

#[async_trait]
pub trait TargetStateSource: Send + Sync {
    async fn load(&self) -> Result<TargetTable, AppError>;
}

/// What the operator is asked to price before a batch goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeRequest {
    pub batch: usize,
    pub batches: usize,
    pub compute_unit_limit: u32,
    /// Lamports spent by the previous attempt, if any.
    pub previous_budget: Option<u64>,
}

/// Operator decisions. Interactive front ends implement this; the engine
/// never prompts on its own.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn confirm_summary(&self, summary: &BalanceSummary) -> bool;

    /// Total priority fee in lamports, or `None` to skip the batch.
    async fn fee_budget(&self, request: &FeeRequest) -> Option<u64>;

    /// New budget after an expired round, or `None` to give up.
    async fn retry_after_expiry(&self, request: &FeeRequest) -> Option<u64>;
}

/// Approves every summary and never re-prices; batches run on the fixed fee.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove {
    pub fee_budget_lamports: Option<u64>,
}

#[async_trait]
impl Operator for AutoApprove {
    async fn confirm_summary(&self, _summary: &BalanceSummary) -> bool {
        true
    }

    async fn fee_budget(&self, _request: &FeeRequest) -> Option<u64> {
        Some(self.fee_budget_lamports.unwrap_or_default())
    }

    async fn retry_after_expiry(&self, _request: &FeeRequest) -> Option<u64> {
        None
    }
}
