// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Submission of one transaction batch until it lands or its blockhash
//! expires.
//!
//! [`ConfirmationTracker`] decides what happens after each observation and has
//! no I/O; [`Dispatcher`] feeds it signature statuses and block heights.

use crate::domain::constants::{
    BPS_DENOMINATOR, DEFAULT_COMPUTE_UNIT_LIMIT, MAX_COMPUTE_UNIT_LIMIT, MICRO_LAMPORTS_PER_LAMPORT,
};
use crate::domain::error::AppError;
use crate::services::reconcile::batcher::TransactionBatch;
use crate::services::reconcile::ports::{FeeRequest, NetworkSubmitter, Operator, SignatureStatus};
use crate::services::reconcile::stats::ReconcileStats;
use solana_sdk::message::AddressLookupTableAccount;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Compute budget attached to every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFee {
    pub compute_unit_limit: u32,
    pub micro_lamports: u64,
}

impl PriorityFee {
    /// Zero-valued pair; encodes to the same size as any real fee.
    pub fn placeholder() -> Self {
        Self {
            compute_unit_limit: 0,
            micro_lamports: 0,
        }
    }

    /// Spread a lamport budget over `compute_unit_limit` units.
    pub fn from_budget(lamports: u64, compute_unit_limit: u32) -> Self {
        let limit = compute_unit_limit.clamp(1, MAX_COMPUTE_UNIT_LIMIT);
        let micro = u128::from(lamports) * u128::from(MICRO_LAMPORTS_PER_LAMPORT) / u128::from(limit);
        Self {
            compute_unit_limit: limit,
            micro_lamports: u64::try_from(micro).unwrap_or(u64::MAX),
        }
    }

    /// Lamports paid if every unit is consumed.
    pub fn total_lamports(&self) -> u64 {
        let micro = u128::from(self.micro_lamports) * u128::from(self.compute_unit_limit);
        u64::try_from(micro.div_ceil(u128::from(MICRO_LAMPORTS_PER_LAMPORT))).unwrap_or(u64::MAX)
    }

    pub fn instructions(&self) -> [Instruction; 2] {
        [
            ComputeBudgetInstruction::set_compute_unit_limit(self.compute_unit_limit),
            ComputeBudgetInstruction::set_compute_unit_price(self.micro_lamports),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeMode {
    Fixed(PriorityFee),
    /// Simulate, pad the consumed units by `margin_bps`, ask the operator.
    Negotiated { margin_bps: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Landed { signature: Signature },
    Failed { signature: Signature, error: String },
    Expired { signature: Signature },
    SimulationFailed { error: String },
    Declined,
}

impl DispatchOutcome {
    pub fn landed(&self) -> bool {
        matches!(self, DispatchOutcome::Landed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Landed,
    Failed(String),
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Resubmit,
    FinalCheck,
    Finished(Verdict),
}

/// Confirmation state machine for one signed transaction.
#[derive(Debug, Clone)]
pub struct ConfirmationTracker {
    ceiling: u64,
    final_check_pending: bool,
    verdict: Option<Verdict>,
    resubmissions: u32,
}

impl ConfirmationTracker {
    /// `ceiling` is the last block height at which the transaction is valid.
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            final_check_pending: false,
            verdict: None,
            resubmissions: 0,
        }
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn resubmissions(&self) -> u32 {
        self.resubmissions
    }

    fn confirmed(status: &SignatureStatus) -> Option<Verdict> {
        match status {
            SignatureStatus::Pending => None,
            SignatureStatus::Confirmed { error: None } => Some(Verdict::Landed),
            SignatureStatus::Confirmed { error: Some(e) } => Some(Verdict::Failed(e.clone())),
        }
    }

    pub fn on_poll(&mut self, status: &SignatureStatus, block_height: u64) -> Step {
        if let Some(verdict) = &self.verdict {
            return Step::Finished(verdict.clone());
        }
        if self.final_check_pending {
            return Step::FinalCheck;
        }
        if let Some(verdict) = Self::confirmed(status) {
            self.verdict = Some(verdict.clone());
            return Step::Finished(verdict);
        }
        if block_height > self.ceiling {
            self.final_check_pending = true;
            return Step::FinalCheck;
        }
        self.resubmissions += 1;
        Step::Resubmit
    }

    /// Last look after the window closed; pending now means expired.
    pub fn on_final_check(&mut self, status: &SignatureStatus) -> Verdict {
        if let Some(verdict) = &self.verdict {
            return verdict.clone();
        }
        let verdict = Self::confirmed(status).unwrap_or(Verdict::Expired);
        self.final_check_pending = false;
        self.verdict = Some(verdict.clone());
        verdict
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub poll_interval: Duration,
    pub validity_lookahead: u64,
    pub fee_mode: FeeMode,
}

/// Where a batch sits in its phase, for operator prompts and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    pub number: usize,
    pub of: usize,
}

pub struct Dispatcher {
    submitter: Arc<dyn NetworkSubmitter>,
    operator: Arc<dyn Operator>,
    payer: Arc<Keypair>,
    settings: DispatchSettings,
    stats: Arc<ReconcileStats>,
}

impl Dispatcher {
    pub fn new(
        submitter: Arc<dyn NetworkSubmitter>,
        operator: Arc<dyn Operator>,
        payer: Arc<Keypair>,
        settings: DispatchSettings,
        stats: Arc<ReconcileStats>,
    ) -> Self {
        Self {
            submitter,
            operator,
            payer,
            settings,
            stats,
        }
    }

    async fn sign(
        &self,
        batch: &TransactionBatch,
        fee: PriorityFee,
        lookup_tables: &[AddressLookupTableAccount],
    ) -> Result<(Signature, Vec<u8>), AppError> {
        let blockhash = self.submitter.latest_blockhash().await?;
        let message = batch.compile(&self.payer.pubkey(), fee, lookup_tables, blockhash)?;
        let transaction = VersionedTransaction::try_new(message, &[self.payer.as_ref()])
            .map_err(|e| AppError::validation("signer", e.to_string()))?;
        let bytes = bincode::serialize(&transaction)
            .map_err(|e| AppError::validation("transaction batch", e.to_string()))?;
        Ok((transaction.signatures[0], bytes))
    }

    async fn status_or_pending(&self, signature: &Signature) -> SignatureStatus {
        match self.submitter.signature_status(signature).await {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(target: "dispatch", error = %e, %signature, "Status lookup failed; treating as pending");
                SignatureStatus::Pending
            }
        }
    }

    async fn send(&self, bytes: &[u8], signature: &Signature) {
        self.stats.submissions.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.submitter.submit_raw(bytes).await {
            tracing::warn!(target: "dispatch", error = %e, %signature, "Submission failed; will resend");
        }
    }

    async fn negotiate(
        &self,
        batch: &TransactionBatch,
        position: BatchPosition,
        margin_bps: u64,
        lookup_tables: &[AddressLookupTableAccount],
    ) -> Result<Result<PriorityFee, DispatchOutcome>, AppError> {
        let probe = PriorityFee {
            compute_unit_limit: MAX_COMPUTE_UNIT_LIMIT,
            micro_lamports: 0,
        };
        let (_, bytes) = self.sign(batch, probe, lookup_tables).await?;
        let simulation = self.submitter.simulate(&bytes).await?;
        if let Some(error) = simulation.error {
            for line in &simulation.logs {
                tracing::debug!(target: "dispatch", log = %line, "Simulation log");
            }
            return Ok(Err(DispatchOutcome::SimulationFailed { error }));
        }

        let units = simulation
            .units_consumed
            .unwrap_or(u64::from(DEFAULT_COMPUTE_UNIT_LIMIT));
        let padded = u128::from(units) * u128::from(margin_bps) / u128::from(BPS_DENOMINATOR);
        let limit = padded.clamp(1, u128::from(MAX_COMPUTE_UNIT_LIMIT)) as u32;
        let request = FeeRequest {
            batch: position.number,
            batches: position.of,
            compute_unit_limit: limit,
            previous_budget: None,
        };
        Ok(match self.operator.fee_budget(&request).await {
            Some(lamports) => Ok(PriorityFee::from_budget(lamports, limit)),
            None => Err(DispatchOutcome::Declined),
        })
    }

    /// One signed transaction, resent until it lands or expires.
    async fn submit_round(
        &self,
        batch: &TransactionBatch,
        fee: PriorityFee,
        lookup_tables: &[AddressLookupTableAccount],
    ) -> Result<DispatchOutcome, AppError> {
        let (signature, bytes) = self.sign(batch, fee, lookup_tables).await?;
        let ceiling = self
            .submitter
            .block_height()
            .await?
            .saturating_add(self.settings.validity_lookahead);
        self.send(&bytes, &signature).await;
        tracing::info!(target: "dispatch", %signature, ceiling, "Submitted");

        let mut tracker = ConfirmationTracker::new(ceiling);
        loop {
            tokio::time::sleep(self.settings.poll_interval).await;
            let status = self.status_or_pending(&signature).await;
            let height = self.submitter.block_height().await?;
            let verdict = match tracker.on_poll(&status, height) {
                Step::Resubmit => {
                    self.stats.resubmissions.fetch_add(1, Ordering::Relaxed);
                    self.send(&bytes, &signature).await;
                    continue;
                }
                Step::FinalCheck => {
                    let status = self.status_or_pending(&signature).await;
                    tracker.on_final_check(&status)
                }
                Step::Finished(verdict) => verdict,
            };
            return Ok(match verdict {
                Verdict::Landed => DispatchOutcome::Landed { signature },
                Verdict::Failed(error) => DispatchOutcome::Failed { signature, error },
                Verdict::Expired => DispatchOutcome::Expired { signature },
            });
        }
    }

    pub async fn dispatch(
        &self,
        batch: &TransactionBatch,
        position: BatchPosition,
        lookup_tables: &[AddressLookupTableAccount],
    ) -> Result<DispatchOutcome, AppError> {
        let (mut fee, negotiated) = match self.settings.fee_mode {
            FeeMode::Fixed(fee) => (fee, false),
            FeeMode::Negotiated { margin_bps } => {
                match self.negotiate(batch, position, margin_bps, lookup_tables).await? {
                    Ok(fee) => (fee, true),
                    Err(outcome) => return Ok(outcome),
                }
            }
        };

        loop {
            let outcome = self.submit_round(batch, fee, lookup_tables).await?;
            if !negotiated || !matches!(outcome, DispatchOutcome::Expired { .. }) {
                return Ok(outcome);
            }
            let request = FeeRequest {
                batch: position.number,
                batches: position.of,
                compute_unit_limit: fee.compute_unit_limit,
                previous_budget: Some(fee.total_lamports()),
            };
            match self.operator.retry_after_expiry(&request).await {
                Some(lamports) => fee = PriorityFee::from_budget(lamports, fee.compute_unit_limit),
                None => return Ok(outcome),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bundle::ActionKind;
    use crate::services::reconcile::balance::BalanceSummary;
    use crate::services::reconcile::batcher::{GroupLabel, InstructionGroup};
    use crate::services::reconcile::ports::{AutoApprove, Simulation};
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::pubkey::Pubkey;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU64;

    fn pending() -> SignatureStatus {
        SignatureStatus::Pending
    }

    fn ok() -> SignatureStatus {
        SignatureStatus::Confirmed { error: None }
    }

    fn failed() -> SignatureStatus {
        SignatureStatus::Confirmed {
            error: Some("custom program error: 0x1".into()),
        }
    }

    #[test]
    fn tracker_resubmits_inside_window() {
        let mut t = ConfirmationTracker::new(100);
        assert_eq!(t.on_poll(&pending(), 99), Step::Resubmit);
        assert_eq!(t.on_poll(&pending(), 100), Step::Resubmit);
        assert_eq!(t.on_poll(&ok(), 100), Step::Finished(Verdict::Landed));
        assert_eq!(t.resubmissions(), 2);
    }

    #[test]
    fn tracker_never_reports_landed_for_ledger_error() {
        let mut t = ConfirmationTracker::new(100);
        let step = t.on_poll(&failed(), 10);
        assert!(matches!(step, Step::Finished(Verdict::Failed(_))));
        // terminal: later observations change nothing
        assert!(matches!(t.on_poll(&ok(), 11), Step::Finished(Verdict::Failed(_))));
        assert!(matches!(t.on_final_check(&ok()), Verdict::Failed(_)));
        assert_eq!(t.resubmissions(), 0);
    }

    #[test]
    fn tracker_final_check_avoids_false_expiry() {
        let mut t = ConfirmationTracker::new(100);
        assert_eq!(t.on_poll(&pending(), 101), Step::FinalCheck);
        assert_eq!(t.on_final_check(&ok()), Verdict::Landed);

        let mut t = ConfirmationTracker::new(100);
        assert_eq!(t.on_poll(&pending(), 150), Step::FinalCheck);
        assert_eq!(t.on_final_check(&pending()), Verdict::Expired);
        assert_eq!(t.on_poll(&pending(), 99), Step::Finished(Verdict::Expired));
    }

    #[test]
    fn fee_budget_conversion() {
        let fee = PriorityFee::from_budget(5_000, 200_000);
        assert_eq!(fee.micro_lamports, 25_000);
        assert_eq!(fee.total_lamports(), 5_000);
        assert_eq!(PriorityFee::from_budget(1, 0).compute_unit_limit, 1);
    }

    /// Scripted network: statuses are served in order, height advances per read.
    struct ScriptedNetwork {
        statuses: Mutex<VecDeque<SignatureStatus>>,
        height: AtomicU64,
        height_step: u64,
        submits: AtomicU64,
        simulation: Simulation,
    }

    impl ScriptedNetwork {
        fn new(statuses: Vec<SignatureStatus>, height_step: u64) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                height: AtomicU64::new(1_000),
                height_step,
                submits: AtomicU64::new(0),
                simulation: Simulation {
                    units_consumed: Some(10_000),
                    ..Simulation::default()
                },
            }
        }
    }

    #[async_trait]
    impl NetworkSubmitter for ScriptedNetwork {
        async fn submit_raw(&self, _bytes: &[u8]) -> Result<(), AppError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn signature_status(&self, _signature: &Signature) -> Result<SignatureStatus, AppError> {
            Ok(self.statuses.lock().unwrap().pop_front().unwrap_or(SignatureStatus::Pending))
        }

        async fn block_height(&self) -> Result<u64, AppError> {
            Ok(self.height.fetch_add(self.height_step, Ordering::SeqCst))
        }

        async fn latest_blockhash(&self) -> Result<Hash, AppError> {
            Ok(Hash::new_unique())
        }

        async fn simulate(&self, _bytes: &[u8]) -> Result<Simulation, AppError> {
            Ok(self.simulation.clone())
        }
    }

    struct Budget {
        first: Option<u64>,
        retry: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl Operator for Budget {
        async fn confirm_summary(&self, _summary: &BalanceSummary) -> bool {
            true
        }

        async fn fee_budget(&self, _request: &FeeRequest) -> Option<u64> {
            self.first
        }

        async fn retry_after_expiry(&self, _request: &FeeRequest) -> Option<u64> {
            self.retry.lock().unwrap().pop()
        }
    }

    fn batch() -> TransactionBatch {
        TransactionBatch {
            groups: vec![InstructionGroup {
                label: GroupLabel {
                    index: 5,
                    action: ActionKind::Open,
                },
                instructions: vec![Instruction::new_with_bytes(Pubkey::new_unique(), &[1, 2, 3], vec![])],
            }],
        }
    }

    fn dispatcher(network: Arc<ScriptedNetwork>, operator: Arc<dyn Operator>, fee_mode: FeeMode) -> Dispatcher {
        Dispatcher::new(
            network,
            operator,
            Arc::new(Keypair::new()),
            DispatchSettings {
                poll_interval: Duration::from_millis(1),
                validity_lookahead: 3,
                fee_mode,
            },
            Arc::new(ReconcileStats::default()),
        )
    }

    const POSITION: BatchPosition = BatchPosition { number: 1, of: 1 };

    #[tokio::test]
    async fn lands_on_first_poll() {
        let network = Arc::new(ScriptedNetwork::new(vec![ok()], 0));
        let d = dispatcher(network.clone(), Arc::new(AutoApprove::default()), FeeMode::Fixed(PriorityFee::placeholder()));
        let outcome = d.dispatch(&batch(), POSITION, &[]).await.unwrap();
        assert!(outcome.landed());
        assert_eq!(network.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ledger_error_is_not_landed_and_stops_sending() {
        let network = Arc::new(ScriptedNetwork::new(vec![pending(), failed(), ok()], 0));
        let d = dispatcher(network.clone(), Arc::new(AutoApprove::default()), FeeMode::Fixed(PriorityFee::placeholder()));
        let outcome = d.dispatch(&batch(), POSITION, &[]).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        assert_eq!(network.submits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expires_after_window() {
        let network = Arc::new(ScriptedNetwork::new(Vec::new(), 2));
        let d = dispatcher(network.clone(), Arc::new(AutoApprove::default()), FeeMode::Fixed(PriorityFee::placeholder()));
        let outcome = d.dispatch(&batch(), POSITION, &[]).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Expired { .. }));
        // heights read: 1000 (ceiling 1003), 1002 resend, 1004 final check
        assert_eq!(network.submits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn negotiated_mode_retries_with_new_fee_after_expiry() {
        let network = Arc::new(ScriptedNetwork::new(Vec::new(), 10));
        let operator = Arc::new(Budget {
            first: Some(1_000),
            retry: Mutex::new(vec![5_000]),
        });
        let d = dispatcher(network.clone(), operator, FeeMode::Negotiated { margin_bps: 12_000 });
        let outcome = d.dispatch(&batch(), POSITION, &[]).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Expired { .. }));
        // one submission per round, two rounds
        assert_eq!(network.submits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn negotiated_mode_honours_decline() {
        let network = Arc::new(ScriptedNetwork::new(vec![ok()], 0));
        let operator = Arc::new(Budget {
            first: None,
            retry: Mutex::new(Vec::new()),
        });
        let d = dispatcher(network.clone(), operator, FeeMode::Negotiated { margin_bps: 12_000 });
        assert_eq!(d.dispatch(&batch(), POSITION, &[]).await.unwrap(), DispatchOutcome::Declined);
        assert_eq!(network.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn simulation_error_stops_before_submission() {
        let mut scripted = ScriptedNetwork::new(Vec::new(), 0);
        scripted.simulation.error = Some("InstructionError".into());
        let network = Arc::new(scripted);
        let operator = Arc::new(Budget {
            first: Some(1),
            retry: Mutex::new(Vec::new()),
        });
        let d = dispatcher(network.clone(), operator, FeeMode::Negotiated { margin_bps: 12_000 });
        let outcome = d.dispatch(&batch(), POSITION, &[]).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::SimulationFailed { .. }));
        assert_eq!(network.submits.load(Ordering::SeqCst), 0);
    }
}
