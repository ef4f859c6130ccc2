// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::services::reconcile::dispatcher::DispatchOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default, Debug)]
pub struct ReconcileStats {
    pub passes: AtomicU64,
    pub batches_built: AtomicU64,
    pub batches_landed: AtomicU64,
    pub batches_failed: AtomicU64,
    pub batches_expired: AtomicU64,
    pub batches_skipped: AtomicU64,
    pub submissions: AtomicU64,
    pub resubmissions: AtomicU64,
}

impl ReconcileStats {
    pub fn record_outcome(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Landed { .. } => &self.batches_landed,
            DispatchOutcome::Failed { .. } | DispatchOutcome::SimulationFailed { .. } => &self.batches_failed,
            DispatchOutcome::Expired { .. } => &self.batches_expired,
            DispatchOutcome::Declined => &self.batches_skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn log_summary(&self) {
        tracing::info!(
            target: "reconcile_summary",
            passes = self.passes.load(Ordering::Relaxed),
            built = self.batches_built.load(Ordering::Relaxed),
            landed = self.batches_landed.load(Ordering::Relaxed),
            failed = self.batches_failed.load(Ordering::Relaxed),
            expired = self.batches_expired.load(Ordering::Relaxed),
            skipped = self.batches_skipped.load(Ordering::Relaxed),
            submissions = self.submissions.load(Ordering::Relaxed),
            resubmissions = self.resubmissions.load(Ordering::Relaxed),
            "Reconcile summary"
        );
    }
}
