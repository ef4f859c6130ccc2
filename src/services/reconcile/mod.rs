// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod balance;
pub mod batcher;
pub mod differ;
pub mod dispatcher;
pub mod engine;
pub mod ports;
pub mod stats;

pub use engine::{ReconcileContext, ReconcileParams, ReconcileReport, Reconciler};
