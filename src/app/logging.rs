// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const QUIET_DEPENDENCIES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "solana_sdk"];

/// A bare level gets quiet transport crates; full directive strings pass through.
pub fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.is_empty() {
        return "info".to_string();
    }
    if normalized.contains(',') || normalized.contains('=') {
        return normalized.to_string();
    }
    let mut spec = normalized.to_string();
    for module in QUIET_DEPENDENCIES {
        spec.push_str(&format!(",{module}=warn"));
    }
    spec
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    let spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // A second init (tests, embedding) keeps the existing subscriber.
    let installed = if json_format {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()
            .is_ok()
    } else {
        registry
            .with(fmt::layer().with_target(true).compact())
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(
            target: "logging",
            filter = %spec,
            format = if json_format { "json" } else { "compact" },
            "Logging initialized"
        );
    }
}
