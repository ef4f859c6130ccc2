// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use bundle_reconciler::app::config::GlobalSettings;
use bundle_reconciler::app::logging::setup_logging;
use bundle_reconciler::domain::bundle::TargetTable;
use bundle_reconciler::domain::error::AppError;
use bundle_reconciler::infrastructure::data::CsvTargetSource;
use bundle_reconciler::infrastructure::network::RpcSubmitter;
use bundle_reconciler::services::reconcile::ports::{NetworkSubmitter, SignatureStatus, TargetStateSource};
use clap::{Parser, Subcommand};
use solana_sdk::signature::Signature;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(author, version, about = "position bundle reconciler")]
struct Cli {
    /// Path to config file (default: active config.*.toml, then config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Log level or full filter directive (overrides DEBUG)
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load settings and the target table and report their shape. No network reads.
    Validate {
        /// Target table path (overrides TARGET_PATH)
        #[arg(long)]
        target: Option<String>,
    },
    /// Query one signature and the current block height.
    Status { signature: String },
}

async fn validate(settings: &GlobalSettings, target: Option<String>) -> Result<(), AppError> {
    let params = settings.reconcile_params()?;
    let path = match target {
        Some(raw) => std::path::PathBuf::from(raw),
        None => settings.target_path()?,
    };
    let source = CsvTargetSource::new(path, params.tick_spacing);
    let table = source.load().await?;
    let layout = match table {
        TargetTable::Ticks(_) => "ticks",
        TargetTable::Prices(_) => "prices",
    };

    tracing::info!(
        target: "config",
        path = %source.path().display(),
        layout,
        open = table.open_count(),
        bundle = %params.position_bundle,
        pool = %params.pool,
        tick_spacing = params.tick_spacing,
        lookup_tables = params.lookup_tables.len(),
        max_passes = params.max_passes,
        fee_mode = ?params.dispatch.fee_mode,
        "Target table valid"
    );
    Ok(())
}

async fn status(settings: &GlobalSettings, raw: &str) -> Result<(), AppError> {
    let signature =
        Signature::from_str(raw.trim()).map_err(|e| AppError::validation("signature", e.to_string()))?;
    let rpc = RpcSubmitter::new(settings.rpc_url_value()?, settings.rpc_timeout())?;
    let (status, height) = futures::try_join!(rpc.signature_status(&signature), rpc.block_height())?;

    match status {
        SignatureStatus::Pending => {
            tracing::info!(target: "rpc", %signature, block_height = height, "Not confirmed")
        }
        SignatureStatus::Confirmed { error: None } => {
            tracing::info!(target: "rpc", %signature, block_height = height, "Confirmed")
        }
        SignatureStatus::Confirmed { error: Some(error) } => {
            tracing::warn!(target: "rpc", %signature, block_height = height, %error, "Confirmed with error")
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    let level = cli
        .log
        .clone()
        .unwrap_or_else(|| if settings.debug { "debug" } else { "info" }.to_string());
    setup_logging(&level, settings.log_json);

    match cli.command {
        Command::Validate { target } => validate(&settings, target).await,
        Command::Status { signature } => status(&settings, &signature).await,
    }
}
