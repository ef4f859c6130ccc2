// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::data_path::resolve_required_data_path;
use crate::common::parsing::{parse_boolish, parse_pubkey, parse_pubkey_list};
use crate::domain::constants;
use crate::domain::error::AppError;
use crate::services::quote::slippage::Slippage;
use crate::services::reconcile::dispatcher::{DispatchSettings, FeeMode, PriorityFee};
use crate::services::reconcile::ports::AutoApprove;
use crate::services::reconcile::ReconcileParams;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use solana_sdk::pubkey::Pubkey;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,
    pub data_dir: Option<String>,

    // Network
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    // Bundle
    pub position_bundle: String,
    pub whirlpool: String,
    pub tick_spacing: u16,
    pub target_path: Option<String>,
    #[serde(default, deserialize_with = "deserialize_key_list")]
    pub lookup_tables: Vec<String>,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,

    // Dispatch
    #[serde(default)]
    pub priority_fee_micro_lamports: u64,
    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,
    /// Padding applied to simulated compute units when fees are negotiated.
    #[serde(default = "default_compute_unit_margin_bps")]
    pub compute_unit_margin_bps: u64,
    #[serde(default = "default_false")]
    pub negotiate_fees: bool,
    /// Lamport budget the non-interactive operator answers with.
    pub fee_budget_lamports: Option<u64>,
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
    #[serde(default = "default_validity_lookahead_blocks")]
    pub validity_lookahead_blocks: u64,
}

// Defaults
fn default_false() -> bool {
    false
}
fn default_rpc_url() -> String {
    "http://127.0.0.1:8899".to_string()
}
fn default_rpc_timeout_ms() -> u64 {
    30_000
}
fn default_slippage_bps() -> u16 {
    constants::DEFAULT_SLIPPAGE_BPS
}
fn default_max_passes() -> u32 {
    3
}
fn default_compute_unit_limit() -> u32 {
    constants::DEFAULT_COMPUTE_UNIT_LIMIT
}
fn default_compute_unit_margin_bps() -> u64 {
    12_000
}
fn default_confirm_poll_ms() -> u64 {
    constants::DEFAULT_CONFIRM_POLL_MS
}
fn default_validity_lookahead_blocks() -> u64 {
    constants::BLOCKHASH_VALIDITY_LOOKAHEAD
}

const DEFAULT_TARGET_PATH: &str = "data/target_table.csv";

fn deserialize_key_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, SeqAccess, Visitor};
    use std::fmt;

    struct KeyListVisitor;

    impl<'de> Visitor<'de> for KeyListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of public keys or a comma-separated string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(v.split(|c: char| c == ',' || c.is_whitespace())
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(ToString::to_string)
                .collect())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(elem) = seq.next_element::<String>()? {
                out.push(elem);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(KeyListVisitor)
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let selected_config = resolve_config_path(path);
        let mut builder = Config::builder();

        if let Some(ref selected_path) = selected_config {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // CLI (in main) > env/.env > selected profile file.
        builder = builder.add_source(Environment::default());

        let mut settings: GlobalSettings = builder.build()?.try_deserialize()?;

        if let Some(negotiate) = env_bool("NEGOTIATE_FEES") {
            settings.negotiate_fees = negotiate;
        }

        if settings.tick_spacing == 0 {
            return Err(AppError::Config("TICK_SPACING must be positive".to_string()));
        }
        settings.rpc_url_value()?;

        tracing::debug!(
            target: "config",
            file = selected_config.as_deref().unwrap_or("config.toml"),
            rpc = %settings.rpc_url,
            "Settings loaded"
        );
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    fn data_dir_value(&self) -> Option<String> {
        std::env::var("DATA_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.data_dir
                    .as_ref()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
    }

    fn target_path_raw(&self) -> &str {
        self.target_path
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_TARGET_PATH)
    }

    /// Target table location; the file must exist.
    pub fn target_path(&self) -> Result<PathBuf, AppError> {
        resolve_required_data_path(self.target_path_raw(), self.data_dir_value().as_deref())
    }

    pub fn rpc_url_value(&self) -> Result<Url, AppError> {
        Url::parse(self.rpc_url.trim())
            .map_err(|e| AppError::Config(format!("RPC_URL: invalid url {:?} ({e})", self.rpc_url)))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms.max(1))
    }

    pub fn position_bundle_key(&self) -> Result<Pubkey, AppError> {
        parse_pubkey("POSITION_BUNDLE", &self.position_bundle)
    }

    pub fn whirlpool_key(&self) -> Result<Pubkey, AppError> {
        parse_pubkey("WHIRLPOOL", &self.whirlpool)
    }

    pub fn lookup_table_keys(&self) -> Result<Vec<Pubkey>, AppError> {
        parse_pubkey_list("LOOKUP_TABLES", &self.lookup_tables.join(","))
    }

    pub fn slippage(&self) -> Result<Slippage, AppError> {
        Slippage::from_bps(self.slippage_bps)
            .map_err(|e| AppError::Config(format!("SLIPPAGE_BPS: {e}")))
    }

    pub fn confirm_poll_ms_value(&self) -> u64 {
        self.confirm_poll_ms.max(constants::MIN_CONFIRM_POLL_MS)
    }

    pub fn compute_unit_margin_bps_value(&self) -> u64 {
        self.compute_unit_margin_bps.max(constants::BPS_DENOMINATOR)
    }

    pub fn compute_unit_limit_value(&self) -> u32 {
        self.compute_unit_limit
            .clamp(1, constants::MAX_COMPUTE_UNIT_LIMIT)
    }

    pub fn validity_lookahead_value(&self) -> u64 {
        self.validity_lookahead_blocks.max(1)
    }

    pub fn max_passes_value(&self) -> u32 {
        self.max_passes.max(1)
    }

    pub fn fee_mode(&self) -> FeeMode {
        if self.negotiate_fees {
            FeeMode::Negotiated {
                margin_bps: self.compute_unit_margin_bps_value(),
            }
        } else {
            FeeMode::Fixed(PriorityFee {
                compute_unit_limit: self.compute_unit_limit_value(),
                micro_lamports: self.priority_fee_micro_lamports,
            })
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            poll_interval: Duration::from_millis(self.confirm_poll_ms_value()),
            validity_lookahead: self.validity_lookahead_value(),
            fee_mode: self.fee_mode(),
        }
    }

    /// Non-interactive operator answering fee prompts with the configured budget.
    pub fn auto_operator(&self) -> AutoApprove {
        AutoApprove {
            fee_budget_lamports: self.fee_budget_lamports,
        }
    }

    pub fn reconcile_params(&self) -> Result<ReconcileParams, AppError> {
        Ok(ReconcileParams {
            position_bundle: self.position_bundle_key()?,
            pool: self.whirlpool_key()?,
            tick_spacing: self.tick_spacing,
            slippage: self.slippage()?,
            lookup_tables: self.lookup_table_keys()?,
            max_passes: self.max_passes_value(),
            dispatch: self.dispatch_settings(),
        })
    }
}

fn env_bool(key: &str) -> Option<bool> {
    parse_boolish(&std::env::var(key).ok()?)
}

fn resolve_config_path(path: Option<&str>) -> Option<String> {
    if let Some(path) = path {
        return Some(path.to_string());
    }
    detect_active_config_file()
}

fn detect_active_config_file() -> Option<String> {
    let priority_files = [
        "config.mainnet.toml",
        "config.devnet.toml",
        "config.localnet.toml",
        "config.toml",
    ];

    for file in priority_files.iter() {
        if let Some(true) = config_has_active_flag(file) {
            return Some((*file).to_string());
        }
    }

    // Fallback: any config.*.toml in the working directory marked active.
    if let Ok(entries) = fs::read_dir(".") {
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str())
                && name.starts_with("config.")
                && name.ends_with(".toml")
                && let Some(true) = config_has_active_flag(name)
            {
                return Some(name.to_string());
            }
        }
    }

    None
}

fn config_has_active_flag(path: &str) -> Option<bool> {
    let p = Path::new(path);
    if !p.exists() {
        return None;
    }

    Config::builder()
        .add_source(File::from(p))
        .build()
        .ok()?
        .get_bool("THIS_ACTIVE")
        .ok()
}
