// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "DATA_DIR";

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&path))
        .unwrap_or(path)
}

/// Data directory: explicit value, then `DATA_DIR`, then `./data`.
pub fn resolve_data_dir(explicit: Option<&str>) -> PathBuf {
    let env = std::env::var(DATA_DIR_ENV).ok();
    let chosen = non_empty(explicit).or_else(|| non_empty(env.as_deref())).unwrap_or("data");
    absolute(PathBuf::from(chosen))
}

/// Absolute paths pass through; relative ones land in the data directory
/// unless they already exist relative to the working directory.
pub fn resolve_data_path(raw: &str, explicit_data_dir: Option<&str>) -> PathBuf {
    let path = Path::new(raw.trim());
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if path.exists() {
        return absolute(path.to_path_buf());
    }
    let relative = path.strip_prefix("data").unwrap_or(path);
    resolve_data_dir(explicit_data_dir).join(relative)
}

pub fn resolve_required_data_path(raw: &str, explicit_data_dir: Option<&str>) -> Result<PathBuf, AppError> {
    let resolved = resolve_data_path(raw, explicit_data_dir);
    if resolved.is_file() {
        return Ok(resolved);
    }
    Err(AppError::Config(format!(
        "{raw}: expected a file at {}; set DATA_DIR or an absolute path",
        resolved.display()
    )))
}
