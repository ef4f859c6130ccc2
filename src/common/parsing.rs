// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

pub fn parse_boolish(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Strip the quoting people paste around values in env files.
pub fn unquote(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'')
}

pub fn parse_pubkey(field: &str, raw: &str) -> Result<Pubkey, AppError> {
    Pubkey::from_str(unquote(raw))
        .map_err(|e| AppError::Config(format!("{field}: invalid public key {raw:?} ({e})")))
}

/// Comma, space or semicolon separated keys; empty entries are skipped.
pub fn parse_pubkey_list(field: &str, raw: &str) -> Result<Vec<Pubkey>, AppError> {
    unquote(raw)
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| parse_pubkey(field, part))
        .collect()
}

/// Parse a table cell, naming the row and column on failure.
pub fn parse_cell<T>(row: usize, column: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        AppError::validation(format!("row {row} {column}"), format!("{raw:?} is not valid ({e})"))
    })
}
