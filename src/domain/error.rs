// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::bundle::ActionKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Inconsistent ledger snapshot: {0}")]
    Consistency(String),

    #[error("Instruction group for slot {index} ({action}) exceeds the transaction size limit")]
    OversizedGroup { index: u16, action: ActionKind },

    #[error("Fixed-point arithmetic failed: {0}")]
    Math(String),

    #[error("Transaction failed: {signature}, reason: {reason}")]
    Transaction { signature: String, reason: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn math(message: impl Into<String>) -> Self {
        AppError::Math(message.into())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<csv_async::Error> for AppError {
    fn from(err: csv_async::Error) -> Self {
        AppError::validation("target table", err.to_string())
    }
}
