// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::USER_REJECTED_CODE;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Signature request rejected: {0}")]
    Rejected(String),

    #[error("Gas simulation failed: {0}")]
    Simulation(String),

    #[error("Fee computation failed: {0}")]
    FeeComputation(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Allowance step failed: {0}")]
    Allowance(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Transaction failed: {hash}, reason: {reason}")]
    Transaction { hash: String, reason: String },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// A human declined the signature prompt. Wallet stacks surface this as
    /// EIP-1193 code 4001; node proxies sometimes only forward the message text.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            AppError::Rejected(_) => true,
            AppError::Submission(msg) => {
                let lower = msg.to_ascii_lowercase();
                lower.contains("user rejected") || lower.contains(&USER_REJECTED_CODE.to_string())
            }
            _ => false,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
