// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::AppError;
use alloy::network::Ethereum;
use alloy::providers::{Provider, RootProvider};
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &str) -> Result<HttpProvider, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        Ok(RootProvider::new_http(url))
    }
}

/// Ask the node which chain it serves; used when `chain_id` is not configured.
pub async fn detect_chain_id(provider: &HttpProvider) -> Result<u64, AppError> {
    provider
        .get_chain_id()
        .await
        .map_err(|e| AppError::Connection(format!("chain_id detect failed: {e}")))
}
