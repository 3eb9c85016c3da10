// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::retry::with_backoff;
use crate::domain::error::AppError;
use crate::network::provider::HttpProvider;
use alloy::primitives::Address;
use alloy::providers::Provider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Hands out strictly increasing nonces for one sender. The pending count is
/// fetched once and advanced locally; `resync` discards the local view after a
/// failed dispatch so the next allocation re-reads the chain.
#[derive(Clone)]
pub struct NonceManager {
    provider: HttpProvider,
    address: Address,
    next: Arc<Mutex<Option<u64>>>,
}

impl NonceManager {
    pub fn new(provider: HttpProvider, address: Address) -> Self {
        Self {
            provider,
            address,
            next: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn allocate(&self) -> Result<u64, AppError> {
        let mut guard = self.next.lock().await;
        let base = match *guard {
            Some(n) => n,
            None => self.fetch_pending().await?,
        };
        *guard = Some(base + 1);
        Ok(base)
    }

    pub async fn resync(&self) {
        let mut guard = self.next.lock().await;
        *guard = None;
        tracing::debug!(target: "nonce", address = %self.address, "Nonce view discarded; will re-read chain");
    }

    async fn fetch_pending(&self) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        let address = self.address;
        with_backoff(
            move || {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }
}
