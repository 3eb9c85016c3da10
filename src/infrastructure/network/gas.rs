// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::GasMode;
use crate::common::retry::with_backoff;
use crate::domain::constants::{
    FALLBACK_GAS_LIMIT, GAS_BUFFER_DEN, GAS_BUFFER_NUM, WEI_PER_GWEI,
};
use crate::domain::error::AppError;
use crate::network::provider::HttpProvider;
use alloy::providers::Provider;
use alloy::rpc::types::{BlockNumberOrTag, TransactionRequest};
use async_trait::async_trait;
use std::time::Duration;

/// Per-request fee decision. Never reused: the base fee moves block to block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPlan {
    pub gas_limit: u64,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl GasPlan {
    pub fn has_fee_overrides(&self) -> bool {
        self.max_fee_per_gas.is_some() && self.max_priority_fee_per_gas.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeePolicy {
    pub gas_mode: GasMode,
    pub priority_fee_wei: u128,
    pub max_fee_add_wei: u128,
}

#[async_trait]
pub trait FeeEstimator: Send + Sync {
    /// Infallible by design: simulation failures fall back to a fixed gas
    /// limit and fee failures drop the overrides. Both are logged.
    async fn plan(&self, call: &TransactionRequest) -> GasPlan;
}

pub struct NodeFeeEstimator {
    provider: HttpProvider,
    policy: FeePolicy,
}

impl NodeFeeEstimator {
    pub fn new(provider: HttpProvider, policy: FeePolicy) -> Self {
        Self { provider, policy }
    }

    async fn simulate_gas(&self, call: &TransactionRequest) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        let call = call.clone();
        with_backoff(
            move || {
                let provider = provider.clone();
                let call = call.clone();
                async move { provider.estimate_gas(call).await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Simulation(format!("eth_estimateGas failed: {}", e)))
    }

    /// Latest block's base fee, or the base component of the node's general
    /// EIP-1559 estimate when the header does not carry one.
    async fn current_base_fee(&self) -> Result<u128, AppError> {
        let header_base = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .ok()
            .flatten()
            .and_then(|block| block.header.base_fee_per_gas)
            .map(|v| v as u128);

        if let Some(base) = header_base {
            return Ok(base);
        }

        let estimate = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(|e| AppError::FeeComputation(format!("Node fee estimate failed: {}", e)))?;
        Ok(estimate
            .max_fee_per_gas
            .saturating_sub(estimate.max_priority_fee_per_gas))
    }
}

#[async_trait]
impl FeeEstimator for NodeFeeEstimator {
    async fn plan(&self, call: &TransactionRequest) -> GasPlan {
        let gas_limit = gas_limit_or_fallback(self.simulate_gas(call).await);

        let (max_fee_per_gas, max_priority_fee_per_gas) = match self.policy.gas_mode {
            GasMode::Normal => (None, None),
            GasMode::Slow => match self.current_base_fee().await {
                Ok(base_fee) => {
                    let (max_fee, priority) = slow_fee_pair(
                        base_fee,
                        self.policy.priority_fee_wei,
                        self.policy.max_fee_add_wei,
                    );
                    (Some(max_fee), Some(priority))
                }
                Err(e) => {
                    tracing::warn!(
                        target: "gas",
                        error = %e,
                        "Fee computation failed; submitting without fee overrides"
                    );
                    (None, None)
                }
            },
        };

        GasPlan {
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }
}

/// Simulated usage plus the safety buffer, or the fixed fallback when the
/// simulation could not run.
pub fn gas_limit_or_fallback(simulated: Result<u64, AppError>) -> u64 {
    match simulated {
        Ok(estimate) => buffered_gas_limit(estimate),
        Err(e) => {
            tracing::warn!(
                target: "gas",
                error = %e,
                fallback = FALLBACK_GAS_LIMIT,
                "Gas simulation failed; using fallback limit"
            );
            FALLBACK_GAS_LIMIT
        }
    }
}

pub fn buffered_gas_limit(estimate: u64) -> u64 {
    estimate.saturating_mul(GAS_BUFFER_NUM) / GAS_BUFFER_DEN
}

/// `maxFeePerGas = baseFee + addition + priority`, `maxPriorityFeePerGas = priority`.
pub fn slow_fee_pair(base_fee: u128, priority_wei: u128, add_wei: u128) -> (u128, u128) {
    (
        base_fee.saturating_add(add_wei).saturating_add(priority_wei),
        priority_wei,
    )
}

pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * WEI_PER_GWEI as f64).round() as u128
}
