// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{RECEIPT_POLL_MS, USER_REJECTED_CODE};
use crate::domain::error::AppError;
use crate::network::gas::GasPlan;
use crate::network::nonce::NonceManager;
use crate::network::provider::HttpProvider;
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::TxSignerSync;
use alloy::primitives::B256;
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Success,
    Reverted,
}

/// One seam over the two ways a transaction gets authorized: a local key that
/// signs silently, or a human confirming each signature at the terminal.
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Sign and broadcast. Returns the transaction hash once the network has
    /// accepted the payload; the transaction is not necessarily mined.
    async fn submit(&self, call: &TransactionRequest, plan: &GasPlan) -> Result<B256, AppError>;

    /// Poll until the receipt is known. There is deliberately no timeout: an
    /// unmined transaction stays pending until its on-chain deadline lapses
    /// and is the operator's responsibility to resolve.
    async fn confirm(&self, hash: B256) -> Result<TxOutcome, AppError>;
}

pub struct LocalKeySubmitter {
    provider: HttpProvider,
    signer: PrivateKeySigner,
    nonce: NonceManager,
    chain_id: u64,
}

impl LocalKeySubmitter {
    pub fn new(
        provider: HttpProvider,
        signer: PrivateKeySigner,
        nonce: NonceManager,
        chain_id: u64,
    ) -> Self {
        Self {
            provider,
            signer,
            nonce,
            chain_id,
        }
    }

    async fn fee_pair(&self, plan: &GasPlan) -> Result<(u128, u128), AppError> {
        if let (Some(max_fee), Some(priority)) =
            (plan.max_fee_per_gas, plan.max_priority_fee_per_gas)
        {
            return Ok((max_fee, priority));
        }
        // No overrides in the plan: take the node's current estimate.
        let estimate = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(|e| AppError::Connection(format!("Node fee estimate failed: {}", e)))?;
        Ok((estimate.max_fee_per_gas, estimate.max_priority_fee_per_gas))
    }
}

#[async_trait]
impl TxSubmitter for LocalKeySubmitter {
    async fn submit(&self, call: &TransactionRequest, plan: &GasPlan) -> Result<B256, AppError> {
        let to = call
            .to
            .ok_or_else(|| AppError::Submission("Missing `to` in tx request".into()))?;
        let (max_fee_per_gas, max_priority_fee_per_gas) = self.fee_pair(plan).await?;
        let nonce = self.nonce.allocate().await?;

        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit: plan.gas_limit,
            to,
            value: call.value.unwrap_or_default(),
            access_list: AccessList::default(),
            input: call.input.clone().into_input().unwrap_or_default(),
        };

        let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
            .map_err(|e| AppError::Submission(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        let raw = signed.encoded_2718();

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.provider.send_raw_transaction(raw.as_slice()).await {
                Ok(_) => return Ok(*signed.tx_hash()),
                Err(e) if attempts < 2 => {
                    tracing::warn!(target: "submitter", error = %e, attempt = attempts, "Retrying raw tx send");
                }
                Err(e) => {
                    self.nonce.resync().await;
                    return Err(classify_send_error(e.to_string()));
                }
            }
        }
    }

    async fn confirm(&self, hash: B256) -> Result<TxOutcome, AppError> {
        let poll = Duration::from_millis(RECEIPT_POLL_MS);
        loop {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    return if receipt.status() {
                        Ok(TxOutcome::Success)
                    } else {
                        Ok(TxOutcome::Reverted)
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        target: "submitter",
                        error = %e,
                        hash = %format!("{:#x}", hash),
                        "Receipt lookup error; retrying"
                    );
                }
            }
            tokio::time::sleep(poll).await;
        }
    }
}

fn classify_send_error(message: String) -> AppError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient funds") {
        AppError::InsufficientFunds(message)
    } else {
        AppError::Submission(message)
    }
}

/// Wraps a [`LocalKeySubmitter`] behind a per-transaction terminal prompt.
/// Declining the prompt fails with the wallet rejection code so the run loop
/// stops cleanly instead of treating it as a crash.
pub struct PromptSubmitter {
    inner: LocalKeySubmitter,
    prompted: AtomicU32,
}

impl PromptSubmitter {
    pub fn new(inner: LocalKeySubmitter) -> Self {
        Self {
            inner,
            prompted: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TxSubmitter for PromptSubmitter {
    async fn submit(&self, call: &TransactionRequest, plan: &GasPlan) -> Result<B256, AppError> {
        let n = self.prompted.fetch_add(1, Ordering::Relaxed) + 1;
        let approved = tokio::task::spawn_blocking(move || prompt_for_signature(n))
            .await
            .map_err(|e| AppError::Submission(format!("Prompt task failed: {}", e)))??;

        if !approved {
            return Err(AppError::Rejected(format!(
                "user rejected the request (code {})",
                USER_REJECTED_CODE
            )));
        }
        self.inner.submit(call, plan).await
    }

    async fn confirm(&self, hash: B256) -> Result<TxOutcome, AppError> {
        self.inner.confirm(hash).await
    }
}

fn prompt_for_signature(n: u32) -> Result<bool, AppError> {
    use std::io::{BufRead, Write};

    let mut out = std::io::stdout();
    write!(out, "Sign and submit transaction #{}? [y/N] ", n)
        .and_then(|_| out.flush())
        .map_err(|e| AppError::Submission(format!("Prompt write failed: {}", e)))?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::Submission(format!("Prompt read failed: {}", e)))?;

    Ok(is_affirmative(&line))
}

fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
