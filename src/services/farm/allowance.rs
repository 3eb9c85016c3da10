// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::retry::with_backoff;
use crate::domain::error::AppError;
use crate::network::contracts::ERC20;
use crate::network::gas::FeeEstimator;
use crate::network::provider::HttpProvider;
use crate::network::submitter::{TxOutcome, TxSubmitter};
use alloy::primitives::{Address, B256, TxKind, U256};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Token-contract operations the allowance step needs. `approve_max` submits
/// `approve(spender, uint256.max)` and blocks until the receipt is observed.
#[async_trait]
pub trait TokenApprovals: Send + Sync {
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, AppError>;
    async fn approve_max(&self, spender: Address) -> Result<B256, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceStatus {
    /// Existing allowance already covers the run; no transaction issued.
    Sufficient,
    Approved(B256),
}

/// Runs once before the swap loop. Approves for the maximum representable
/// amount so one approval covers every future run on this route.
pub struct AllowanceManager<T> {
    token: T,
    owner: Address,
    spender: Address,
}

impl<T: TokenApprovals> AllowanceManager<T> {
    pub fn new(token: T, owner: Address, spender: Address) -> Self {
        Self {
            token,
            owner,
            spender,
        }
    }

    /// Any failure here is fatal to the run: swaps must not start without a
    /// confirmed (or pre-existing) allowance. A declined prompt keeps its
    /// rejection classification so the caller can stop cleanly.
    pub async fn ensure(&self, required: U256) -> Result<AllowanceStatus, AppError> {
        let current = self
            .token
            .allowance(self.owner, self.spender)
            .await
            .map_err(|e| AppError::Allowance(format!("Allowance query failed: {}", e)))?;

        if current >= required {
            tracing::info!(
                target: "allowance",
                spender = %self.spender,
                current = %current,
                required = %required,
                "Allowance sufficient; no approval needed"
            );
            return Ok(AllowanceStatus::Sufficient);
        }

        tracing::info!(
            target: "allowance",
            spender = %self.spender,
            current = %current,
            required = %required,
            "Allowance insufficient; approving max"
        );
        let hash = self.token.approve_max(self.spender).await.map_err(|e| {
            if e.is_user_rejection() {
                e
            } else {
                AppError::Allowance(format!("Approval failed: {}", e))
            }
        })?;

        tracing::info!(target: "allowance", hash = %format!("{:#x}", hash), "Approval confirmed");
        Ok(AllowanceStatus::Approved(hash))
    }
}

/// On-chain implementation over an ERC-20 token, dispatching the approval
/// through the same submitter and fee planner the swaps use.
pub struct Erc20Approvals {
    provider: HttpProvider,
    token: Address,
    owner: Address,
    submitter: Arc<dyn TxSubmitter>,
    fees: Arc<dyn FeeEstimator>,
}

impl Erc20Approvals {
    pub fn new(
        provider: HttpProvider,
        token: Address,
        owner: Address,
        submitter: Arc<dyn TxSubmitter>,
        fees: Arc<dyn FeeEstimator>,
    ) -> Self {
        Self {
            provider,
            token,
            owner,
            submitter,
            fees,
        }
    }
}

#[async_trait]
impl TokenApprovals for Erc20Approvals {
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, AppError> {
        let contract = ERC20::new(self.token, self.provider.clone());
        with_backoff(
            move || {
                let contract = contract.clone();
                async move { contract.allowance(owner, spender).call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("allowance call failed: {}", e)))
    }

    async fn approve_max(&self, spender: Address) -> Result<B256, AppError> {
        let calldata = ERC20::approveCall {
            spender,
            amount: U256::MAX,
        }
        .abi_encode();
        let call = TransactionRequest {
            from: Some(self.owner),
            to: Some(TxKind::Call(self.token)),
            value: Some(U256::ZERO),
            input: TransactionInput::new(calldata.into()),
            ..Default::default()
        };

        let plan = self.fees.plan(&call).await;
        let hash = self.submitter.submit(&call, &plan).await?;
        match self.submitter.confirm(hash).await? {
            TxOutcome::Success => Ok(hash),
            TxOutcome::Reverted => Err(AppError::Transaction {
                hash: format!("{:#x}", hash),
                reason: "approval reverted on chain".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeToken {
        allowance: U256,
        approvals: AtomicUsize,
        reject: bool,
    }

    impl FakeToken {
        fn with_allowance(allowance: U256) -> Self {
            Self {
                allowance,
                approvals: AtomicUsize::new(0),
                reject: false,
            }
        }
    }

    #[async_trait]
    impl TokenApprovals for &FakeToken {
        async fn allowance(&self, _owner: Address, _spender: Address) -> Result<U256, AppError> {
            Ok(self.allowance)
        }

        async fn approve_max(&self, _spender: Address) -> Result<B256, AppError> {
            self.approvals.fetch_add(1, Ordering::Relaxed);
            if self.reject {
                return Err(AppError::Rejected("user rejected the request (code 4001)".into()));
            }
            Ok(B256::from([0xabu8; 32]))
        }
    }

    fn manager(token: &FakeToken) -> AllowanceManager<&FakeToken> {
        AllowanceManager::new(token, Address::from([1u8; 20]), Address::from([2u8; 20]))
    }

    #[tokio::test]
    async fn sufficient_allowance_issues_no_transaction() {
        let token = FakeToken::with_allowance(U256::from(1_000u64));
        let status = manager(&token).ensure(U256::from(100u64)).await.unwrap();

        assert_eq!(status, AllowanceStatus::Sufficient);
        assert_eq!(token.approvals.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn insufficient_allowance_issues_exactly_one_approval() {
        let token = FakeToken::with_allowance(U256::ZERO);
        let status = manager(&token).ensure(U256::from(100u64)).await.unwrap();

        assert!(matches!(status, AllowanceStatus::Approved(_)));
        assert_eq!(token.approvals.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn repeated_checks_with_sufficient_allowance_stay_idempotent() {
        let token = FakeToken::with_allowance(U256::from(u64::MAX));
        let mgr = manager(&token);
        mgr.ensure(U256::from(100u64)).await.unwrap();
        mgr.ensure(U256::from(100u64)).await.unwrap();

        assert_eq!(token.approvals.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn rejected_approval_keeps_its_classification() {
        let token = FakeToken {
            allowance: U256::ZERO,
            approvals: AtomicUsize::new(0),
            reject: true,
        };
        let err = manager(&token).ensure(U256::from(100u64)).await.unwrap_err();
        assert!(err.is_user_rejection());
    }
}
