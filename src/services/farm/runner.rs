// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use crate::network::gas::FeeEstimator;
use crate::network::submitter::{TxOutcome, TxSubmitter};
use crate::services::farm::allowance::{AllowanceManager, TokenApprovals};
use crate::services::farm::ledger::{RunLedger, SlotPool, TxStatus};
use crate::services::farm::swaps::{SwapRequest, SwapRoute, swap_call};
use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Immutable per-run parameters, read once at start.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub amount_per_swap: U256,
    pub recipient: Address,
    pub total_swaps: u32,
    pub delay: Duration,
    pub max_pending: usize,
    /// Batch runs wait for each receipt before the next dispatch; interactive
    /// runs fire-and-continue bounded only by the slot pool.
    pub await_confirmation_per_swap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Approving,
    Swapping(u32),
    Stopped,
    Finished,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub attempted: u32,
    pub succeeded: usize,
    pub failed: usize,
    pub state: RunState,
}

/// Owns every piece of per-run mutable state (ledger, slot pool, counters)
/// and is consumed by `run`, so nothing leaks across runs.
pub struct FarmRunner<T> {
    from: Address,
    route: SwapRoute,
    config: RunConfig,
    allowance: AllowanceManager<T>,
    fees: Arc<dyn FeeEstimator>,
    submitter: Arc<dyn TxSubmitter>,
    ledger: Arc<RunLedger>,
    slots: SlotPool,
    cancel: CancellationToken,
    state: RunState,
}

impl<T: TokenApprovals> FarmRunner<T> {
    pub fn new(
        from: Address,
        route: SwapRoute,
        config: RunConfig,
        allowance: AllowanceManager<T>,
        fees: Arc<dyn FeeEstimator>,
        submitter: Arc<dyn TxSubmitter>,
    ) -> Self {
        let slots = SlotPool::new(config.max_pending);
        Self {
            from,
            route,
            config,
            allowance,
            fees,
            submitter,
            ledger: Arc::new(RunLedger::new()),
            slots,
            cancel: CancellationToken::new(),
            state: RunState::Idle,
        }
    }

    /// Clone for wiring an external stop command (e.g. Ctrl-C). Cancellation
    /// is cooperative: it is checked between iterations and never aborts a
    /// transaction already handed to the network.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn ledger(&self) -> Arc<RunLedger> {
        Arc::clone(&self.ledger)
    }

    pub async fn run(mut self) -> Result<RunSummary, AppError> {
        self.transition(RunState::Approving);
        let required = self
            .config
            .amount_per_swap
            .saturating_mul(U256::from(self.config.total_swaps));
        self.allowance.ensure(required).await?;

        let mut watchers: JoinSet<()> = JoinSet::new();
        let mut attempted = 0u32;
        let mut stopped = false;

        for index in 0..self.config.total_swaps {
            if self.cancel.is_cancelled() {
                tracing::info!(target: "farm", index, "Stop requested; not starting next swap");
                stopped = true;
                break;
            }
            self.transition(RunState::Swapping(index));

            let permit = self.slots.acquire().await?;
            debug_assert!(self.slots.in_flight() <= self.slots.capacity());

            let request = SwapRequest::new(self.config.amount_per_swap, self.config.recipient);
            let call = swap_call(self.from, &self.route, &request);
            let plan = self.fees.plan(&call).await;
            let record = self.ledger.open(index, "dispatching swap");
            attempted += 1;

            match self.submitter.submit(&call, &plan).await {
                Ok(hash) => {
                    self.ledger.attach_hash(record, hash);
                    tracing::info!(
                        target: "farm",
                        index,
                        hash = %format!("{:#x}", hash),
                        gas_limit = plan.gas_limit,
                        "Swap dispatched"
                    );
                    if self.config.await_confirmation_per_swap {
                        let outcome = self.submitter.confirm(hash).await;
                        settle_record(&self.ledger, record, index, hash, outcome);
                        drop(permit);
                    } else {
                        let submitter = Arc::clone(&self.submitter);
                        let ledger = Arc::clone(&self.ledger);
                        watchers.spawn(async move {
                            let outcome = submitter.confirm(hash).await;
                            settle_record(&ledger, record, index, hash, outcome);
                            drop(permit);
                        });
                    }
                }
                Err(e) if e.is_user_rejection() => {
                    self.ledger.resolve(record, TxStatus::Error, e.to_string());
                    drop(permit);
                    tracing::warn!(target: "farm", index, error = %e, "User rejected; stopping run");
                    stopped = true;
                    break;
                }
                Err(e) => {
                    self.ledger.resolve(record, TxStatus::Error, e.to_string());
                    drop(permit);
                    tracing::warn!(target: "farm", index, error = %e, "Swap dispatch failed; continuing");
                }
            }

            if index + 1 < self.config.total_swaps {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.delay) => {}
                }
            }
        }

        // Outcomes of already-dispatched swaps are still collected; slots are
        // released as each watcher settles.
        while watchers.join_next().await.is_some() {}
        debug_assert!(self.slots.is_idle());

        let final_state = if stopped {
            RunState::Stopped
        } else {
            RunState::Finished
        };
        self.transition(final_state);

        let counts = self.ledger.counts();
        tracing::info!(
            target: "farm",
            attempted,
            succeeded = counts.success,
            failed = counts.error,
            state = ?final_state,
            "Run complete"
        );

        Ok(RunSummary {
            attempted,
            succeeded: counts.success,
            failed: counts.error,
            state: final_state,
        })
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(target: "farm", from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}

fn settle_record(
    ledger: &RunLedger,
    record: Uuid,
    index: u32,
    hash: B256,
    outcome: Result<TxOutcome, AppError>,
) {
    match outcome {
        Ok(TxOutcome::Success) => {
            tracing::info!(target: "farm", index, hash = %format!("{:#x}", hash), "Swap confirmed");
            ledger.resolve(record, TxStatus::Success, "confirmed");
        }
        Ok(TxOutcome::Reverted) => {
            tracing::warn!(target: "farm", index, hash = %format!("{:#x}", hash), "Swap reverted on chain");
            ledger.resolve(record, TxStatus::Error, "reverted on chain");
        }
        Err(e) => {
            tracing::warn!(target: "farm", index, error = %e, "Confirmation failed");
            ledger.resolve(record, TxStatus::Error, e.to_string());
        }
    }
}
