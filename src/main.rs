// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::U256;
use alloy::providers::Provider;
use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use swapfarm::app::config::{RunMode, Settings};
use swapfarm::app::logging::setup_logging;
use swapfarm::domain::error::AppError;
use swapfarm::farm::allowance::{AllowanceManager, Erc20Approvals};
use swapfarm::farm::runner::{FarmRunner, RunConfig};
use swapfarm::farm::swaps::SwapRoute;
use swapfarm::network::contracts::ERC20;
use swapfarm::network::gas::{FeeEstimator, FeePolicy, NodeFeeEstimator, gwei_to_wei};
use swapfarm::network::nonce::NonceManager;
use swapfarm::network::provider::{ConnectionFactory, detect_chain_id};
use swapfarm::network::submitter::{LocalKeySubmitter, PromptSubmitter, TxSubmitter};

#[derive(Parser, Debug)]
#[command(author, version, about = "swapfarm")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet when configuration fails.
            eprintln!("swapfarm: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = Settings::load_with_path(cli.config.as_deref())?;
    setup_logging(if settings.debug { "debug" } else { "info" }, false);

    // Key problems must surface before the first network call.
    let signer = PrivateKeySigner::from_str(settings.wallet_key_value()?)
        .map_err(|e| AppError::Config(format!("Invalid wallet key: {}", e)))?;
    let owner = signer.address();

    let provider = ConnectionFactory::http(&settings.rpc_url)?;
    let chain_id = match settings.chain_id {
        Some(id) => id,
        None => {
            let id = detect_chain_id(&provider).await?;
            tracing::info!(target: "config", detected_chain = id, rpc = %settings.rpc_url, "Auto-detected chain_id from RPC");
            id
        }
    };

    let native_balance = provider
        .get_balance(owner)
        .await
        .map_err(|e| AppError::Connection(format!("Balance fetch failed: {}", e)))?;
    let token_balance = ERC20::new(settings.token_in, provider.clone())
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| AppError::Connection(format!("Token balance fetch failed: {}", e)))?;

    let amount = settings.amount_per_swap()?;
    let required = amount.saturating_mul(U256::from(settings.total_swaps));
    tracing::info!(
        target: "farm",
        wallet = %owner,
        chain_id,
        native_balance = %native_balance,
        token_in_balance = %token_balance,
        swaps = settings.total_swaps,
        "Wallet state at start"
    );
    if token_balance < required {
        tracing::warn!(
            target: "farm",
            balance = %token_balance,
            required = %required,
            "Source token balance does not cover the full run"
        );
    }

    let nonce = NonceManager::new(provider.clone(), owner);
    let local = LocalKeySubmitter::new(provider.clone(), signer, nonce, chain_id);
    let submitter: Arc<dyn TxSubmitter> = match settings.mode {
        RunMode::Batch => Arc::new(local),
        RunMode::Interactive => Arc::new(PromptSubmitter::new(local)),
    };

    let policy = FeePolicy {
        gas_mode: settings.gas_mode,
        priority_fee_wei: gwei_to_wei(settings.priority_fee_gwei),
        max_fee_add_wei: gwei_to_wei(settings.max_fee_add_gwei),
    };
    let fees: Arc<dyn FeeEstimator> = Arc::new(NodeFeeEstimator::new(provider.clone(), policy));

    let approvals = Erc20Approvals::new(
        provider.clone(),
        settings.token_in,
        owner,
        Arc::clone(&submitter),
        Arc::clone(&fees),
    );
    let allowance = AllowanceManager::new(approvals, owner, settings.router_address);

    let route = SwapRoute {
        router: settings.router_address,
        token_in: settings.token_in,
        token_out: settings.token_out,
        pool_fee: settings.pool_fee_value(),
    };
    let config = RunConfig {
        amount_per_swap: amount,
        recipient: settings.recipient.unwrap_or(owner),
        total_swaps: settings.total_swaps,
        delay: Duration::from_millis(settings.delay_ms),
        max_pending: settings.max_pending_value(),
        await_confirmation_per_swap: settings.awaits_confirmation_per_swap(),
    };

    let runner = FarmRunner::new(owner, route, config, allowance, fees, submitter);
    let ledger = runner.ledger();
    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "farm", "Stop requested; in-flight swaps will settle first");
            cancel.cancel();
        }
    });

    // Per-swap failures are already in the ledger and the summary log; only
    // configuration, connectivity, and allowance failures abort with an error.
    let summary = runner.run().await?;

    let failed = ledger.failures();
    if !failed.is_empty() {
        match serde_json::to_string(&failed) {
            Ok(body) => {
                tracing::warn!(target: "farm", count = failed.len(), records = %body, "Swaps that did not complete")
            }
            Err(e) => {
                tracing::warn!(target: "farm", error = %e, "Failed to serialize failure records")
            }
        }
    }
    tracing::info!(target: "farm", state = ?summary.state, "Exiting");
    Ok(())
}
