// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{
    DEFAULT_MAX_FEE_ADD_GWEI, DEFAULT_POOL_FEE, DEFAULT_PRIORITY_FEE_GWEI,
};
use crate::domain::error::AppError;
use alloy::primitives::{Address, U256};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// How fee overrides are computed for each swap.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GasMode {
    #[default]
    Normal,
    /// Bias toward low cost over inclusion speed: a fixed small priority fee
    /// plus a max fee derived from the current base fee. Too-low values can
    /// leave transactions pending indefinitely; the operator retries higher.
    Slow,
}

/// Which submitter authorizes each transaction.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Batch,
    Interactive,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    // General
    #[serde(default = "default_debug")]
    pub debug: bool,
    pub rpc_url: String,
    pub chain_id: Option<u64>,

    // Identity
    pub wallet_key: Option<String>,
    /// Swap proceeds recipient; defaults to the wallet address.
    pub recipient: Option<Address>,

    // Route
    pub router_address: Address,
    pub token_in: Address,
    pub token_out: Address,
    #[serde(default = "default_pool_fee")]
    pub pool_fee: u32,

    // Run shape
    /// Source-token base units per swap, as a decimal string.
    pub amount_per_swap: String,
    #[serde(default = "default_total_swaps")]
    pub total_swaps: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    #[serde(default)]
    pub mode: RunMode,
    /// Overrides the per-mode default (batch waits, interactive does not).
    pub await_confirmation_per_swap: Option<bool>,

    // Fees
    #[serde(default)]
    pub gas_mode: GasMode,
    #[serde(default = "default_priority_fee_gwei")]
    pub priority_fee_gwei: f64,
    #[serde(default = "default_max_fee_add_gwei")]
    pub max_fee_add_gwei: f64,
}

// Defaults
fn default_debug() -> bool {
    false
}
fn default_pool_fee() -> u32 {
    DEFAULT_POOL_FEE
}
fn default_total_swaps() -> u32 {
    10
}
fn default_delay_ms() -> u64 {
    2_000
}
fn default_max_pending() -> usize {
    1
}
fn default_priority_fee_gwei() -> f64 {
    DEFAULT_PRIORITY_FEE_GWEI
}
fn default_max_fee_add_gwei() -> f64 {
    DEFAULT_MAX_FEE_ADD_GWEI
}

impl Settings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected) = path {
            builder = builder.add_source(File::from(Path::new(selected)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Deterministic precedence: env/.env > config file.
        builder = builder.add_source(Environment::default());

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.rpc_url.trim().is_empty() {
            return Err(AppError::Config("RPC_URL is missing".to_string()));
        }
        if self.total_swaps == 0 {
            return Err(AppError::Config("TOTAL_SWAPS must be at least 1".to_string()));
        }
        let amount = self.amount_per_swap()?;
        if amount.is_zero() {
            return Err(AppError::Config("AMOUNT_PER_SWAP must be non-zero".to_string()));
        }
        if self.priority_fee_gwei < 0.0 || self.max_fee_add_gwei < 0.0 {
            return Err(AppError::Config("Fee settings must be non-negative".to_string()));
        }
        Ok(())
    }

    /// Both run modes sign locally; the key is required before any network call.
    pub fn wallet_key_value(&self) -> Result<&str, AppError> {
        match self.wallet_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(AppError::Config("WALLET_KEY is missing".to_string())),
        }
    }

    pub fn amount_per_swap(&self) -> Result<U256, AppError> {
        U256::from_str_radix(self.amount_per_swap.trim(), 10).map_err(|_| {
            AppError::Config(format!(
                "AMOUNT_PER_SWAP '{}' is not a base-unit integer",
                self.amount_per_swap
            ))
        })
    }

    pub fn max_pending_value(&self) -> usize {
        self.max_pending.max(1)
    }

    /// Batch runs wait for each receipt; interactive runs fire-and-continue.
    pub fn awaits_confirmation_per_swap(&self) -> bool {
        self.await_confirmation_per_swap
            .unwrap_or(self.mode == RunMode::Batch)
    }

    pub fn pool_fee_value(&self) -> u32 {
        // uint24 on the wire
        self.pool_fee.min(0x00FF_FFFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn base_settings() -> Settings {
        Settings {
            debug: default_debug(),
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: Some(1),
            wallet_key: Some("0x01".to_string()),
            recipient: None,
            router_address: Address::ZERO,
            token_in: Address::from([1u8; 20]),
            token_out: Address::from([2u8; 20]),
            pool_fee: default_pool_fee(),
            amount_per_swap: "1000000".to_string(),
            total_swaps: default_total_swaps(),
            delay_ms: default_delay_ms(),
            max_pending: default_max_pending(),
            mode: RunMode::default(),
            await_confirmation_per_swap: None,
            gas_mode: GasMode::default(),
            priority_fee_gwei: default_priority_fee_gwei(),
            max_fee_add_gwei: default_max_fee_add_gwei(),
        }
    }

    #[test]
    fn batch_mode_waits_per_swap_by_default() {
        let mut settings = base_settings();
        settings.mode = RunMode::Batch;
        assert!(settings.awaits_confirmation_per_swap());

        settings.mode = RunMode::Interactive;
        assert!(!settings.awaits_confirmation_per_swap());
    }

    #[test]
    fn confirmation_flag_overrides_mode_default() {
        let mut settings = base_settings();
        settings.mode = RunMode::Interactive;
        settings.await_confirmation_per_swap = Some(true);
        assert!(settings.awaits_confirmation_per_swap());
    }

    #[test]
    fn missing_wallet_key_is_a_config_error() {
        let mut settings = base_settings();
        settings.wallet_key = None;
        assert!(matches!(
            settings.wallet_key_value(),
            Err(AppError::Config(msg)) if msg.contains("WALLET_KEY")
        ));

        settings.wallet_key = Some("   ".to_string());
        assert!(settings.wallet_key_value().is_err());
    }

    #[test]
    fn amount_must_be_base_unit_integer() {
        let mut settings = base_settings();
        settings.amount_per_swap = "0.5".to_string();
        assert!(settings.amount_per_swap().is_err());

        settings.amount_per_swap = "250000000000000000".to_string();
        assert_eq!(
            settings.amount_per_swap().unwrap(),
            U256::from(250_000_000_000_000_000u128)
        );
    }

    #[test]
    fn max_pending_has_a_floor_of_one() {
        let mut settings = base_settings();
        settings.max_pending = 0;
        assert_eq!(settings.max_pending_value(), 1);
    }

    #[test]
    fn pool_fee_is_clamped_to_uint24() {
        let mut settings = base_settings();
        settings.pool_fee = 0x0100_0000;
        assert_eq!(settings.pool_fee_value(), 0x00FF_FFFF);
    }

    #[test]
    fn env_overrides_selected_profile_file_values() {
        let _env_lock = env_lock_guard();
        let tmp = std::env::temp_dir().join(format!(
            "swapfarm-config-env-override-{}.toml",
            std::process::id()
        ));
        let body = r#"
rpc_url = "http://file:8545"
router_address = "0x0000000000000000000000000000000000000003"
token_in = "0x0000000000000000000000000000000000000001"
token_out = "0x0000000000000000000000000000000000000002"
amount_per_swap = "1000000"
"#;
        std::fs::write(&tmp, body).expect("write temp config");
        let old_rpc = std::env::var("RPC_URL").ok();
        unsafe {
            std::env::set_var("RPC_URL", "http://env:8545");
        }

        let loaded = Settings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect("load settings");
        assert_eq!(loaded.rpc_url, "http://env:8545");

        std::fs::remove_file(&tmp).ok();
        if let Some(v) = old_rpc {
            unsafe { std::env::set_var("RPC_URL", v) };
        } else {
            unsafe { std::env::remove_var("RPC_URL") };
        }
    }

    #[test]
    fn gas_mode_parses_lowercase_names() {
        let tmp = std::env::temp_dir().join(format!(
            "swapfarm-config-gas-mode-{}.toml",
            std::process::id()
        ));
        let body = r#"
rpc_url = "http://localhost:8545"
router_address = "0x0000000000000000000000000000000000000003"
token_in = "0x0000000000000000000000000000000000000001"
token_out = "0x0000000000000000000000000000000000000002"
amount_per_swap = "1000000"
gas_mode = "slow"
mode = "interactive"
"#;
        std::fs::write(&tmp, body).expect("write temp config");
        let loaded = Settings::load_with_path(Some(tmp.to_str().expect("utf8 path")))
            .expect("load settings");
        std::fs::remove_file(&tmp).ok();

        assert_eq!(loaded.gas_mode, GasMode::Slow);
        assert_eq!(loaded.mode, RunMode::Interactive);
    }
}
