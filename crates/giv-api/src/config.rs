// SPDX-License-Identifier: BUSL-1.1
//! # Service Configuration
//!
//! All configuration comes from `GIV_*` environment variables, read once
//! at startup. Secrets (auth token, payout API key, custody key seeds)
//! are never logged; custody seeds are referenced by environment variable
//! name and loaded by [`giv_signer::EnvKeyCustodian`] at bootstrap.

use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing environment variable: {0}")]
    MissingVar(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

/// Runtime configuration for the API service.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address (`GIV_BIND_ADDR`, default `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Bearer token for the admin/API surface (`GIV_AUTH_TOKEN`).
    pub auth_token: String,
    /// Hex Ed25519 verifying key for payment webhook signatures
    /// (`GIV_WEBHOOK_VERIFYING_KEY`).
    pub webhook_verifying_key: String,

    /// Settlement JSON-RPC endpoint (`GIV_SETTLEMENT_RPC_URL`).
    pub settlement_rpc_url: String,
    /// Escrow settlement contract address (`GIV_SETTLEMENT_CONTRACT`).
    pub settlement_contract: String,
    /// Relayer address funded for gas (`GIV_SETTLEMENT_FROM_ADDRESS`).
    pub settlement_from_address: String,
    /// Chain name for diagnostics (`GIV_CHAIN_NAME`, default `base`).
    pub chain_name: String,
    /// EVM chain id (`GIV_CHAIN_ID`, default 8453).
    pub chain_id: u64,
    /// Confirmations before a settlement tx counts as final
    /// (`GIV_CONFIRMATIONS`, default 3).
    pub confirmations_required: u64,

    /// Payout rail base URL (`GIV_PAYOUT_BASE_URL`).
    pub payout_base_url: String,
    /// Payout rail API key (`GIV_PAYOUT_API_KEY`).
    pub payout_api_key: String,

    /// Days an NGO has to submit proof after a milestone cap is reached
    /// (`GIV_PROOF_WINDOW_DAYS`, default 30).
    pub proof_window_days: i64,
    /// Interval between confirmation polls in milliseconds
    /// (`GIV_CONFIRM_POLL_MS`, default 2000).
    pub confirm_poll_ms: u64,
    /// Confirmation polls before the orchestrator stops waiting and
    /// leaves the allocation to the settlement sweep
    /// (`GIV_CONFIRM_MAX_POLLS`, default 15).
    pub confirm_max_polls: u32,

    /// Custody key registrations (`GIV_SIGNER_KEYS`): comma-separated
    /// `key_id=ENV_VAR` pairs, each naming the environment variable that
    /// holds that key's hex seed.
    pub signer_keys: Vec<(String, String)>,
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn optional(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    optional(var, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidVar {
            var,
            reason: e.to_string(),
        })
}

/// Parse `key_id=ENV_VAR` pairs from `GIV_SIGNER_KEYS`.
fn parse_signer_keys(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let mut keys = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key_id, var)) = pair.split_once('=') else {
            return Err(ConfigError::InvalidVar {
                var: "GIV_SIGNER_KEYS",
                reason: format!("expected key_id=ENV_VAR, got {pair:?}"),
            });
        };
        let (key_id, var) = (key_id.trim(), var.trim());
        if key_id.is_empty() || var.is_empty() {
            return Err(ConfigError::InvalidVar {
                var: "GIV_SIGNER_KEYS",
                reason: format!("empty side in pair {pair:?}"),
            });
        }
        keys.push((key_id.to_string(), var.to_string()));
    }
    Ok(keys)
}

impl ApiConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: optional("GIV_BIND_ADDR", "0.0.0.0:8080"),
            auth_token: required("GIV_AUTH_TOKEN")?,
            webhook_verifying_key: required("GIV_WEBHOOK_VERIFYING_KEY")?,
            settlement_rpc_url: required("GIV_SETTLEMENT_RPC_URL")?,
            settlement_contract: required("GIV_SETTLEMENT_CONTRACT")?,
            settlement_from_address: required("GIV_SETTLEMENT_FROM_ADDRESS")?,
            chain_name: optional("GIV_CHAIN_NAME", "base"),
            chain_id: parse_var("GIV_CHAIN_ID", "8453")?,
            confirmations_required: parse_var("GIV_CONFIRMATIONS", "3")?,
            payout_base_url: required("GIV_PAYOUT_BASE_URL")?,
            payout_api_key: required("GIV_PAYOUT_API_KEY")?,
            proof_window_days: parse_var("GIV_PROOF_WINDOW_DAYS", "30")?,
            confirm_poll_ms: parse_var("GIV_CONFIRM_POLL_MS", "2000")?,
            confirm_max_polls: parse_var("GIV_CONFIRM_MAX_POLLS", "15")?,
            signer_keys: parse_signer_keys(&optional("GIV_SIGNER_KEYS", ""))?,
        })
    }

    /// The typed-data domain all settlement signatures bind to.
    pub fn settlement_domain(&self) -> giv_signer::SettlementDomain {
        giv_signer::SettlementDomain {
            name: "giv-settlement".to_string(),
            version: "1".to_string(),
            chain_id: self.chain_id,
            verifying_contract: self.settlement_contract.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_keys_parse() {
        let keys = parse_signer_keys("ngo-1=GIV_KEY_NGO1, ngo-2=GIV_KEY_NGO2").unwrap();
        assert_eq!(
            keys,
            vec![
                ("ngo-1".to_string(), "GIV_KEY_NGO1".to_string()),
                ("ngo-2".to_string(), "GIV_KEY_NGO2".to_string()),
            ]
        );
    }

    #[test]
    fn signer_keys_empty_is_ok() {
        assert!(parse_signer_keys("").unwrap().is_empty());
        assert!(parse_signer_keys("  ,  ").unwrap().is_empty());
    }

    #[test]
    fn signer_keys_reject_malformed() {
        assert!(parse_signer_keys("ngo-1").is_err());
        assert!(parse_signer_keys("=GIV_KEY").is_err());
        assert!(parse_signer_keys("ngo-1=").is_err());
    }
}
