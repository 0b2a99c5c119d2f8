// SPDX-License-Identifier: BUSL-1.1
//! Service entrypoint: wire configuration, clients, and the router.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use giv_api::config::ApiConfig;
use giv_api::db::{self, ledger::PgLedgerStore};
use giv_api::orchestration::Engine;
use giv_api::state::AppState;
use giv_ledger::{LedgerStore, MemoryLedgerStore};
use giv_payout::{HttpPayoutRail, PayoutConfig};
use giv_settlement::{EvmSettlementConfig, JsonRpcSettlementClient};
use giv_signer::{EnvKeyCustodian, KeyCustodian, SignerGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env().context("loading configuration")?;

    let db_pool = db::init_pool().await.context("initializing database")?;
    let store: Arc<dyn LedgerStore> = match db_pool.clone() {
        Some(pool) => Arc::new(PgLedgerStore::new(pool)),
        None => Arc::new(MemoryLedgerStore::new()),
    };

    // Custody keys: each registration names the env var holding its seed.
    let signer = Arc::new(SignerGateway::new(config.settlement_domain()));
    for (key_id, var_name) in &config.signer_keys {
        let custodian = EnvKeyCustodian::from_env(var_name)
            .with_context(|| format!("loading custody key {key_id}"))?;
        signer.register(key_id.clone(), Arc::new(custodian) as Arc<dyn KeyCustodian>);
        tracing::info!(key_id, "custody key registered");
    }

    let settlement_config = EvmSettlementConfig::new(
        &config.settlement_rpc_url,
        &config.settlement_contract,
        &config.settlement_from_address,
        &config.chain_name,
        config.chain_id,
    )
    .with_confirmations(config.confirmations_required);
    let settlement =
        Arc::new(JsonRpcSettlementClient::new(settlement_config).context("settlement client")?);

    let payout = Arc::new(
        HttpPayoutRail::new(PayoutConfig::new(
            &config.payout_base_url,
            &config.payout_api_key,
        ))
        .context("payout client")?,
    );

    let engine = Engine::new(store.clone(), signer.clone(), settlement, payout)
        .with_confirmation_window(
            Duration::from_millis(config.confirm_poll_ms),
            config.confirm_max_polls,
        );

    let webhook_key = giv_signer::webhook::parse_verifying_key(&config.webhook_verifying_key)
        .context("parsing webhook verifying key")?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        engine: Arc::new(engine),
        store,
        signer,
        webhook_key,
        db_pool,
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "giv-api listening");
    axum::serve(listener, giv_api::app(state))
        .await
        .context("serving")?;
    Ok(())
}
