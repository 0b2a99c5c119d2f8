// SPDX-License-Identifier: BUSL-1.1
//! # Application State
//!
//! Shared state for all route handlers. Every external client is
//! constructed once at bootstrap and injected here — handlers and the
//! orchestration engine only ever see trait objects, so tests swap in
//! mocks without touching any route code.

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use sqlx::PgPool;

use giv_ledger::LedgerStore;
use giv_signer::SignerGateway;

use crate::config::ApiConfig;
use crate::orchestration::Engine;

/// Shared application state, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    /// The reconciliation orchestrator.
    pub engine: Arc<Engine>,
    /// Ledger persistence (Postgres-backed or in-memory).
    pub store: Arc<dyn LedgerStore>,
    /// Custody key registry for address derivation at provisioning.
    pub signer: Arc<SignerGateway>,
    /// Payment processor's webhook verifying key.
    pub webhook_key: VerifyingKey,
    /// Present when `DATABASE_URL` is configured; used by the readiness
    /// probe. The ledger store owns its own handle.
    pub db_pool: Option<PgPool>,
}
