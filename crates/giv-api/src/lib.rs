// SPDX-License-Identifier: BUSL-1.1
//! # giv-api — Reconciliation API Service
//!
//! HTTP surface and orchestration engine for milestone-escrowed donation
//! campaigns. Verified payment events flow in from the processor; the
//! engine splits each donation across milestones, settles each slice
//! on-chain with a signed call, and releases escrow to NGOs when admins
//! approve milestone proofs.
//!
//! ## API Surface
//!
//! | Prefix | Module | Domain |
//! |--------|--------|--------|
//! | `/v1/events/payment` | [`routes::events`] | Webhook intake (signature-authenticated) |
//! | `/v1/campaigns/*` | [`routes::campaigns`] | Campaign setup and read models |
//! | `/v1/campaigns/*/milestones/*/proof` | [`routes::proofs`] | Proof submission |
//! | `/v1/campaigns/*/milestones/*/review` | [`routes::review`] | Admin review |
//! | `/v1/admin/sweeps/*` | [`routes::admin`] | Operator sweeps |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! Health probes (`/health/*`) and the webhook intake are mounted
//! outside the auth middleware.
//!
//! ## OpenAPI
//!
//! Auto-generated spec via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod openapi;
pub mod orchestration;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) and the payment webhook are mounted
/// outside the auth middleware — the webhook authenticates with the
/// processor's detached body signature instead of a bearer token.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes.
    //
    // Body size limit: 2 MiB. Prevents OOM from oversized request bodies.
    let api = Router::new()
        .merge(routes::campaigns::router())
        .merge(routes::proofs::router())
        .merge(routes::review::router())
        .merge(routes::admin::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated surface: health probes plus the signature-verified
    // webhook intake.
    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(routes::events::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .with_state(state);

    Router::new()
        .merge(unauthenticated)
        .merge(api)
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks that the ledger is reachable and, when configured, that the
/// database connection is healthy. Returns 200 "ready" or 503 with a
/// diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.store.list_campaigns().await {
        tracing::warn!("Ledger health check failed: {e}");
        return (StatusCode::SERVICE_UNAVAILABLE, "ledger unreachable").into_response();
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
