// SPDX-License-Identifier: BUSL-1.1
//! # Operator Sweep Endpoints
//!
//! Manually triggered reconciliation passes. Deployments run these on a
//! schedule (cron hitting the endpoints); both are idempotent.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/admin/sweeps/deadline` | `deadline_sweep` |
//! | `POST` | `/v1/admin/sweeps/settlement` | `settlement_sweep` |

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::AppError;
use crate::orchestration::{DeadlineSweepReport, SettlementSweepReport};
use crate::state::AppState;

/// Build the admin sweep router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/sweeps/deadline", post(deadline_sweep))
        .route("/v1/admin/sweeps/settlement", post(settlement_sweep))
}

/// POST /v1/admin/sweeps/deadline — Fail milestones whose proof window
/// elapsed.
#[utoipa::path(
    post,
    path = "/v1/admin/sweeps/deadline",
    responses(
        (status = 200, description = "Sweep finished", body = DeadlineSweepReport),
    ),
    tag = "admin"
)]
async fn deadline_sweep(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let window = chrono::Duration::days(state.config.proof_window_days);
    let report = state.engine.deadline_sweep(window).await?;
    Ok(Json(report))
}

/// POST /v1/admin/sweeps/settlement — Resolve in-flight allocations.
#[utoipa::path(
    post,
    path = "/v1/admin/sweeps/settlement",
    responses(
        (status = 200, description = "Sweep finished", body = SettlementSweepReport),
    ),
    tag = "admin"
)]
async fn settlement_sweep(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state.engine.settlement_sweep().await?;
    Ok(Json(report))
}
