// SPDX-License-Identifier: BUSL-1.1
//! # Milestone Review Endpoint
//!
//! Admin decisions on submitted proofs. Approval drives the full release
//! flow (payout transfer, on-chain approval, cursor advance); rejection
//! returns the milestone to the NGO for resubmission.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/campaigns/:campaign_id/milestones/:milestone_index/review` | `review_milestone` |

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::orchestration::ReviewOutcome;
use crate::state::AppState;

/// Admin review decision.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewRequest {
    /// Release the campaign's escrow balance and advance the cursor.
    Approve,
    /// Return the proof to the NGO; no balances change.
    Reject { rejection_reason: String },
}

/// Build the review router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/campaigns/:campaign_id/milestones/:milestone_index/review",
        post(review_milestone),
    )
}

/// POST /v1/campaigns/:campaign_id/milestones/:milestone_index/review —
/// Decide on a submitted proof.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/milestones/{milestone_index}/review",
    params(
        ("campaign_id" = Uuid, Path, description = "Campaign UUID"),
        ("milestone_index" = u32, Path, description = "Zero-based milestone index"),
    ),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Decision applied", body = ReviewOutcome),
        (status = 404, description = "Campaign or milestone not found", body = crate::error::ErrorBody),
        (status = 409, description = "Milestone not pending review", body = crate::error::ErrorBody),
        (status = 502, description = "Settlement or payout failure; retry the decision", body = crate::error::ErrorBody),
    ),
    tag = "milestones"
)]
async fn review_milestone(
    State(state): State<AppState>,
    Path((campaign_id, milestone_index)): Path<(Uuid, u32)>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = match req {
        ReviewRequest::Approve => {
            state
                .engine
                .approve_milestone(campaign_id.into(), milestone_index)
                .await?
        }
        ReviewRequest::Reject { rejection_reason } => {
            let reason = rejection_reason.trim();
            if reason.is_empty() {
                return Err(AppError::Validation(
                    "rejection_reason must not be empty".to_string(),
                ));
            }
            state
                .engine
                .reject_milestone(campaign_id.into(), milestone_index, reason)
                .await?
        }
    };
    Ok(Json(outcome))
}
