// SPDX-License-Identifier: BUSL-1.1
//! # Proof Submission Endpoint
//!
//! NGOs submit evidence that a funded milestone's work is complete. The
//! store enforces the lifecycle: only the current milestone, only from
//! `pending_proof` (first submission) or `rejected` (resubmission).
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/campaigns/:campaign_id/milestones/:milestone_index/proof` | `submit_proof` |

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use giv_ledger::AuditEntry;

use crate::error::AppError;
use crate::state::AppState;

/// Request to submit milestone proof.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SubmitProofRequest {
    /// Description of the completed work.
    pub description: String,
    /// Links or digests of supporting evidence.
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

/// Build the proof router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/campaigns/:campaign_id/milestones/:milestone_index/proof",
        post(submit_proof),
    )
}

/// POST /v1/campaigns/:campaign_id/milestones/:milestone_index/proof —
/// Submit proof for the current milestone.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/milestones/{milestone_index}/proof",
    params(
        ("campaign_id" = Uuid, Path, description = "Campaign UUID"),
        ("milestone_index" = u32, Path, description = "Zero-based milestone index"),
    ),
    request_body = SubmitProofRequest,
    responses(
        (status = 200, description = "Proof recorded; milestone pending review"),
        (status = 404, description = "Campaign or milestone not found", body = crate::error::ErrorBody),
        (status = 409, description = "Milestone not accepting proof", body = crate::error::ErrorBody),
        (status = 422, description = "Empty description", body = crate::error::ErrorBody),
    ),
    tag = "milestones"
)]
async fn submit_proof(
    State(state): State<AppState>,
    Path((campaign_id, milestone_index)): Path<(Uuid, u32)>,
    Json(req): Json<SubmitProofRequest>,
) -> Result<impl IntoResponse, AppError> {
    let description = req.description.trim();
    if description.is_empty() {
        return Err(AppError::Validation(
            "description must not be empty".to_string(),
        ));
    }

    let now = Utc::now();
    let campaign = state
        .store
        .submit_proof(
            campaign_id.into(),
            milestone_index,
            description,
            req.evidence_refs.clone(),
            now,
        )
        .await?;
    state
        .store
        .append_audit(AuditEntry::new(
            campaign.id,
            "proof_submitted",
            serde_json::json!({
                "milestone_index": milestone_index,
                "evidence_refs": req.evidence_refs.len(),
            }),
            now,
        ))
        .await?;

    tracing::info!(
        campaign_id = %campaign.id,
        milestone_index,
        "milestone proof submitted"
    );
    let milestone = campaign.milestone(milestone_index)?;
    let value = serde_json::to_value(milestone)
        .map_err(|e| AppError::Internal(format!("serialization error: {e}")))?;
    Ok(Json(value))
}
