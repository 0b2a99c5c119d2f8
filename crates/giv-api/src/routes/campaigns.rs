// SPDX-License-Identifier: BUSL-1.1
//! # Campaign API Endpoints
//!
//! Campaign setup and read models. Creation derives the settlement
//! address from the registered custody key up front; provisioning links
//! the campaign to the settlement contract and the payout rail.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/campaigns` | `create_campaign` |
//! | `GET` | `/v1/campaigns` | `list_campaigns` |
//! | `GET` | `/v1/campaigns/:campaign_id` | `get_campaign` |
//! | `POST` | `/v1/campaigns/:campaign_id/provision` | `provision_campaign` |
//! | `GET` | `/v1/campaigns/:campaign_id/donations` | `list_donations` |
//! | `GET` | `/v1/campaigns/:campaign_id/audit` | `list_audit` |

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use giv_core::{CampaignId, Money};
use giv_ledger::{AuditEntry, Campaign};

use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request to create a campaign.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateCampaignRequest {
    pub name: String,
    /// Decimal string, e.g. `"5000.00"`.
    pub goal_amount: String,
    /// Ordered milestone funding caps, decimal strings.
    pub milestone_targets: Vec<String>,
    /// Custody key id registered with the signer gateway.
    pub signer_key_id: String,
}

/// Request to provision a created campaign for settlement and payout.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProvisionCampaignRequest {
    /// Campaign id on the settlement contract, assigned at registration.
    pub onchain_id: u64,
    /// Contact for the NGO's payout rail account.
    pub ngo_contact_email: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the campaign router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/campaigns", post(create_campaign).get(list_campaigns))
        .route("/v1/campaigns/:campaign_id", get(get_campaign))
        .route(
            "/v1/campaigns/:campaign_id/provision",
            post(provision_campaign),
        )
        .route("/v1/campaigns/:campaign_id/donations", get(list_donations))
        .route("/v1/campaigns/:campaign_id/audit", get(list_audit))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/campaigns — Create a campaign.
#[utoipa::path(
    post,
    path = "/v1/campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created"),
        (status = 422, description = "Invalid amounts or unknown signer key", body = crate::error::ErrorBody),
    ),
    tag = "campaigns"
)]
async fn create_campaign(
    State(state): State<AppState>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    let goal_amount = Money::parse(&req.goal_amount)?;
    let milestone_targets: Vec<Money> = req
        .milestone_targets
        .iter()
        .map(|t| Money::parse(t))
        .collect::<Result<_, _>>()?;
    if milestone_targets.is_empty() {
        return Err(AppError::Validation(
            "milestone_targets must not be empty".to_string(),
        ));
    }

    // Derive the settlement address now so a misconfigured key id fails
    // setup instead of the first donation.
    let signer_address = state.signer.address_for(&req.signer_key_id)?;

    let now = Utc::now();
    let campaign = Campaign::new(
        CampaignId::new(),
        req.name.trim(),
        goal_amount,
        &milestone_targets,
        &req.signer_key_id,
        &signer_address,
        now,
    )?;
    let campaign = state.store.create_campaign(campaign).await?;
    state
        .store
        .append_audit(AuditEntry::new(
            campaign.id,
            "campaign_created",
            serde_json::json!({
                "name": campaign.name,
                "goal_amount": campaign.goal_amount,
                "milestones": campaign.milestone_count(),
                "signer_key_id": campaign.signer_key_id,
            }),
            now,
        ))
        .await?;

    tracing::info!(
        campaign_id = %campaign.id,
        milestones = campaign.milestone_count(),
        "campaign created"
    );
    let value = serde_json::to_value(&campaign)
        .map_err(|e| AppError::Internal(format!("serialization error: {e}")))?;
    Ok((StatusCode::CREATED, Json(value)))
}

/// GET /v1/campaigns — List all campaigns.
#[utoipa::path(
    get,
    path = "/v1/campaigns",
    responses(
        (status = 200, description = "List of campaigns"),
    ),
    tag = "campaigns"
)]
async fn list_campaigns(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let campaigns = state.store.list_campaigns().await?;
    let values: Vec<serde_json::Value> = campaigns
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::Internal(format!("serialization error: {e}")))?;
    Ok(Json(
        serde_json::json!({ "campaigns": values, "total": values.len() }),
    ))
}

/// GET /v1/campaigns/:campaign_id — Get a campaign by id.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{campaign_id}",
    params(("campaign_id" = Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Campaign details"),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorBody),
    ),
    tag = "campaigns"
)]
async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let campaign = state.store.campaign(campaign_id.into()).await?;
    let value = serde_json::to_value(&campaign)
        .map_err(|e| AppError::Internal(format!("serialization error: {e}")))?;
    Ok(Json(value))
}

/// POST /v1/campaigns/:campaign_id/provision — Provision a campaign.
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/provision",
    params(("campaign_id" = Uuid, Path, description = "Campaign UUID")),
    request_body = ProvisionCampaignRequest,
    responses(
        (status = 200, description = "Campaign provisioned"),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already provisioned", body = crate::error::ErrorBody),
        (status = 502, description = "Payout rail unavailable", body = crate::error::ErrorBody),
    ),
    tag = "campaigns"
)]
async fn provision_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Json(req): Json<ProvisionCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.ngo_contact_email.trim().is_empty() {
        return Err(AppError::Validation(
            "ngo_contact_email must not be empty".to_string(),
        ));
    }
    let campaign = state
        .engine
        .provision_campaign(campaign_id.into(), req.onchain_id, req.ngo_contact_email.trim())
        .await?;
    let value = serde_json::to_value(&campaign)
        .map_err(|e| AppError::Internal(format!("serialization error: {e}")))?;
    Ok(Json(value))
}

/// GET /v1/campaigns/:campaign_id/donations — List donations with their
/// allocation slices.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{campaign_id}/donations",
    params(("campaign_id" = Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Donations and allocation slices"),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorBody),
    ),
    tag = "campaigns"
)]
async fn list_donations(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let campaign_id: CampaignId = campaign_id.into();
    // 404 for an unknown campaign rather than an empty list.
    state.store.campaign(campaign_id).await?;

    let donations = state.store.donations_for_campaign(campaign_id).await?;
    let mut values = Vec::with_capacity(donations.len());
    for donation in &donations {
        let allocations = state.store.allocations_for_donation(donation.id).await?;
        values.push(serde_json::json!({
            "donation": donation,
            "allocations": allocations,
        }));
    }
    Ok(Json(
        serde_json::json!({ "donations": values, "total": values.len() }),
    ))
}

/// GET /v1/campaigns/:campaign_id/audit — Campaign audit trail.
#[utoipa::path(
    get,
    path = "/v1/campaigns/{campaign_id}/audit",
    params(("campaign_id" = Uuid, Path, description = "Campaign UUID")),
    responses(
        (status = 200, description = "Audit entries, oldest first"),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorBody),
    ),
    tag = "campaigns"
)]
async fn list_audit(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let campaign_id: CampaignId = campaign_id.into();
    state.store.campaign(campaign_id).await?;

    let entries = state.store.audit_for_campaign(campaign_id).await?;
    let values: Vec<serde_json::Value> = entries
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::Internal(format!("serialization error: {e}")))?;
    Ok(Json(
        serde_json::json!({ "entries": values, "total": values.len() }),
    ))
}
