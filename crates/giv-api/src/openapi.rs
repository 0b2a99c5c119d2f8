// SPDX-License-Identifier: BUSL-1.1
//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json` inside the authenticated surface.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token authentication. Set via GIV_AUTH_TOKEN env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the reconciliation API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Giv Stack — Donation Reconciliation API",
        version = "0.3.12",
        description = "Reconciliation engine for milestone-escrowed donation campaigns.\n\nProvides:\n- **Payment event intake** with detached-signature verification and idempotent replay\n- **Campaign lifecycle** — creation, settlement/payout provisioning, read models\n- **Milestone escrow** — allocation splitting, signed on-chain settlement, proof and review\n- **Operator sweeps** — proof deadline expiry and in-flight settlement resolution\n\nAuthentication: Bearer token via `Authorization: Bearer <token>` header. All `/v1/*` endpoints require authentication except `/v1/events/payment`, which authenticates with the processor's `X-Giv-Signature` body signature. Health probes (`/health/*`) are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Payment events ───────────────────────────────────────────────
        crate::routes::events::payment_event,
        // ── Campaigns ────────────────────────────────────────────────────
        crate::routes::campaigns::create_campaign,
        crate::routes::campaigns::list_campaigns,
        crate::routes::campaigns::get_campaign,
        crate::routes::campaigns::provision_campaign,
        crate::routes::campaigns::list_donations,
        crate::routes::campaigns::list_audit,
        // ── Milestones ───────────────────────────────────────────────────
        crate::routes::proofs::submit_proof,
        crate::routes::review::review_milestone,
        // ── Admin sweeps ─────────────────────────────────────────────────
        crate::routes::admin::deadline_sweep,
        crate::routes::admin::settlement_sweep,
    ),
    components(
        schemas(
            // ── Error types ─────────────────────────────────────────────
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            // ── Event DTOs ──────────────────────────────────────────────
            crate::routes::events::PaymentEventBody,
            crate::routes::events::PaymentMetadata,
            crate::orchestration::DonationOutcome,
            crate::orchestration::AllocationView,
            // ── Campaign DTOs ───────────────────────────────────────────
            crate::routes::campaigns::CreateCampaignRequest,
            crate::routes::campaigns::ProvisionCampaignRequest,
            // ── Milestone DTOs ──────────────────────────────────────────
            crate::routes::proofs::SubmitProofRequest,
            crate::routes::review::ReviewRequest,
            crate::orchestration::ReviewOutcome,
            // ── Sweep reports ───────────────────────────────────────────
            crate::orchestration::DeadlineSweepReport,
            crate::orchestration::SettlementSweepReport,
            crate::orchestration::sweep::ExpiredMilestone,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "events", description = "Payment processor webhook intake — signature-verified, idempotent"),
        (name = "campaigns", description = "Campaign setup, provisioning, and read models"),
        (name = "milestones", description = "Milestone proof submission and admin review"),
        (name = "admin", description = "Operator sweeps — deadline expiry and settlement resolution"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router. Serves the spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_generates_successfully() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Giv Stack — Donation Reconciliation API");
    }

    #[test]
    fn spec_has_core_paths() {
        let spec = ApiDoc::openapi();
        for path in &[
            "/v1/events/payment",
            "/v1/campaigns",
            "/v1/campaigns/{campaign_id}",
            "/v1/campaigns/{campaign_id}/provision",
            "/v1/campaigns/{campaign_id}/milestones/{milestone_index}/proof",
            "/v1/campaigns/{campaign_id}/milestones/{milestone_index}/review",
            "/v1/admin/sweeps/deadline",
            "/v1/admin/sweeps/settlement",
        ] {
            assert!(
                spec.paths.paths.contains_key(*path),
                "spec should contain {path}"
            );
        }
    }

    #[test]
    fn spec_has_security_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn spec_has_key_schemas() {
        let spec = ApiDoc::openapi();
        let schemas = &spec.components.as_ref().unwrap().schemas;
        for name in &[
            "ErrorBody",
            "PaymentEventBody",
            "DonationOutcome",
            "CreateCampaignRequest",
            "ReviewOutcome",
            "SettlementSweepReport",
        ] {
            assert!(schemas.contains_key(*name), "should contain {name} schema");
        }
    }

    #[test]
    fn spec_serializes_to_json() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("bearer_auth"));
    }
}
