// SPDX-License-Identifier: BUSL-1.1
//! # Payment Event Intake
//!
//! The payment processor's webhook. Authenticated by a detached Ed25519
//! signature in `X-Giv-Signature` over the raw request body — verified
//! before the JSON is even parsed — so this router is mounted outside
//! the bearer-auth layer.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/events/payment` | `payment_event` |

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use giv_core::{Money, PaymentRef, ValidationError};

use crate::error::AppError;
use crate::orchestration::PaymentEvent;
use crate::state::AppState;

/// Signature header set by the payment processor.
pub const SIGNATURE_HEADER: &str = "x-giv-signature";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Split metadata attached by the checkout flow.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    /// Decimal string, e.g. `"25.00"`.
    pub direct_amount: String,
    /// Decimal string, e.g. `"75.00"`.
    pub escrow_amount: String,
    /// Processor-side escrow disposition; must be `held` when any
    /// escrow amount is present.
    pub escrow_status: String,
}

/// A payment-succeeded event as delivered by the processor. Unknown
/// fields are ignored — processors add fields without notice.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventBody {
    pub payment_reference: String,
    /// Decimal string for the full captured amount.
    pub gross_amount: String,
    pub campaign_id: Uuid,
    pub payer_id: String,
    pub metadata: PaymentMetadata,
}

impl PaymentEventBody {
    /// Validate amounts and the split before anything touches the ledger.
    fn into_event(self) -> Result<PaymentEvent, AppError> {
        let gross = Money::parse(&self.gross_amount)?;
        let direct = Money::parse(&self.metadata.direct_amount)?;
        let escrow = Money::parse(&self.metadata.escrow_amount)?;

        let sum = direct.checked_add(escrow).ok_or_else(|| {
            AppError::Validation("direct + escrow amount overflows".to_string())
        })?;
        if sum != gross {
            return Err(ValidationError::AmountMismatch {
                direct: direct.to_string(),
                escrow: escrow.to_string(),
                gross: gross.to_string(),
            }
            .into());
        }
        if escrow.is_positive() && self.metadata.escrow_status != "held" {
            return Err(AppError::Validation(format!(
                "escrow amount present but escrow_status is {:?}, expected \"held\"",
                self.metadata.escrow_status
            )));
        }

        Ok(PaymentEvent {
            payment_ref: PaymentRef::new(self.payment_reference)?,
            campaign_id: self.campaign_id.into(),
            donor_ref: self.payer_id,
            gross,
            direct,
            escrow,
        })
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the webhook intake router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events/payment", post(payment_event))
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /v1/events/payment — Ingest a payment-succeeded event.
#[utoipa::path(
    post,
    path = "/v1/events/payment",
    request_body = PaymentEventBody,
    responses(
        (status = 200, description = "Event processed (or replayed)", body = crate::orchestration::DonationOutcome),
        (status = 401, description = "Missing or invalid event signature", body = crate::error::ErrorBody),
        (status = 409, description = "Campaign closed or not provisioned", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed event or inconsistent amounts", body = crate::error::ErrorBody),
    ),
    tag = "events"
)]
async fn payment_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // Verify on the raw bytes before parsing anything.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing X-Giv-Signature header".to_string()))?;
    giv_signer::webhook::verify_event_signature(&state.webhook_key, &body, signature)
        .map_err(|_| AppError::Unauthorized("invalid event signature".to_string()))?;

    let wire: PaymentEventBody = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed payment event: {e}")))?;
    let event = wire.into_event()?;

    tracing::info!(
        payment_ref = %event.payment_ref,
        campaign_id = %event.campaign_id,
        gross = %event.gross,
        escrow = %event.escrow,
        "payment event accepted"
    );
    let outcome = state.engine.process_payment_event(event).await?;
    Ok((StatusCode::OK, Json(outcome)))
}
