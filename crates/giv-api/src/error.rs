// SPDX-License-Identifier: BUSL-1.1
//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from giv-ledger, giv-signer, giv-settlement, and
//! giv-payout to HTTP status codes with JSON `{error: {code, message}}`
//! bodies. Internal and upstream error details are never exposed to
//! clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use giv_ledger::LedgerError;
use giv_payout::PayoutError;
use giv_settlement::SettlementError;
use giv_signer::SignerError;

/// Structured JSON error response body.
///
/// The `details` field carries additional context for 422 validation
/// errors but is omitted for 500-class errors to prevent information
/// leakage.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication failure — missing or invalid credential (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to
    /// the client.
    #[error("internal error: {0}")]
    Internal(String),

    /// The settlement layer or payout rail returned an error (502).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Service dependency not configured or unreachable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal/upstream error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Upstream(_) => "An upstream service error occurred".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream(_) => tracing::error!(error = %self, "upstream service error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Boundary validation failures are 422 with no side effects.
impl From<giv_core::ValidationError> for AppError {
    fn from(err: giv_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::CampaignNotFound(_)
            | LedgerError::DonationNotFound(_)
            | LedgerError::AllocationNotFound(_)
            | LedgerError::MilestoneNotFound { .. } => Self::NotFound(err.to_string()),
            LedgerError::InvalidTransition { .. }
            | LedgerError::CampaignClosed(_)
            | LedgerError::MilestoneCursorMismatch { .. } => Self::Conflict(err.to_string()),
            LedgerError::NonPositiveAmount => Self::Validation(err.to_string()),
            LedgerError::InvariantViolation(_) | LedgerError::Store(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<SignerError> for AppError {
    fn from(err: SignerError) -> Self {
        match &err {
            SignerError::Unavailable { .. } => Self::ServiceUnavailable(err.to_string()),
            SignerError::UnknownKey { .. } => Self::Validation(err.to_string()),
            // Address mismatch is configuration corruption, never retried.
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match &err {
            SettlementError::Unavailable { .. } => Self::ServiceUnavailable(err.to_string()),
            SettlementError::Rpc { .. }
            | SettlementError::Reverted { .. }
            | SettlementError::ConfirmationTimeout { .. } => Self::Upstream(err.to_string()),
            SettlementError::InvalidCall(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<PayoutError> for AppError {
    fn from(err: PayoutError) -> Self {
        match &err {
            PayoutError::InvalidTransfer(_) => Self::Validation(err.to_string()),
            PayoutError::NotProvisioned(_) => Self::Conflict(err.to_string()),
            _ => Self::Upstream(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("missing campaign".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_status_code() {
        let err = AppError::Validation("bad amount".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn unauthorized_status_code() {
        let err = AppError::Unauthorized("no token".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "UNAUTHORIZED");
    }

    #[test]
    fn conflict_status_code() {
        let err = AppError::Conflict("milestone already approved".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "CONFLICT");
    }

    #[test]
    fn ledger_not_found_maps_to_404() {
        let err: AppError = LedgerError::CampaignNotFound(giv_core::CampaignId::new()).into();
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn cursor_mismatch_maps_to_conflict() {
        let err: AppError = LedgerError::MilestoneCursorMismatch {
            campaign_id: giv_core::CampaignId::new(),
            requested: 1,
            current: 0,
        }
        .into();
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn invariant_violation_maps_to_internal() {
        let err: AppError = LedgerError::InvariantViolation("negative escrow".to_string()).into();
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn signer_unavailable_maps_to_503() {
        let err: AppError = SignerError::Unavailable {
            reason: "vault sealed".to_string(),
        }
        .into();
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn settlement_revert_maps_to_502() {
        let err: AppError = SettlementError::Reverted {
            tx_hash: "0x1".to_string(),
            reason: "nonce".to_string(),
        }
        .into();
        let (status, _) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn error_body_serializes() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "TEST".to_string(),
                message: "test message".to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("TEST"));
        assert!(!json.contains("details")); // skipped when None
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    /// Helper to extract status and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("campaign 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("campaign 123"));
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        // The internal error message must NOT appear in the response body.
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_upstream_hides_details() {
        let (status, body) =
            response_parts(AppError::Upstream("rpc secret endpoint".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body.error.message.contains("rpc secret"));
    }
}
