// SPDX-License-Identifier: BUSL-1.1
//! # Bearer Token Authentication
//!
//! Middleware guarding the `/v1/*` surface. The webhook intake route is
//! mounted outside this layer — payment events authenticate with the
//! processor's detached body signature instead of a bearer token.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Expected bearer token, injected as an extension.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: String,
}

/// Reject requests without a valid `Authorization: Bearer <token>` header.
pub async fn auth_middleware(
    Extension(config): Extension<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        // Constant-time comparison; `ct_eq` is false on length mismatch.
        Some(token) if bool::from(token.as_bytes().ct_eq(config.token.as_bytes())) => {
            next.run(request).await
        }
        Some(_) => AppError::Unauthorized("invalid token".to_string()).into_response(),
        None => AppError::Unauthorized("missing bearer token".to_string()).into_response(),
    }
}
