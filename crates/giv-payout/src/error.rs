// SPDX-License-Identifier: BUSL-1.1
//! Payout rail error types.

/// Errors from payout rail calls.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Payout rail returned a non-2xx status.
    #[error("payout rail {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Transfer requested for a campaign with no provisioned account.
    #[error("no payout account provisioned: {0}")]
    NotProvisioned(String),
    /// The rail rejected the transfer parameters.
    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),
}

impl PayoutError {
    /// True for transport failures where a retry may succeed. The
    /// idempotency key makes retrying a transfer safe.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}
