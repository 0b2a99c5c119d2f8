// SPDX-License-Identifier: BUSL-1.1
//! # HTTP Payout Rail
//!
//! reqwest client for the payout provider's REST API. Bearer-token auth,
//! idempotency key in the `Idempotency-Key` header, transport retries with
//! backoff. Amounts travel as decimal strings — the rail and the ledger
//! must agree to the cent.

use serde::Deserialize;

use crate::error::PayoutError;
use crate::rail::{PayoutRail, Transfer, TransferRequest, TransferStatus};
use crate::retry::retry_send;

/// Configuration for the HTTP payout rail.
#[derive(Debug, Clone)]
pub struct PayoutConfig {
    /// API base URL, no trailing slash.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl PayoutConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: 30,
        }
    }
}

/// Production payout rail client.
pub struct HttpPayoutRail {
    client: reqwest::Client,
    config: PayoutConfig,
}

impl std::fmt::Debug for HttpPayoutRail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the API key.
        f.debug_struct("HttpPayoutRail")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    id: String,
    status: String,
}

fn parse_status(raw: &str, endpoint: &str) -> Result<TransferStatus, PayoutError> {
    match raw {
        "pending" => Ok(TransferStatus::Pending),
        "paid" => Ok(TransferStatus::Paid),
        "failed" => Ok(TransferStatus::Failed),
        other => Err(PayoutError::ApiError {
            endpoint: endpoint.to_string(),
            status: 200,
            body: format!("unknown transfer status: {other}"),
        }),
    }
}

impl HttpPayoutRail {
    pub fn new(config: PayoutConfig) -> Result<Self, PayoutError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PayoutError::Http {
                endpoint: config.base_url.clone(),
                source: e,
            })?;
        Ok(Self { client, config })
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<reqwest::Response, PayoutError> {
        let url = format!("{}{endpoint}", self.config.base_url);
        let resp = retry_send(|| {
            let mut req = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(&body);
            if let Some(key) = idempotency_key {
                req = req.header("Idempotency-Key", key);
            }
            req.send()
        })
        .await
        .map_err(|e| PayoutError::Http {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PayoutError::ApiError {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait::async_trait]
impl PayoutRail for HttpPayoutRail {
    async fn provision_account(
        &self,
        ngo_name: &str,
        contact_email: &str,
    ) -> Result<String, PayoutError> {
        let endpoint = "/v1/accounts";
        let resp = self
            .post_json(
                endpoint,
                serde_json::json!({
                    "name": ngo_name,
                    "email": contact_email,
                }),
                None,
            )
            .await?;
        let account: AccountResponse =
            resp.json().await.map_err(|e| PayoutError::Deserialization {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
        tracing::info!(account_id = %account.id, ngo = ngo_name, "provisioned payout account");
        Ok(account.id)
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<Transfer, PayoutError> {
        if !request.amount.is_positive() {
            return Err(PayoutError::InvalidTransfer(format!(
                "non-positive amount: {}",
                request.amount
            )));
        }
        let endpoint = "/v1/transfers";
        let resp = self
            .post_json(
                endpoint,
                serde_json::json!({
                    "destination": request.destination_account,
                    "amount": request.amount.to_string(),
                    "description": request.description,
                }),
                Some(&request.idempotency_key),
            )
            .await?;
        let transfer: TransferResponse =
            resp.json().await.map_err(|e| PayoutError::Deserialization {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
        let status = parse_status(&transfer.status, endpoint)?;
        tracing::info!(
            transfer_id = %transfer.id,
            amount = %request.amount,
            destination = %request.destination_account,
            "payout transfer accepted"
        );
        Ok(Transfer {
            id: transfer.id,
            status,
        })
    }

    async fn transfer_status(&self, transfer_id: &str) -> Result<TransferStatus, PayoutError> {
        let endpoint = format!("/v1/transfers/{transfer_id}");
        let url = format!("{}{endpoint}", self.config.base_url);
        let resp = retry_send(|| {
            self.client
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .send()
        })
        .await
        .map_err(|e| PayoutError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PayoutError::ApiError {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        let transfer: TransferResponse =
            resp.json().await.map_err(|e| PayoutError::Deserialization {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        parse_status(&transfer.status, &endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giv_core::Money;

    #[test]
    fn debug_hides_api_key() {
        let rail = HttpPayoutRail::new(PayoutConfig::new(
            "https://rail.example.com",
            "sk_live_secret",
        ))
        .unwrap();
        let debug = format!("{rail:?}");
        assert!(!debug.contains("sk_live_secret"));
        assert!(debug.contains("rail.example.com"));
    }

    #[test]
    fn status_strings_parse() {
        assert_eq!(parse_status("pending", "/t").unwrap(), TransferStatus::Pending);
        assert_eq!(parse_status("paid", "/t").unwrap(), TransferStatus::Paid);
        assert_eq!(parse_status("failed", "/t").unwrap(), TransferStatus::Failed);
        assert!(parse_status("reversed", "/t").is_err());
    }

    #[tokio::test]
    async fn nonpositive_transfer_is_rejected_before_any_io() {
        let rail = HttpPayoutRail::new(PayoutConfig::new("https://rail.example.com", "k"))
            .unwrap();
        let result = rail
            .transfer(&TransferRequest {
                destination_account: "acct_1".to_string(),
                amount: Money::ZERO,
                description: "x".to_string(),
                idempotency_key: "k1".to_string(),
            })
            .await;
        assert!(matches!(result, Err(PayoutError::InvalidTransfer(_))));
    }
}
