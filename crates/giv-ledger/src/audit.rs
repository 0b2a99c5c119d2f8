// SPDX-License-Identifier: BUSL-1.1
//! Append-only audit trail for campaign-affecting actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use giv_core::CampaignId;

/// One audit record. Entries are append-only; nothing updates or deletes
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub campaign_id: CampaignId,
    /// Machine-readable action tag ("donation_settled",
    /// "milestone_approved", ...).
    pub action: String,
    /// Structured action detail.
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        campaign_id: CampaignId,
        action: impl Into<String>,
        detail: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            action: action.into(),
            detail,
            created_at: now,
        }
    }
}
