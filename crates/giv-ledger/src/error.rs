// SPDX-License-Identifier: BUSL-1.1
//! Ledger error taxonomy.

use giv_core::{AllocationId, CampaignId, DonationId};
use thiserror::Error;

use crate::milestone::{MilestoneEvent, MilestoneStatus};

/// Errors surfaced by ledger operations and stores.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Campaign id not present in the store.
    #[error("campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// Donation id not present in the store.
    #[error("donation not found: {0}")]
    DonationNotFound(DonationId),

    /// Allocation id not present in the store.
    #[error("allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    /// Milestone index outside the campaign's milestone list.
    #[error("campaign {campaign_id} has no milestone at index {index}")]
    MilestoneNotFound { campaign_id: CampaignId, index: u32 },

    /// The requested lifecycle event is not valid from the current status.
    #[error("invalid milestone transition: {from} does not accept {event}")]
    InvalidTransition {
        from: MilestoneStatus,
        event: MilestoneEvent,
    },

    /// The milestone cursor has moved past the last milestone.
    #[error("campaign {0} is closed: all milestones are resolved")]
    CampaignClosed(CampaignId),

    /// The operation targets a milestone other than the current cursor.
    #[error(
        "campaign {campaign_id}: operation targets milestone {requested} \
         but the current milestone is {current}"
    )]
    MilestoneCursorMismatch {
        campaign_id: CampaignId,
        requested: u32,
        current: u32,
    },

    /// Donation or milestone amounts must be strictly positive.
    #[error("amount must be strictly positive")]
    NonPositiveAmount,

    /// A balance or sum invariant would be violated.
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    /// Backend storage failure (connection loss, constraint violation
    /// other than idempotent duplicates, serialization).
    #[error("ledger store failure: {0}")]
    Store(String),
}
