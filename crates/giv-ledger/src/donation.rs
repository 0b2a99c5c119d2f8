// SPDX-License-Identifier: BUSL-1.1
//! # Donation and Allocation Records
//!
//! A donation is one captured payment event from the processor. The
//! allocation engine splits its gross amount across milestones; each
//! slice becomes an [`Allocation`] row with its own settlement outcome, so
//! a partial on-chain failure is visible per slice instead of collapsing
//! the whole donation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use giv_core::{AllocationId, CampaignId, DonationId, Money, PaymentRef};

use crate::error::LedgerError;

/// Donation processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    /// Accepted; allocations are being settled.
    Processing,
    /// Every allocation settled on-chain.
    Completed,
    /// At least one allocation failed on-chain; needs remediation.
    PartiallyFailed,
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::PartiallyFailed => "partially_failed",
        };
        f.write_str(s)
    }
}

impl FromStr for DonationStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "partially_failed" => Ok(Self::PartiallyFailed),
            other => Err(LedgerError::Store(format!(
                "unknown donation status: {other}"
            ))),
        }
    }
}

/// One captured payment from the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub campaign_id: CampaignId,
    /// Processor payment reference; the idempotency key for intake.
    pub payment_ref: PaymentRef,
    /// Opaque donor reference from the processor event.
    pub donor_ref: String,
    /// Full captured amount.
    pub gross_amount: Money,
    /// Portion routed to milestone escrow.
    pub escrow_amount: Money,
    /// Portion passed through to the NGO immediately.
    pub direct_amount: Money,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// Validate the split and build a new `Processing` donation.
    ///
    /// `direct + escrow` must equal `gross` exactly, the gross amount must
    /// be strictly positive, and neither portion may be negative.
    pub fn new(
        id: DonationId,
        campaign_id: CampaignId,
        payment_ref: PaymentRef,
        donor_ref: impl Into<String>,
        gross_amount: Money,
        escrow_amount: Money,
        direct_amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if !gross_amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount);
        }
        if escrow_amount.minor_units() < 0 || direct_amount.minor_units() < 0 {
            return Err(LedgerError::InvariantViolation(
                "donation portions must not be negative".to_string(),
            ));
        }
        let sum = direct_amount
            .checked_add(escrow_amount)
            .ok_or_else(|| LedgerError::InvariantViolation("split sum overflow".to_string()))?;
        if sum != gross_amount {
            return Err(LedgerError::InvariantViolation(format!(
                "direct {direct_amount} + escrow {escrow_amount} != gross {gross_amount}"
            )));
        }
        Ok(Self {
            id,
            campaign_id,
            payment_ref,
            donor_ref: donor_ref.into(),
            gross_amount,
            escrow_amount,
            direct_amount,
            status: DonationStatus::Processing,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Settlement status of a single allocation slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// Submitted (or about to be); awaiting settlement confirmation.
    Processing,
    /// Confirmed on the settlement layer.
    Completed,
    /// The settlement layer rejected or definitively failed the call.
    FailedOnchain,
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::FailedOnchain => "failed_onchain",
        };
        f.write_str(s)
    }
}

impl FromStr for AllocationStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed_onchain" => Ok(Self::FailedOnchain),
            other => Err(LedgerError::Store(format!(
                "unknown allocation status: {other}"
            ))),
        }
    }
}

/// One slice of a donation's escrow, bound to a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub donation_id: DonationId,
    pub campaign_id: CampaignId,
    /// Milestone the slice funds.
    pub milestone_index: u32,
    pub amount: Money,
    pub status: AllocationStatus,
    /// Signer nonce consumed by the settlement call, once submitted.
    pub nonce: Option<u64>,
    /// Settlement transaction hash, once submitted.
    pub tx_hash: Option<String>,
    /// Failure detail for `FailedOnchain` slices.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// A fresh `Processing` allocation slice.
    pub fn new(
        donation_id: DonationId,
        campaign_id: CampaignId,
        milestone_index: u32,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AllocationId::new(),
            donation_id,
            campaign_id,
            milestone_index,
            amount,
            status: AllocationStatus::Processing,
            nonce: None,
            tx_hash: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_donation(gross: i64, escrow: i64, direct: i64) -> Result<Donation, LedgerError> {
        Donation::new(
            DonationId::new(),
            CampaignId::new(),
            PaymentRef::new("pi_1").unwrap(),
            "donor-1",
            Money::from_minor(gross),
            Money::from_minor(escrow),
            Money::from_minor(direct),
            Utc::now(),
        )
    }

    #[test]
    fn accepts_exact_split() {
        let d = mk_donation(150_000, 100_000, 50_000).unwrap();
        assert_eq!(d.status, DonationStatus::Processing);
        assert_eq!(d.gross_amount, Money::from_minor(150_000));
    }

    #[test]
    fn accepts_all_escrow_and_all_direct() {
        assert!(mk_donation(100, 100, 0).is_ok());
        assert!(mk_donation(100, 0, 100).is_ok());
    }

    #[test]
    fn rejects_mismatched_split() {
        assert!(mk_donation(150_000, 100_000, 49_999).is_err());
        assert!(mk_donation(150_000, 100_000, 50_001).is_err());
    }

    #[test]
    fn rejects_nonpositive_gross_and_negative_portions() {
        assert!(mk_donation(0, 0, 0).is_err());
        assert!(mk_donation(-100, -100, 0).is_err());
        assert!(mk_donation(100, 200, -100).is_err());
    }

    #[test]
    fn status_display_parse_roundtrip() {
        for s in [
            DonationStatus::Processing,
            DonationStatus::Completed,
            DonationStatus::PartiallyFailed,
        ] {
            assert_eq!(s.to_string().parse::<DonationStatus>().unwrap(), s);
        }
        for s in [
            AllocationStatus::Processing,
            AllocationStatus::Completed,
            AllocationStatus::FailedOnchain,
        ] {
            assert_eq!(s.to_string().parse::<AllocationStatus>().unwrap(), s);
        }
    }
}
