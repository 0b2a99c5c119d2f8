// SPDX-License-Identifier: BUSL-1.1
//! # Campaign and Milestone Records
//!
//! The campaign aggregate: running balances, the milestone cursor, and the
//! ordered milestone list. Balance fields are denormalized sums maintained
//! by the store's atomic operations; the invariants they must satisfy are
//! asserted by [`Campaign::check_balances`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use giv_core::{CampaignId, Money};

use crate::error::LedgerError;
use crate::milestone::MilestoneStatus;

/// One milestone within a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Zero-based position in the campaign's milestone list.
    pub index: u32,
    /// Funding cap for this milestone.
    pub target_amount: Money,
    /// Escrow settled against this milestone so far. May exceed the
    /// target on the final milestone, which absorbs all spillover.
    pub funded_amount: Money,
    /// Lifecycle status.
    pub status: MilestoneStatus,
    /// When the funding cap was reached (starts the proof window).
    pub cap_reached_at: Option<DateTime<Utc>>,
    /// NGO-provided description of the completed work.
    pub proof_description: Option<String>,
    /// Links or digests of supporting evidence.
    pub evidence_refs: Vec<String>,
    /// When the latest proof was submitted.
    pub proof_submitted_at: Option<DateTime<Utc>>,
    /// Reviewer's reason for the latest rejection, if any.
    pub rejection_reason: Option<String>,
    /// When the milestone was approved.
    pub approved_at: Option<DateTime<Utc>>,
    /// Settlement transaction hash of the on-chain approval.
    pub approval_tx_hash: Option<String>,
    /// Payout rail transfer id for the released escrow.
    pub payout_transfer_id: Option<String>,
}

impl Milestone {
    /// A fresh milestone at the given position. The first milestone starts
    /// `Active`, the rest `Locked`.
    pub fn new(index: u32, target_amount: Money) -> Self {
        Self {
            index,
            target_amount,
            funded_amount: Money::ZERO,
            status: if index == 0 {
                MilestoneStatus::Active
            } else {
                MilestoneStatus::Locked
            },
            cap_reached_at: None,
            proof_description: None,
            evidence_refs: Vec::new(),
            proof_submitted_at: None,
            rejection_reason: None,
            approved_at: None,
            approval_tx_hash: None,
            payout_transfer_id: None,
        }
    }
}

/// A fundraising campaign with milestone-escrowed payouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    /// Display name.
    pub name: String,
    /// Overall fundraising goal (informational; milestone caps govern flow).
    pub goal_amount: Money,
    /// Sum of settled donation amounts.
    pub collected_amount: Money,
    /// Escrowed funds not yet released to the NGO.
    pub escrow_balance: Money,
    /// Total escrow released across approved milestones.
    pub total_released: Money,
    /// Index of the milestone currently accepting funds/review.
    pub current_milestone_index: u32,
    /// Campaign id on the settlement contract, once registered.
    pub onchain_id: Option<u64>,
    /// NGO account on the payout rail, once provisioned.
    pub payout_account: Option<String>,
    /// Custody key id used to sign settlement calls for this campaign.
    pub signer_key_id: String,
    /// Settlement address derived from the custody key.
    pub signer_address: String,
    /// Ordered milestone list.
    pub milestones: Vec<Milestone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Build a new campaign with the given milestone targets.
    ///
    /// Rejects an empty target list and non-positive targets.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CampaignId,
        name: impl Into<String>,
        goal_amount: Money,
        milestone_targets: &[Money],
        signer_key_id: impl Into<String>,
        signer_address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        if milestone_targets.is_empty() {
            return Err(LedgerError::InvariantViolation(
                "a campaign needs at least one milestone".to_string(),
            ));
        }
        if milestone_targets.iter().any(|t| !t.is_positive()) {
            return Err(LedgerError::NonPositiveAmount);
        }

        let milestones = milestone_targets
            .iter()
            .enumerate()
            .map(|(i, target)| Milestone::new(i as u32, *target))
            .collect();

        Ok(Self {
            id,
            name: name.into(),
            goal_amount,
            collected_amount: Money::ZERO,
            escrow_balance: Money::ZERO,
            total_released: Money::ZERO,
            current_milestone_index: 0,
            onchain_id: None,
            payout_account: None,
            signer_key_id: signer_key_id.into(),
            signer_address: signer_address.into(),
            milestones,
            created_at: now,
            updated_at: now,
        })
    }

    /// Number of milestones.
    pub fn milestone_count(&self) -> u32 {
        self.milestones.len() as u32
    }

    /// True while the cursor still points at an unresolved milestone.
    pub fn is_open(&self) -> bool {
        (self.current_milestone_index as usize) < self.milestones.len()
            && !self.milestones[self.current_milestone_index as usize]
                .status
                .is_terminal()
    }

    /// The milestone under the cursor, if the campaign is still open.
    pub fn current_milestone(&self) -> Option<&Milestone> {
        self.milestones.get(self.current_milestone_index as usize)
    }

    /// Mutable access to the milestone under the cursor.
    pub(crate) fn current_milestone_mut(&mut self) -> Option<&mut Milestone> {
        self.milestones
            .get_mut(self.current_milestone_index as usize)
    }

    /// Milestone by index.
    pub fn milestone(&self, index: u32) -> Result<&Milestone, LedgerError> {
        self.milestones
            .get(index as usize)
            .ok_or(LedgerError::MilestoneNotFound {
                campaign_id: self.id,
                index,
            })
    }

    /// Remaining escrow capacity of milestone `index`
    /// (`target - funded`, floored at zero).
    pub fn milestone_headroom(&self, index: u32) -> Result<Money, LedgerError> {
        let m = self.milestone(index)?;
        Ok(m.target_amount
            .checked_sub(m.funded_amount)
            .filter(|d| d.is_positive())
            .unwrap_or(Money::ZERO))
    }

    /// Cumulative funding cap up to and including milestone `index`:
    /// the sum of targets `0..=index`.
    pub fn cumulative_cap(&self, index: u32) -> Result<Money, LedgerError> {
        if index as usize >= self.milestones.len() {
            return Err(LedgerError::MilestoneNotFound {
                campaign_id: self.id,
                index,
            });
        }
        self.milestones[..=index as usize]
            .iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m.target_amount))
            .ok_or_else(|| {
                LedgerError::InvariantViolation("milestone cap sum overflow".to_string())
            })
    }

    /// Assert the denormalized balance invariants.
    ///
    /// `collected == escrow + released + direct` cannot be checked here
    /// (direct amounts are not stored on the campaign); what can is that
    /// escrow and released never exceed collected and nothing goes
    /// negative.
    pub fn check_balances(&self) -> Result<(), LedgerError> {
        if self.escrow_balance.minor_units() < 0
            || self.total_released.minor_units() < 0
            || self.collected_amount.minor_units() < 0
        {
            return Err(LedgerError::InvariantViolation(format!(
                "campaign {} has a negative balance (collected={}, escrow={}, released={})",
                self.id, self.collected_amount, self.escrow_balance, self.total_released
            )));
        }
        let held_plus_released = self
            .escrow_balance
            .checked_add(self.total_released)
            .ok_or_else(|| {
                LedgerError::InvariantViolation("balance sum overflow".to_string())
            })?;
        if held_plus_released > self.collected_amount {
            return Err(LedgerError::InvariantViolation(format!(
                "campaign {}: escrow {} + released {} exceeds collected {}",
                self.id, self.escrow_balance, self.total_released, self.collected_amount
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(targets: &[i64]) -> Campaign {
        let targets: Vec<Money> = targets.iter().map(|t| Money::from_major(*t)).collect();
        Campaign::new(
            CampaignId::new(),
            "Clean Water",
            Money::from_major(5_000),
            &targets,
            "ngo-1",
            "0x00000000000000000000000000000000000000aa",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn first_milestone_starts_active_rest_locked() {
        let c = campaign(&[1_000, 2_000, 2_000]);
        assert_eq!(c.milestones[0].status, MilestoneStatus::Active);
        assert_eq!(c.milestones[1].status, MilestoneStatus::Locked);
        assert_eq!(c.milestones[2].status, MilestoneStatus::Locked);
        assert_eq!(c.current_milestone_index, 0);
        assert!(c.is_open());
    }

    #[test]
    fn cumulative_caps() {
        let c = campaign(&[1_000, 2_000, 2_000]);
        assert_eq!(c.cumulative_cap(0).unwrap(), Money::from_major(1_000));
        assert_eq!(c.cumulative_cap(1).unwrap(), Money::from_major(3_000));
        assert_eq!(c.cumulative_cap(2).unwrap(), Money::from_major(5_000));
        assert!(c.cumulative_cap(3).is_err());
    }

    #[test]
    fn rejects_empty_and_nonpositive_targets() {
        assert!(Campaign::new(
            CampaignId::new(),
            "x",
            Money::from_major(1),
            &[],
            "k",
            "a",
            Utc::now(),
        )
        .is_err());
        assert!(Campaign::new(
            CampaignId::new(),
            "x",
            Money::from_major(1),
            &[Money::ZERO],
            "k",
            "a",
            Utc::now(),
        )
        .is_err());
    }

    #[test]
    fn balance_invariants() {
        let mut c = campaign(&[1_000]);
        c.collected_amount = Money::from_major(500);
        c.escrow_balance = Money::from_major(300);
        c.total_released = Money::from_major(200);
        assert!(c.check_balances().is_ok());

        c.total_released = Money::from_major(300);
        assert!(c.check_balances().is_err());

        c.total_released = Money::from_minor(-1);
        assert!(c.check_balances().is_err());
    }

    #[test]
    fn closed_when_terminal_under_cursor() {
        let mut c = campaign(&[1_000]);
        c.milestones[0].status = MilestoneStatus::FailedDeadline;
        assert!(!c.is_open());

        let mut c = campaign(&[1_000]);
        c.milestones[0].status = MilestoneStatus::Approved;
        c.current_milestone_index = 1;
        assert!(!c.is_open());
        assert!(c.current_milestone().is_none());
    }
}
