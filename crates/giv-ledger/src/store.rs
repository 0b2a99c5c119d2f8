// SPDX-License-Identifier: BUSL-1.1
//! # Ledger Store
//!
//! Persistence seam for the reconciliation engine. The orchestrator talks
//! only to [`LedgerStore`]; the API service provides a Postgres
//! implementation, and [`MemoryLedgerStore`] backs tests and DB-less
//! development.
//!
//! Multi-record updates (`settle_donation`, `approve_milestone`) are
//! atomic per implementation: the memory store holds the campaign entry's
//! write lock across the whole mutation, the Postgres store uses a
//! transaction with a row lock on the campaign.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use giv_core::{AllocationId, CampaignId, DonationId, Money, PaymentRef};

use crate::audit::AuditEntry;
use crate::campaign::Campaign;
use crate::donation::{Allocation, AllocationStatus, Donation, DonationStatus};
use crate::error::LedgerError;
use crate::milestone::{validate_transition, MilestoneEvent, MilestoneStatus};

// ─── Outcome types ───────────────────────────────────────────────────────

/// Result of the idempotent donation-intake insert.
#[derive(Debug, Clone)]
pub enum DonationIntake {
    /// First delivery: the donation and its allocation plan were recorded.
    Created {
        donation: Donation,
        allocations: Vec<Allocation>,
    },
    /// Replay of an already-recorded payment reference. Carries the prior
    /// state so the caller can answer with the original outcome.
    Duplicate {
        donation: Donation,
        allocations: Vec<Allocation>,
    },
}

/// Result of finalizing a donation after settlement.
#[derive(Debug, Clone)]
pub struct DonationSettlement {
    pub donation: Donation,
    pub campaign: Campaign,
    /// Portion of the gross that settled on-chain.
    pub completed_amount: Money,
    /// Portion whose settlement definitively failed.
    pub failed_amount: Money,
    /// True if this settlement pushed the current milestone to its cap.
    pub cap_reached: bool,
}

/// Result of an atomic milestone approval.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub campaign: Campaign,
    /// Escrow released to the NGO by this approval.
    pub amount_released: Money,
}

// ─── Trait ───────────────────────────────────────────────────────────────

/// Persistence operations the reconciliation orchestrator needs.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // -- campaigns --

    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign, LedgerError>;

    async fn campaign(&self, id: CampaignId) -> Result<Campaign, LedgerError>;

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, LedgerError>;

    /// Record settlement registration and payout provisioning results.
    async fn provision_campaign(
        &self,
        id: CampaignId,
        onchain_id: u64,
        payout_account: &str,
        now: DateTime<Utc>,
    ) -> Result<Campaign, LedgerError>;

    // -- donations and allocations --

    /// Insert a donation and its allocation plan, or detect a replay of
    /// the same payment reference. Atomic: two concurrent deliveries of
    /// one payment reference yield exactly one `Created`.
    async fn begin_donation(
        &self,
        donation: Donation,
        allocations: Vec<Allocation>,
    ) -> Result<DonationIntake, LedgerError>;

    async fn donation(&self, id: DonationId) -> Result<Donation, LedgerError>;

    async fn donation_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Donation>, LedgerError>;

    async fn donations_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Donation>, LedgerError>;

    async fn allocations_for_donation(
        &self,
        donation_id: DonationId,
    ) -> Result<Vec<Allocation>, LedgerError>;

    /// Record the settlement submission (nonce + transaction hash) for an
    /// allocation still in `Processing`.
    async fn mark_allocation_submitted(
        &self,
        id: AllocationId,
        nonce: u64,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    async fn complete_allocation(
        &self,
        id: AllocationId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    async fn fail_allocation(
        &self,
        id: AllocationId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Allocations still awaiting settlement confirmation, for the
    /// settlement sweep.
    async fn processing_allocations(&self) -> Result<Vec<Allocation>, LedgerError>;

    /// Finalize a donation after its allocations were settled: set the
    /// donation status from the per-slice outcomes and apply the campaign
    /// balance and milestone-cap effects atomically.
    async fn settle_donation(
        &self,
        donation_id: DonationId,
        now: DateTime<Utc>,
    ) -> Result<DonationSettlement, LedgerError>;

    // -- milestone lifecycle --

    /// Record a proof submission for the campaign's current milestone.
    async fn submit_proof(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
        description: &str,
        evidence_refs: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Campaign, LedgerError>;

    /// Approve the current milestone: release the campaign's entire
    /// escrow balance (spillover included), advance the cursor, and
    /// activate the next milestone. `expected_release` guards against the
    /// balance changing between the caller's read and this write.
    /// `payout_transfer_id` is `None` when the balance was zero and no
    /// payout was issued.
    async fn approve_milestone(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
        expected_release: Money,
        approval_tx_hash: &str,
        payout_transfer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalOutcome, LedgerError>;

    /// Reject the current milestone's proof. Changes only the milestone
    /// status and rejection reason; balances and cursor are untouched.
    async fn reject_milestone(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Campaign, LedgerError>;

    /// Fail every current milestone whose proof window (measured from
    /// `cap_reached_at`) has elapsed. Returns the (campaign, milestone)
    /// pairs that expired.
    async fn expire_deadlines(
        &self,
        now: DateTime<Utc>,
        proof_window: Duration,
    ) -> Result<Vec<(CampaignId, u32)>, LedgerError>;

    // -- audit --

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), LedgerError>;

    async fn audit_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<AuditEntry>, LedgerError>;
}

// ─── In-memory implementation ────────────────────────────────────────────

/// DashMap-backed store for tests and DB-less development.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    campaigns: DashMap<CampaignId, Campaign>,
    donations: DashMap<DonationId, Donation>,
    allocations: DashMap<AllocationId, Allocation>,
    by_payment_ref: DashMap<String, DonationId>,
    audit: DashMap<CampaignId, Vec<AuditEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocations_of(&self, donation_id: DonationId) -> Vec<Allocation> {
        let mut out: Vec<Allocation> = self
            .allocations
            .iter()
            .filter(|a| a.donation_id == donation_id)
            .map(|a| a.clone())
            .collect();
        out.sort_by_key(|a| a.milestone_index);
        out
    }
}

/// Check that an operation targets the cursor milestone of an open
/// campaign. Shared by every [`LedgerStore`] implementation.
pub fn require_cursor(campaign: &Campaign, milestone_index: u32) -> Result<(), LedgerError> {
    if !campaign.is_open() {
        return Err(LedgerError::CampaignClosed(campaign.id));
    }
    if campaign.current_milestone_index != milestone_index {
        return Err(LedgerError::MilestoneCursorMismatch {
            campaign_id: campaign.id,
            requested: milestone_index,
            current: campaign.current_milestone_index,
        });
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign, LedgerError> {
        match self.campaigns.entry(campaign.id) {
            Entry::Occupied(_) => Err(LedgerError::Store(format!(
                "campaign {} already exists",
                campaign.id
            ))),
            Entry::Vacant(v) => {
                v.insert(campaign.clone());
                Ok(campaign)
            }
        }
    }

    async fn campaign(&self, id: CampaignId) -> Result<Campaign, LedgerError> {
        self.campaigns
            .get(&id)
            .map(|c| c.clone())
            .ok_or(LedgerError::CampaignNotFound(id))
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, LedgerError> {
        let mut out: Vec<Campaign> = self.campaigns.iter().map(|c| c.clone()).collect();
        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }

    async fn provision_campaign(
        &self,
        id: CampaignId,
        onchain_id: u64,
        payout_account: &str,
        now: DateTime<Utc>,
    ) -> Result<Campaign, LedgerError> {
        let mut campaign = self
            .campaigns
            .get_mut(&id)
            .ok_or(LedgerError::CampaignNotFound(id))?;
        campaign.onchain_id = Some(onchain_id);
        campaign.payout_account = Some(payout_account.to_string());
        campaign.updated_at = now;
        Ok(campaign.clone())
    }

    async fn begin_donation(
        &self,
        donation: Donation,
        allocations: Vec<Allocation>,
    ) -> Result<DonationIntake, LedgerError> {
        if !self.campaigns.contains_key(&donation.campaign_id) {
            return Err(LedgerError::CampaignNotFound(donation.campaign_id));
        }

        match self
            .by_payment_ref
            .entry(donation.payment_ref.as_str().to_string())
        {
            Entry::Occupied(existing) => {
                let prior_id = *existing.get();
                let prior = self
                    .donations
                    .get(&prior_id)
                    .map(|d| d.clone())
                    .ok_or(LedgerError::DonationNotFound(prior_id))?;
                let prior_allocations = self.allocations_of(prior_id);
                Ok(DonationIntake::Duplicate {
                    donation: prior,
                    allocations: prior_allocations,
                })
            }
            Entry::Vacant(slot) => {
                self.donations.insert(donation.id, donation.clone());
                for allocation in &allocations {
                    self.allocations.insert(allocation.id, allocation.clone());
                }
                slot.insert(donation.id);
                Ok(DonationIntake::Created {
                    donation,
                    allocations,
                })
            }
        }
    }

    async fn donation(&self, id: DonationId) -> Result<Donation, LedgerError> {
        self.donations
            .get(&id)
            .map(|d| d.clone())
            .ok_or(LedgerError::DonationNotFound(id))
    }

    async fn donation_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Donation>, LedgerError> {
        let Some(id) = self.by_payment_ref.get(payment_ref.as_str()).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.donations.get(&id).map(|d| d.clone()))
    }

    async fn donations_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Donation>, LedgerError> {
        let mut out: Vec<Donation> = self
            .donations
            .iter()
            .filter(|d| d.campaign_id == campaign_id)
            .map(|d| d.clone())
            .collect();
        out.sort_by_key(|d| d.created_at);
        Ok(out)
    }

    async fn allocations_for_donation(
        &self,
        donation_id: DonationId,
    ) -> Result<Vec<Allocation>, LedgerError> {
        if !self.donations.contains_key(&donation_id) {
            return Err(LedgerError::DonationNotFound(donation_id));
        }
        Ok(self.allocations_of(donation_id))
    }

    async fn mark_allocation_submitted(
        &self,
        id: AllocationId,
        nonce: u64,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut allocation = self
            .allocations
            .get_mut(&id)
            .ok_or(LedgerError::AllocationNotFound(id))?;
        if allocation.status != AllocationStatus::Processing {
            return Err(LedgerError::Store(format!(
                "allocation {id} is {}, not processing",
                allocation.status
            )));
        }
        allocation.nonce = Some(nonce);
        allocation.tx_hash = Some(tx_hash.to_string());
        allocation.updated_at = now;
        Ok(())
    }

    async fn complete_allocation(
        &self,
        id: AllocationId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut allocation = self
            .allocations
            .get_mut(&id)
            .ok_or(LedgerError::AllocationNotFound(id))?;
        allocation.status = AllocationStatus::Completed;
        allocation.failure_reason = None;
        allocation.updated_at = now;
        Ok(())
    }

    async fn fail_allocation(
        &self,
        id: AllocationId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut allocation = self
            .allocations
            .get_mut(&id)
            .ok_or(LedgerError::AllocationNotFound(id))?;
        allocation.status = AllocationStatus::FailedOnchain;
        allocation.failure_reason = Some(reason.to_string());
        allocation.updated_at = now;
        Ok(())
    }

    async fn processing_allocations(&self) -> Result<Vec<Allocation>, LedgerError> {
        let mut out: Vec<Allocation> = self
            .allocations
            .iter()
            .filter(|a| a.status == AllocationStatus::Processing)
            .map(|a| a.clone())
            .collect();
        out.sort_by_key(|a| a.created_at);
        Ok(out)
    }

    async fn settle_donation(
        &self,
        donation_id: DonationId,
        now: DateTime<Utc>,
    ) -> Result<DonationSettlement, LedgerError> {
        let allocations = self.allocations_of(donation_id);

        let mut donation = self
            .donations
            .get_mut(&donation_id)
            .ok_or(LedgerError::DonationNotFound(donation_id))?;
        if donation.status != DonationStatus::Processing {
            return Err(LedgerError::Store(format!(
                "donation {donation_id} is {}, already settled",
                donation.status
            )));
        }

        let mut completed_amount = Money::ZERO;
        let mut failed_amount = Money::ZERO;
        let mut any_pending = false;
        for a in &allocations {
            match a.status {
                AllocationStatus::Completed => {
                    completed_amount = completed_amount
                        .checked_add(a.amount)
                        .ok_or_else(|| {
                            LedgerError::InvariantViolation("allocation sum overflow".to_string())
                        })?;
                }
                AllocationStatus::FailedOnchain => {
                    failed_amount = failed_amount.checked_add(a.amount).ok_or_else(|| {
                        LedgerError::InvariantViolation("allocation sum overflow".to_string())
                    })?;
                }
                AllocationStatus::Processing => any_pending = true,
            }
        }
        if any_pending {
            return Err(LedgerError::Store(format!(
                "donation {donation_id} has allocations still awaiting settlement"
            )));
        }

        donation.status = if failed_amount.is_zero() {
            DonationStatus::Completed
        } else {
            DonationStatus::PartiallyFailed
        };
        donation.updated_at = now;
        let donation_snapshot = donation.clone();
        drop(donation);

        // Campaign effects: credit everything that settled. Held funds
        // settle first, so the escrow balance grows by the settled sum
        // capped at the donation's escrowed portion. Failed slices never
        // reach the balances.
        let mut campaign = self
            .campaigns
            .get_mut(&donation_snapshot.campaign_id)
            .ok_or(LedgerError::CampaignNotFound(donation_snapshot.campaign_id))?;

        campaign.collected_amount = campaign
            .collected_amount
            .checked_add(completed_amount)
            .ok_or_else(|| LedgerError::InvariantViolation("collected overflow".to_string()))?;
        let escrow_credit = completed_amount.min(donation_snapshot.escrow_amount);
        campaign.escrow_balance = campaign
            .escrow_balance
            .checked_add(escrow_credit)
            .ok_or_else(|| LedgerError::InvariantViolation("escrow overflow".to_string()))?;

        let mut cap_reached = false;
        for a in &allocations {
            if a.status != AllocationStatus::Completed {
                continue;
            }
            let idx = a.milestone_index as usize;
            let milestone = campaign.milestones.get_mut(idx).ok_or({
                LedgerError::MilestoneNotFound {
                    campaign_id: donation_snapshot.campaign_id,
                    index: a.milestone_index,
                }
            })?;
            milestone.funded_amount =
                milestone.funded_amount.checked_add(a.amount).ok_or_else(|| {
                    LedgerError::InvariantViolation("funded overflow".to_string())
                })?;
            if milestone.status == MilestoneStatus::Active
                && milestone.funded_amount >= milestone.target_amount
            {
                milestone.status =
                    validate_transition(milestone.status, MilestoneEvent::CapReached)?;
                milestone.cap_reached_at = Some(now);
                cap_reached = true;
            }
        }

        campaign.updated_at = now;
        campaign.check_balances()?;
        let campaign_snapshot = campaign.clone();

        Ok(DonationSettlement {
            donation: donation_snapshot,
            campaign: campaign_snapshot,
            completed_amount,
            failed_amount,
            cap_reached,
        })
    }

    async fn submit_proof(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
        description: &str,
        evidence_refs: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Campaign, LedgerError> {
        let mut campaign = self
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(LedgerError::CampaignNotFound(campaign_id))?;
        require_cursor(&campaign, milestone_index)?;

        let milestone = campaign
            .current_milestone_mut()
            .ok_or(LedgerError::CampaignClosed(campaign_id))?;
        milestone.status =
            validate_transition(milestone.status, MilestoneEvent::SubmitProof)?;
        milestone.proof_description = Some(description.to_string());
        milestone.evidence_refs = evidence_refs;
        milestone.proof_submitted_at = Some(now);
        milestone.rejection_reason = None;
        campaign.updated_at = now;
        Ok(campaign.clone())
    }

    async fn approve_milestone(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
        expected_release: Money,
        approval_tx_hash: &str,
        payout_transfer_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalOutcome, LedgerError> {
        let mut campaign = self
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(LedgerError::CampaignNotFound(campaign_id))?;
        require_cursor(&campaign, milestone_index)?;

        // The entire escrow bucket goes out, spillover included.
        let released = campaign.escrow_balance;
        if released != expected_release {
            return Err(LedgerError::InvariantViolation(format!(
                "campaign escrow balance is {released}, \
                 approval was prepared for {expected_release}"
            )));
        }

        let milestone = campaign
            .current_milestone_mut()
            .ok_or(LedgerError::CampaignClosed(campaign_id))?;
        milestone.status = validate_transition(milestone.status, MilestoneEvent::Approve)?;
        milestone.approved_at = Some(now);
        milestone.approval_tx_hash = Some(approval_tx_hash.to_string());
        milestone.payout_transfer_id = payout_transfer_id.map(str::to_string);

        campaign.escrow_balance = Money::ZERO;
        campaign.total_released =
            campaign.total_released.checked_add(released).ok_or_else(|| {
                LedgerError::InvariantViolation("released overflow".to_string())
            })?;
        campaign.current_milestone_index += 1;

        // Activate the next milestone; if spillover already filled it,
        // it goes straight to awaiting proof.
        if let Some(next) = campaign.current_milestone_mut() {
            next.status = validate_transition(next.status, MilestoneEvent::Activate)?;
            if next.funded_amount >= next.target_amount {
                next.status = validate_transition(next.status, MilestoneEvent::CapReached)?;
                next.cap_reached_at = Some(now);
            }
        }

        campaign.updated_at = now;
        campaign.check_balances()?;
        Ok(ApprovalOutcome {
            campaign: campaign.clone(),
            amount_released: released,
        })
    }

    async fn reject_milestone(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Campaign, LedgerError> {
        let mut campaign = self
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(LedgerError::CampaignNotFound(campaign_id))?;
        require_cursor(&campaign, milestone_index)?;

        let milestone = campaign
            .current_milestone_mut()
            .ok_or(LedgerError::CampaignClosed(campaign_id))?;
        milestone.status = validate_transition(milestone.status, MilestoneEvent::Reject)?;
        milestone.rejection_reason = Some(reason.to_string());
        campaign.updated_at = now;
        Ok(campaign.clone())
    }

    async fn expire_deadlines(
        &self,
        now: DateTime<Utc>,
        proof_window: Duration,
    ) -> Result<Vec<(CampaignId, u32)>, LedgerError> {
        let mut expired = Vec::new();
        for mut campaign in self.campaigns.iter_mut() {
            let id = campaign.id;
            let index = campaign.current_milestone_index;
            let Some(milestone) = campaign.current_milestone_mut() else {
                continue;
            };
            if !matches!(
                milestone.status,
                MilestoneStatus::PendingProof | MilestoneStatus::Rejected
            ) {
                continue;
            }
            let Some(cap_reached_at) = milestone.cap_reached_at else {
                continue;
            };
            if cap_reached_at + proof_window > now {
                continue;
            }
            milestone.status =
                validate_transition(milestone.status, MilestoneEvent::DeadlineExpired)?;
            campaign.updated_at = now;
            expired.push((id, index));
        }
        Ok(expired)
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), LedgerError> {
        self.audit
            .entry(entry.campaign_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn audit_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<AuditEntry>, LedgerError> {
        Ok(self
            .audit
            .get(&campaign_id)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }
}
