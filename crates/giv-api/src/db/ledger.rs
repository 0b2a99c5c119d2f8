// SPDX-License-Identifier: BUSL-1.1
//! # Postgres Ledger Store
//!
//! [`PgLedgerStore`] implements [`LedgerStore`] on top of the schema in
//! `migrations/0001_init.sql`. Aggregate mutations run in a transaction
//! with `SELECT ... FOR UPDATE` on the campaign row, so two concurrent
//! settlements of the same campaign serialize instead of losing an
//! update. Intake idempotency rides on the `UNIQUE` constraint on
//! `donations.payment_ref`: `INSERT ... ON CONFLICT DO NOTHING` with a
//! zero row count means a replay.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use giv_core::{AllocationId, CampaignId, DonationId, Money, PaymentRef};
use giv_ledger::{
    validate_transition, Allocation, AllocationStatus, AuditEntry, Campaign, Donation,
    DonationIntake, DonationSettlement, DonationStatus, LedgerError, LedgerStore, Milestone,
    MilestoneEvent, MilestoneStatus,
};
use giv_ledger::{require_cursor, ApprovalOutcome};

/// Postgres-backed ledger store.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> LedgerError {
    LedgerError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

const CAMPAIGN_COLUMNS: &str = "id, name, goal_amount, collected_amount, escrow_balance, \
     total_released, current_milestone_index, onchain_id, payout_account, \
     signer_key_id, signer_address, milestones, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    name: String,
    goal_amount: i64,
    collected_amount: i64,
    escrow_balance: i64,
    total_released: i64,
    current_milestone_index: i32,
    onchain_id: Option<i64>,
    payout_account: Option<String>,
    signer_key_id: String,
    signer_address: String,
    milestones: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CampaignRow {
    fn into_campaign(self) -> Result<Campaign, LedgerError> {
        let milestones: Vec<Milestone> =
            serde_json::from_value(self.milestones).map_err(|e| {
                LedgerError::Store(format!("corrupt milestones for campaign {}: {e}", self.id))
            })?;
        Ok(Campaign {
            id: self.id.into(),
            name: self.name,
            goal_amount: Money::from_minor(self.goal_amount),
            collected_amount: Money::from_minor(self.collected_amount),
            escrow_balance: Money::from_minor(self.escrow_balance),
            total_released: Money::from_minor(self.total_released),
            current_milestone_index: self.current_milestone_index as u32,
            onchain_id: self.onchain_id.map(|v| v as u64),
            payout_account: self.payout_account,
            signer_key_id: self.signer_key_id,
            signer_address: self.signer_address,
            milestones,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const DONATION_COLUMNS: &str = "id, campaign_id, payment_ref, donor_ref, gross_amount, \
     escrow_amount, direct_amount, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct DonationRow {
    id: Uuid,
    campaign_id: Uuid,
    payment_ref: String,
    donor_ref: String,
    gross_amount: i64,
    escrow_amount: i64,
    direct_amount: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DonationRow {
    fn into_donation(self) -> Result<Donation, LedgerError> {
        Ok(Donation {
            id: self.id.into(),
            campaign_id: self.campaign_id.into(),
            payment_ref: PaymentRef::new(self.payment_ref)
                .map_err(|e| LedgerError::Store(format!("corrupt payment_ref: {e}")))?,
            donor_ref: self.donor_ref,
            gross_amount: Money::from_minor(self.gross_amount),
            escrow_amount: Money::from_minor(self.escrow_amount),
            direct_amount: Money::from_minor(self.direct_amount),
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ALLOCATION_COLUMNS: &str = "id, donation_id, campaign_id, milestone_index, amount, \
     status, nonce, tx_hash, failure_reason, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AllocationRow {
    id: Uuid,
    donation_id: Uuid,
    campaign_id: Uuid,
    milestone_index: i32,
    amount: i64,
    status: String,
    nonce: Option<i64>,
    tx_hash: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AllocationRow {
    fn into_allocation(self) -> Result<Allocation, LedgerError> {
        Ok(Allocation {
            id: self.id.into(),
            donation_id: self.donation_id.into(),
            campaign_id: self.campaign_id.into(),
            milestone_index: self.milestone_index as u32,
            amount: Money::from_minor(self.amount),
            status: self.status.parse()?,
            nonce: self.nonce.map(|n| n as u64),
            tx_hash: self.tx_hash,
            failure_reason: self.failure_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    campaign_id: Uuid,
    action: String,
    detail: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_entry(self) -> AuditEntry {
        AuditEntry {
            id: self.id,
            campaign_id: self.campaign_id.into(),
            action: self.action,
            detail: self.detail,
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

impl PgLedgerStore {
    /// Load and row-lock a campaign inside `tx`.
    async fn lock_campaign(
        tx: &mut Transaction<'_, Postgres>,
        id: CampaignId,
    ) -> Result<Campaign, LedgerError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::CampaignNotFound(id))?;
        row.into_campaign()
    }

    /// Write back a campaign aggregate inside `tx`.
    async fn save_campaign(
        tx: &mut Transaction<'_, Postgres>,
        campaign: &Campaign,
    ) -> Result<(), LedgerError> {
        let milestones = serde_json::to_value(&campaign.milestones)
            .map_err(|e| LedgerError::Store(format!("serialize milestones: {e}")))?;
        sqlx::query(
            "UPDATE campaigns SET
                collected_amount = $2,
                escrow_balance = $3,
                total_released = $4,
                current_milestone_index = $5,
                onchain_id = $6,
                payout_account = $7,
                milestones = $8,
                updated_at = $9
             WHERE id = $1",
        )
        .bind(campaign.id.0)
        .bind(campaign.collected_amount.minor_units())
        .bind(campaign.escrow_balance.minor_units())
        .bind(campaign.total_released.minor_units())
        .bind(campaign.current_milestone_index as i32)
        .bind(campaign.onchain_id.map(|v| v as i64))
        .bind(&campaign.payout_account)
        .bind(milestones)
        .bind(campaign.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn allocations_of(
        &self,
        donation_id: DonationId,
    ) -> Result<Vec<Allocation>, LedgerError> {
        let rows = sqlx::query_as::<_, AllocationRow>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations \
             WHERE donation_id = $1 ORDER BY milestone_index"
        ))
        .bind(donation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(AllocationRow::into_allocation).collect()
    }

    /// Update one allocation's settlement outcome fields.
    async fn update_allocation(
        &self,
        id: AllocationId,
        status: AllocationStatus,
        failure_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE allocations SET status = $2, failure_reason = $3, updated_at = $4
             WHERE id = $1",
        )
        .bind(id.0)
        .bind(status.to_string())
        .bind(failure_reason)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::AllocationNotFound(id));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LedgerStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign, LedgerError> {
        let milestones = serde_json::to_value(&campaign.milestones)
            .map_err(|e| LedgerError::Store(format!("serialize milestones: {e}")))?;
        sqlx::query(
            "INSERT INTO campaigns (id, name, goal_amount, collected_amount, escrow_balance, \
             total_released, current_milestone_index, onchain_id, payout_account, \
             signer_key_id, signer_address, milestones, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(campaign.id.0)
        .bind(&campaign.name)
        .bind(campaign.goal_amount.minor_units())
        .bind(campaign.collected_amount.minor_units())
        .bind(campaign.escrow_balance.minor_units())
        .bind(campaign.total_released.minor_units())
        .bind(campaign.current_milestone_index as i32)
        .bind(campaign.onchain_id.map(|v| v as i64))
        .bind(&campaign.payout_account)
        .bind(&campaign.signer_key_id)
        .bind(&campaign.signer_address)
        .bind(milestones)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(campaign)
    }

    async fn campaign(&self, id: CampaignId) -> Result<Campaign, LedgerError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::CampaignNotFound(id))?;
        row.into_campaign()
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, LedgerError> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(CampaignRow::into_campaign).collect()
    }

    async fn provision_campaign(
        &self,
        id: CampaignId,
        onchain_id: u64,
        payout_account: &str,
        now: DateTime<Utc>,
    ) -> Result<Campaign, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut campaign = Self::lock_campaign(&mut tx, id).await?;
        campaign.onchain_id = Some(onchain_id);
        campaign.payout_account = Some(payout_account.to_string());
        campaign.updated_at = now;
        Self::save_campaign(&mut tx, &campaign).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(campaign)
    }

    async fn begin_donation(
        &self,
        donation: Donation,
        allocations: Vec<Allocation>,
    ) -> Result<DonationIntake, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            "INSERT INTO donations (id, campaign_id, payment_ref, donor_ref, gross_amount, \
             escrow_amount, direct_amount, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (payment_ref) DO NOTHING",
        )
        .bind(donation.id.0)
        .bind(donation.campaign_id.0)
        .bind(donation.payment_ref.as_str())
        .bind(&donation.donor_ref)
        .bind(donation.gross_amount.minor_units())
        .bind(donation.escrow_amount.minor_units())
        .bind(donation.direct_amount.minor_units())
        .bind(donation.status.to_string())
        .bind(donation.created_at)
        .bind(donation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            // Replay: surface the prior state instead.
            tx.rollback().await.map_err(db_err)?;
            let prior = self
                .donation_by_payment_ref(&donation.payment_ref)
                .await?
                .ok_or(LedgerError::DonationNotFound(donation.id))?;
            let prior_allocations = self.allocations_of(prior.id).await?;
            return Ok(DonationIntake::Duplicate {
                donation: prior,
                allocations: prior_allocations,
            });
        }

        for allocation in &allocations {
            sqlx::query(
                "INSERT INTO allocations (id, donation_id, campaign_id, milestone_index, \
                 amount, status, nonce, tx_hash, failure_reason, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(allocation.id.0)
            .bind(allocation.donation_id.0)
            .bind(allocation.campaign_id.0)
            .bind(allocation.milestone_index as i32)
            .bind(allocation.amount.minor_units())
            .bind(allocation.status.to_string())
            .bind(allocation.nonce.map(|n| n as i64))
            .bind(&allocation.tx_hash)
            .bind(&allocation.failure_reason)
            .bind(allocation.created_at)
            .bind(allocation.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(DonationIntake::Created {
            donation,
            allocations,
        })
    }

    async fn donation(&self, id: DonationId) -> Result<Donation, LedgerError> {
        let row = sqlx::query_as::<_, DonationRow>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::DonationNotFound(id))?;
        row.into_donation()
    }

    async fn donation_by_payment_ref(
        &self,
        payment_ref: &PaymentRef,
    ) -> Result<Option<Donation>, LedgerError> {
        let row = sqlx::query_as::<_, DonationRow>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE payment_ref = $1"
        ))
        .bind(payment_ref.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(DonationRow::into_donation).transpose()
    }

    async fn donations_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<Donation>, LedgerError> {
        let rows = sqlx::query_as::<_, DonationRow>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations \
             WHERE campaign_id = $1 ORDER BY created_at"
        ))
        .bind(campaign_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DonationRow::into_donation).collect()
    }

    async fn allocations_for_donation(
        &self,
        donation_id: DonationId,
    ) -> Result<Vec<Allocation>, LedgerError> {
        // 404 for an unknown donation, empty list for a direct-only one.
        self.donation(donation_id).await?;
        self.allocations_of(donation_id).await
    }

    async fn mark_allocation_submitted(
        &self,
        id: AllocationId,
        nonce: u64,
        tx_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE allocations SET nonce = $2, tx_hash = $3, updated_at = $4
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id.0)
        .bind(nonce as i64)
        .bind(tx_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::Store(format!(
                "allocation {id} missing or no longer processing"
            )));
        }
        Ok(())
    }

    async fn complete_allocation(
        &self,
        id: AllocationId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.update_allocation(id, AllocationStatus::Completed, None, now)
            .await
    }

    async fn fail_allocation(
        &self,
        id: AllocationId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.update_allocation(id, AllocationStatus::FailedOnchain, Some(reason), now)
            .await
    }

    async fn processing_allocations(&self) -> Result<Vec<Allocation>, LedgerError> {
        let rows = sqlx::query_as::<_, AllocationRow>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations \
             WHERE status = 'processing' ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(AllocationRow::into_allocation).collect()
    }

    async fn settle_donation(
        &self,
        donation_id: DonationId,
        now: DateTime<Utc>,
    ) -> Result<DonationSettlement, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let donation_row = sqlx::query_as::<_, DonationRow>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE id = $1 FOR UPDATE"
        ))
        .bind(donation_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::DonationNotFound(donation_id))?;
        let mut donation = donation_row.into_donation()?;
        if donation.status != DonationStatus::Processing {
            return Err(LedgerError::Store(format!(
                "donation {donation_id} is {}, already settled",
                donation.status
            )));
        }

        let allocation_rows = sqlx::query_as::<_, AllocationRow>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations \
             WHERE donation_id = $1 ORDER BY milestone_index"
        ))
        .bind(donation_id.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        let allocations: Vec<Allocation> = allocation_rows
            .into_iter()
            .map(AllocationRow::into_allocation)
            .collect::<Result<_, _>>()?;

        let mut completed_amount = Money::ZERO;
        let mut failed_amount = Money::ZERO;
        for a in &allocations {
            match a.status {
                AllocationStatus::Completed => {
                    completed_amount = completed_amount.checked_add(a.amount).ok_or_else(|| {
                        LedgerError::InvariantViolation("allocation sum overflow".to_string())
                    })?;
                }
                AllocationStatus::FailedOnchain => {
                    failed_amount = failed_amount.checked_add(a.amount).ok_or_else(|| {
                        LedgerError::InvariantViolation("allocation sum overflow".to_string())
                    })?;
                }
                AllocationStatus::Processing => {
                    return Err(LedgerError::Store(format!(
                        "donation {donation_id} has allocations still awaiting settlement"
                    )));
                }
            }
        }

        donation.status = if failed_amount.is_zero() {
            DonationStatus::Completed
        } else {
            DonationStatus::PartiallyFailed
        };
        donation.updated_at = now;
        sqlx::query("UPDATE donations SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(donation.id.0)
            .bind(donation.status.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // Campaign effects: credit everything that settled. Held funds
        // settle first, so the escrow balance grows by the settled sum
        // capped at the donation's escrowed portion. Failed slices never
        // reach the balances.
        let mut campaign = Self::lock_campaign(&mut tx, donation.campaign_id).await?;

        campaign.collected_amount = campaign
            .collected_amount
            .checked_add(completed_amount)
            .ok_or_else(|| LedgerError::InvariantViolation("collected overflow".to_string()))?;
        let escrow_credit = completed_amount.min(donation.escrow_amount);
        campaign.escrow_balance = campaign
            .escrow_balance
            .checked_add(escrow_credit)
            .ok_or_else(|| LedgerError::InvariantViolation("escrow overflow".to_string()))?;

        let mut cap_reached = false;
        for a in &allocations {
            if a.status != AllocationStatus::Completed {
                continue;
            }
            let campaign_id = campaign.id;
            let milestone = campaign
                .milestones
                .get_mut(a.milestone_index as usize)
                .ok_or(LedgerError::MilestoneNotFound {
                    campaign_id,
                    index: a.milestone_index,
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
        Self::save_campaign(&mut tx, &campaign).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(DonationSettlement {
            donation,
            campaign,
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
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut campaign = Self::lock_campaign(&mut tx, campaign_id).await?;
        require_cursor(&campaign, milestone_index)?;

        let milestone = campaign
            .milestones
            .get_mut(milestone_index as usize)
            .ok_or(LedgerError::CampaignClosed(campaign_id))?;
        milestone.status = validate_transition(milestone.status, MilestoneEvent::SubmitProof)?;
        milestone.proof_description = Some(description.to_string());
        milestone.evidence_refs = evidence_refs;
        milestone.proof_submitted_at = Some(now);
        milestone.rejection_reason = None;
        campaign.updated_at = now;

        Self::save_campaign(&mut tx, &campaign).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(campaign)
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
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut campaign = Self::lock_campaign(&mut tx, campaign_id).await?;
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
            .milestones
            .get_mut(milestone_index as usize)
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
        let next_index = campaign.current_milestone_index as usize;
        if let Some(next) = campaign.milestones.get_mut(next_index) {
            next.status = validate_transition(next.status, MilestoneEvent::Activate)?;
            if next.funded_amount >= next.target_amount {
                next.status = validate_transition(next.status, MilestoneEvent::CapReached)?;
                next.cap_reached_at = Some(now);
            }
        }

        campaign.updated_at = now;
        campaign.check_balances()?;
        Self::save_campaign(&mut tx, &campaign).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(ApprovalOutcome {
            campaign,
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
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut campaign = Self::lock_campaign(&mut tx, campaign_id).await?;
        require_cursor(&campaign, milestone_index)?;

        let milestone = campaign
            .milestones
            .get_mut(milestone_index as usize)
            .ok_or(LedgerError::CampaignClosed(campaign_id))?;
        milestone.status = validate_transition(milestone.status, MilestoneEvent::Reject)?;
        milestone.rejection_reason = Some(reason.to_string());
        campaign.updated_at = now;

        Self::save_campaign(&mut tx, &campaign).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(campaign)
    }

    async fn expire_deadlines(
        &self,
        now: DateTime<Utc>,
        proof_window: Duration,
    ) -> Result<Vec<(CampaignId, u32)>, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns \
             WHERE current_milestone_index < jsonb_array_length(milestones) \
             ORDER BY created_at FOR UPDATE"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut expired = Vec::new();
        for row in rows {
            let mut campaign = row.into_campaign()?;
            let id = campaign.id;
            let index = campaign.current_milestone_index;
            let Some(milestone) = campaign.milestones.get_mut(index as usize) else {
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
            Self::save_campaign(&mut tx, &campaign).await?;
            expired.push((id, index));
        }
        tx.commit().await.map_err(db_err)?;
        Ok(expired)
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO audit_log (id, campaign_id, action, detail, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.id)
        .bind(entry.campaign_id.0)
        .bind(&entry.action)
        .bind(&entry.detail)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn audit_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<AuditEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT id, campaign_id, action, detail, created_at FROM audit_log \
             WHERE campaign_id = $1 ORDER BY created_at",
        )
        .bind(campaign_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(AuditRow::into_entry).collect())
    }
}
