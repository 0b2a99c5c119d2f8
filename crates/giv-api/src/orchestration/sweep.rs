// SPDX-License-Identifier: BUSL-1.1
//! # Background Sweeps
//!
//! Two operator-triggered reconciliation passes:
//!
//! - Deadline sweep: fail milestones whose proof window elapsed without
//!   an approved proof, closing their campaigns to new donations.
//! - Settlement sweep: re-poll allocations whose confirmation outlived
//!   the inline window, submit slices the intake path never reached
//!   before it broke off, then finalize any donation whose slices have
//!   all resolved.
//!
//! Both are idempotent; running them twice changes nothing the second
//! time.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use giv_core::{CampaignId, DonationId};
use giv_ledger::{AllocationStatus, AuditEntry, DonationStatus};
use giv_settlement::TxStatus;

use crate::error::AppError;
use crate::orchestration::donation::SliceOutcome;
use crate::orchestration::Engine;

/// One milestone failed by the deadline sweep.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExpiredMilestone {
    #[schema(value_type = String)]
    pub campaign_id: CampaignId,
    pub milestone_index: u32,
}

/// Result of one deadline sweep pass.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeadlineSweepReport {
    pub expired: Vec<ExpiredMilestone>,
}

/// Result of one settlement sweep pass.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SettlementSweepReport {
    /// Allocations confirmed and completed this pass (re-polled or
    /// freshly submitted).
    pub completed: u32,
    /// Allocations failed this pass (reverted, or skipped behind a
    /// failed slice).
    pub failed: u32,
    /// Allocations still awaiting confirmation.
    pub still_pending: u32,
    /// Donations whose slices all resolved and were finalized.
    pub donations_settled: u32,
}

impl Engine {
    /// Fail every current milestone whose proof window has elapsed.
    pub async fn deadline_sweep(
        &self,
        proof_window: chrono::Duration,
    ) -> Result<DeadlineSweepReport, AppError> {
        let now = Utc::now();
        let expired = self.store.expire_deadlines(now, proof_window).await?;

        let mut report = DeadlineSweepReport {
            expired: Vec::with_capacity(expired.len()),
        };
        for (campaign_id, milestone_index) in expired {
            self.store
                .append_audit(AuditEntry::new(
                    campaign_id,
                    "milestone_deadline_expired",
                    serde_json::json!({ "milestone_index": milestone_index }),
                    now,
                ))
                .await?;
            tracing::warn!(
                campaign_id = %campaign_id,
                milestone_index,
                "proof window elapsed; milestone failed and campaign closed"
            );
            report.expired.push(ExpiredMilestone {
                campaign_id,
                milestone_index,
            });
        }
        Ok(report)
    }

    /// Re-poll in-flight allocations, resume slices the intake path
    /// never submitted, and finalize fully resolved donations.
    pub async fn settlement_sweep(&self) -> Result<SettlementSweepReport, AppError> {
        let mut report = SettlementSweepReport::default();
        let mut touched: BTreeSet<DonationId> = BTreeSet::new();

        // First pass: resolve submitted slices by their tx status. Slices
        // without a tx hash (intake broke off before reaching them) are
        // picked up in milestone order below.
        for allocation in self.store.processing_allocations().await? {
            touched.insert(allocation.donation_id);
            let Some(tx_hash) = allocation.tx_hash.clone() else {
                continue;
            };
            match self.settlement.transaction_status(&tx_hash).await {
                Ok(TxStatus::Confirmed) => {
                    self.store
                        .complete_allocation(allocation.id, Utc::now())
                        .await?;
                    report.completed += 1;
                }
                Ok(TxStatus::Failed) => {
                    self.store
                        .fail_allocation(allocation.id, "reverted on-chain", Utc::now())
                        .await?;
                    report.failed += 1;
                }
                Ok(TxStatus::Pending) => {
                    report.still_pending += 1;
                }
                Err(e) => {
                    tracing::warn!(tx_hash, error = %e, "status poll failed during sweep");
                    report.still_pending += 1;
                }
            }
        }

        // Second pass: per donation, walk the slices in milestone order,
        // submitting the ones intake never got to. The same ordering rule
        // as intake applies: nothing is submitted behind a failed slice.
        for donation_id in touched {
            let donation = self.store.donation(donation_id).await?;
            if donation.status != DonationStatus::Processing {
                continue;
            }
            let campaign = self.store.campaign(donation.campaign_id).await?;

            let mut blocked = false;
            let mut skip_reason: Option<String> = None;
            for allocation in self.store.allocations_for_donation(donation_id).await? {
                match allocation.status {
                    AllocationStatus::Completed => {}
                    AllocationStatus::FailedOnchain => {
                        if skip_reason.is_none() {
                            skip_reason = Some(format!(
                                "skipped: allocation for milestone {} failed",
                                allocation.milestone_index
                            ));
                        }
                    }
                    AllocationStatus::Processing if allocation.tx_hash.is_some() => {
                        // Submitted but unresolved this pass.
                        blocked = true;
                        break;
                    }
                    AllocationStatus::Processing => {
                        if let Some(reason) = &skip_reason {
                            self.store
                                .fail_allocation(allocation.id, reason, Utc::now())
                                .await?;
                            report.failed += 1;
                            continue;
                        }
                        match self
                            .settle_allocation(&campaign, &donation, &allocation)
                            .await?
                        {
                            SliceOutcome::Completed => report.completed += 1,
                            SliceOutcome::Failed(_) => {
                                report.failed += 1;
                                skip_reason = Some(format!(
                                    "skipped: allocation for milestone {} failed",
                                    allocation.milestone_index
                                ));
                            }
                            SliceOutcome::InFlight => {
                                report.still_pending += 1;
                                blocked = true;
                                break;
                            }
                        }
                    }
                }
            }
            if blocked {
                continue;
            }

            let settlement = self.store.settle_donation(donation_id, Utc::now()).await?;
            self.store
                .append_audit(AuditEntry::new(
                    settlement.campaign.id,
                    "donation_settled",
                    serde_json::json!({
                        "donation_id": donation_id,
                        "payment_ref": settlement.donation.payment_ref.as_str(),
                        "status": settlement.donation.status.to_string(),
                        "completed_amount": settlement.completed_amount,
                        "failed_amount": settlement.failed_amount,
                        "via": "settlement_sweep",
                    }),
                    Utc::now(),
                ))
                .await?;
            report.donations_settled += 1;
        }

        if report.completed + report.failed + report.donations_settled > 0 {
            tracing::info!(
                completed = report.completed,
                failed = report.failed,
                still_pending = report.still_pending,
                donations_settled = report.donations_settled,
                "settlement sweep finished"
            );
        }
        Ok(report)
    }
}
