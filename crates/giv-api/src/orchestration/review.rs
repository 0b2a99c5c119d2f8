// SPDX-License-Identifier: BUSL-1.1
//! # Milestone Review
//!
//! Admin decisions on submitted proofs. Approval is the only flow that
//! moves money out of escrow, and it runs payout-first: the idempotent
//! fiat transfer executes before the on-chain approval, so a retry after
//! a mid-flow failure replays the transfer (same idempotency key, no
//! double pay) and re-attempts only what is still missing. Rejection
//! touches no money at all.

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use giv_core::{CampaignId, Money};
use giv_ledger::{AuditEntry, MilestoneStatus};
use giv_payout::TransferRequest;
use giv_settlement::{await_confirmation, ApprovalCall, SettlementError};
use giv_signer::{MilestoneApproval, TypedMessage};

use crate::error::AppError;
use crate::orchestration::Engine;

/// Outcome of an admin review decision.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewOutcome {
    #[schema(value_type = String)]
    pub status: MilestoneStatus,
    /// Escrow balance released to the NGO; only present on approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i64>)]
    pub amount_released: Option<Money>,
}

impl Engine {
    /// Approve the campaign's current milestone: pay out the campaign's
    /// entire escrow balance (spillover included), record the release
    /// on-chain, and advance the cursor.
    pub async fn approve_milestone(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
    ) -> Result<ReviewOutcome, AppError> {
        let campaign = self.store.campaign(campaign_id).await?;
        if milestone_index != campaign.current_milestone_index {
            return Err(AppError::Conflict(format!(
                "milestone {milestone_index} is not under review (cursor at {})",
                campaign.current_milestone_index
            )));
        }
        let milestone = campaign.milestone(milestone_index)?;
        if milestone.status != MilestoneStatus::PendingReview {
            return Err(AppError::Conflict(format!(
                "milestone {milestone_index} is {}, not pending_review",
                milestone.status
            )));
        }
        let Some(onchain_id) = campaign.onchain_id else {
            return Err(AppError::Conflict(format!(
                "campaign {campaign_id} is not provisioned for settlement"
            )));
        };
        let Some(payout_account) = campaign.payout_account.clone() else {
            return Err(AppError::Conflict(format!(
                "campaign {campaign_id} has no payout account"
            )));
        };

        // The whole escrow bucket is released, spillover past this
        // milestone's target included. The amount read here also guards
        // the store update: if another settlement lands between this read
        // and the approval write, the store rejects the stale release
        // amount.
        let expected_release = campaign.escrow_balance;

        let transfer = if expected_release.is_positive() {
            let transfer = self
                .payout
                .transfer(&TransferRequest {
                    destination_account: payout_account,
                    amount: expected_release,
                    description: format!(
                        "{} milestone {} release",
                        campaign.name,
                        milestone_index + 1
                    ),
                    idempotency_key: format!("payout-{campaign_id}-m{milestone_index}"),
                })
                .await?;
            tracing::info!(
                campaign_id = %campaign_id,
                milestone_index,
                transfer_id = %transfer.id,
                amount = %expected_release,
                "payout transfer accepted"
            );
            Some(transfer)
        } else {
            None
        };

        let approval_tx_hash = self
            .submit_approval_call(&campaign, milestone_index, onchain_id)
            .await?;

        await_confirmation(
            self.settlement.as_ref(),
            &approval_tx_hash,
            self.confirm_poll_interval,
            self.confirm_max_polls,
        )
        .await
        .map_err(|e| match e {
            // The milestone stays pending_review; a retried approval
            // replays the payout idempotently and re-derives the nonce.
            SettlementError::ConfirmationTimeout { tx_hash } => AppError::Upstream(format!(
                "approval transaction {tx_hash} not confirmed in time; retry the approval"
            )),
            other => AppError::from(other),
        })?;

        let now = Utc::now();
        let transfer_id = transfer.as_ref().map(|t| t.id.clone());
        let outcome = self
            .store
            .approve_milestone(
                campaign_id,
                milestone_index,
                expected_release,
                &approval_tx_hash,
                transfer_id.as_deref(),
                now,
            )
            .await?;
        self.store
            .append_audit(AuditEntry::new(
                campaign_id,
                "milestone_approved",
                serde_json::json!({
                    "milestone_index": milestone_index,
                    "amount_released": outcome.amount_released,
                    "approval_tx_hash": approval_tx_hash,
                    "payout_transfer_id": transfer_id,
                }),
                now,
            ))
            .await?;

        tracing::info!(
            campaign_id = %campaign_id,
            milestone_index,
            amount_released = %outcome.amount_released,
            next_milestone = outcome.campaign.current_milestone_index,
            "milestone approved"
        );
        Ok(ReviewOutcome {
            status: MilestoneStatus::Approved,
            amount_released: Some(outcome.amount_released),
        })
    }

    /// Reject the current milestone's proof. The NGO may resubmit; no
    /// balances change.
    pub async fn reject_milestone(
        &self,
        campaign_id: CampaignId,
        milestone_index: u32,
        reason: &str,
    ) -> Result<ReviewOutcome, AppError> {
        let now = Utc::now();
        self.store
            .reject_milestone(campaign_id, milestone_index, reason, now)
            .await?;
        self.store
            .append_audit(AuditEntry::new(
                campaign_id,
                "milestone_rejected",
                serde_json::json!({
                    "milestone_index": milestone_index,
                    "reason": reason,
                }),
                now,
            ))
            .await?;

        tracing::info!(campaign_id = %campaign_id, milestone_index, "milestone rejected");
        Ok(ReviewOutcome {
            status: MilestoneStatus::Rejected,
            amount_released: None,
        })
    }

    /// Sign and submit the on-chain approval under the signer's lease.
    async fn submit_approval_call(
        &self,
        campaign: &giv_ledger::Campaign,
        milestone_index: u32,
        onchain_id: u64,
    ) -> Result<String, AppError> {
        let _lease = self.leases.acquire(&campaign.signer_address).await;

        let nonce = self
            .settlement
            .expected_nonce(&campaign.signer_address)
            .await?;
        let signature = self.signer.sign(
            &campaign.signer_key_id,
            &TypedMessage::Approval(MilestoneApproval {
                campaign_onchain_id: onchain_id,
                milestone_index,
                nonce,
            }),
        )?;
        let tx_hash = self
            .settlement
            .approve_milestone(&ApprovalCall {
                signer_address: campaign.signer_address.clone(),
                campaign_onchain_id: onchain_id,
                milestone_index,
                nonce,
                signature,
            })
            .await?;
        Ok(tx_hash)
    }
}
