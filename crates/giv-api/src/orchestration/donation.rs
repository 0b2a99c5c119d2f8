// SPDX-License-Identifier: BUSL-1.1
//! # Donation Path
//!
//! Turns a verified payment-succeeded event into settled ledger state:
//!
//! 1. Idempotent intake — `begin_donation` is an atomic insert-or-detect
//!    on the payment reference; a replayed delivery gets the original
//!    outcome and causes no second settlement.
//! 2. Allocation plan from the pure split engine over the gross amount;
//!    the processor's direct/escrow split is an advisory hint that only
//!    shapes the escrow-balance credit at finalization.
//! 3. Per slice, in milestone order: acquire the signer's nonce lease,
//!    re-derive the nonce from the chain, sign, submit, persist the tx
//!    hash, then await confirmation outside the lease.
//! 4. Finalize the donation and campaign balances atomically.
//!
//! A slice that definitively fails does not roll back completed slices —
//! the captured payment is real money — and later slices are never
//! submitted out of order behind it. A slice whose confirmation outlives
//! the polling window stays `processing` with its tx hash recorded; the
//! settlement sweep resolves it and submits the slices queued behind it.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use giv_core::{CampaignId, DonationId, Money, PaymentRef};
use giv_ledger::{
    split_donation, Allocation, AllocationStatus, AuditEntry, Campaign, Donation,
    DonationIntake, DonationStatus,
};
use giv_settlement::{await_confirmation, DonationCall, SettlementError};
use giv_signer::{DonationPermit, SignerError, TypedMessage};

use crate::error::AppError;
use crate::orchestration::Engine;

/// Submission attempts per allocation before it is failed. Only
/// transient unavailability is retried; the nonce is re-derived fresh
/// each attempt.
const SUBMIT_ATTEMPTS: u32 = 3;

/// Pause between transient-failure retries.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// A validated payment-succeeded event, past all boundary checks.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub payment_ref: PaymentRef,
    pub campaign_id: CampaignId,
    pub donor_ref: String,
    pub gross: Money,
    pub direct: Money,
    pub escrow: Money,
}

/// One allocation slice as reported back to the event sender.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AllocationView {
    pub milestone_index: u32,
    #[schema(value_type = i64)]
    pub amount: Money,
    #[schema(value_type = String)]
    pub status: AllocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Outcome of processing one payment event.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationOutcome {
    #[schema(value_type = String)]
    pub donation_id: DonationId,
    pub payment_ref: String,
    #[schema(value_type = String)]
    pub status: DonationStatus,
    /// True when this delivery replayed an already-recorded payment.
    pub duplicate: bool,
    pub allocations: Vec<AllocationView>,
}

impl DonationOutcome {
    fn from_records(donation: &Donation, allocations: &[Allocation], duplicate: bool) -> Self {
        Self {
            donation_id: donation.id,
            payment_ref: donation.payment_ref.as_str().to_string(),
            status: donation.status,
            duplicate,
            allocations: allocations
                .iter()
                .map(|a| AllocationView {
                    milestone_index: a.milestone_index,
                    amount: a.amount,
                    status: a.status,
                    tx_hash: a.tx_hash.clone(),
                    failure_reason: a.failure_reason.clone(),
                })
                .collect(),
        }
    }
}

/// How one slice's settlement ended.
pub(super) enum SliceOutcome {
    Completed,
    Failed(String),
    /// Submitted, tx hash recorded, confirmation still outstanding.
    InFlight,
}

/// One submission attempt under the signer's nonce lease.
enum SubmitAttempt {
    Submitted { nonce: u64, tx_hash: String },
    Transient(String),
    Fatal(String),
}

impl Engine {
    /// Process a verified payment-succeeded event end to end.
    pub async fn process_payment_event(
        &self,
        event: PaymentEvent,
    ) -> Result<DonationOutcome, AppError> {
        let campaign = self.store.campaign(event.campaign_id).await?;
        if !campaign.is_open() {
            return Err(AppError::Conflict(format!(
                "campaign {} is not accepting donations",
                campaign.id
            )));
        }
        if campaign.onchain_id.is_none() {
            return Err(AppError::Conflict(format!(
                "campaign {} is not provisioned for settlement",
                campaign.id
            )));
        }

        let now = Utc::now();
        let donation = Donation::new(
            DonationId::new(),
            event.campaign_id,
            event.payment_ref,
            event.donor_ref,
            event.gross,
            event.escrow,
            event.direct,
            now,
        )?;
        let plan = split_donation(&campaign, event.gross)?;
        let allocations: Vec<Allocation> = plan
            .iter()
            .map(|s| Allocation::new(donation.id, campaign.id, s.milestone_index, s.amount, now))
            .collect();

        let (donation, allocations) =
            match self.store.begin_donation(donation, allocations).await? {
                DonationIntake::Duplicate {
                    donation,
                    allocations,
                } => {
                    tracing::info!(
                        payment_ref = %donation.payment_ref,
                        donation_id = %donation.id,
                        "duplicate payment event, replaying prior outcome"
                    );
                    return Ok(DonationOutcome::from_records(&donation, &allocations, true));
                }
                DonationIntake::Created {
                    donation,
                    allocations,
                } => (donation, allocations),
            };

        // Settle slices strictly in milestone order. Once one fails, the
        // rest are failed as skipped rather than submitted behind it.
        let mut in_flight = false;
        let mut skip_reason: Option<String> = None;
        for allocation in &allocations {
            if let Some(reason) = &skip_reason {
                self.store
                    .fail_allocation(allocation.id, reason, Utc::now())
                    .await?;
                continue;
            }
            match self
                .settle_allocation(&campaign, &donation, allocation)
                .await?
            {
                SliceOutcome::Completed => {}
                SliceOutcome::Failed(reason) => {
                    tracing::error!(
                        donation_id = %donation.id,
                        milestone_index = allocation.milestone_index,
                        reason,
                        "allocation failed on-chain; needs operator remediation"
                    );
                    skip_reason = Some(format!(
                        "skipped: allocation for milestone {} failed",
                        allocation.milestone_index
                    ));
                }
                SliceOutcome::InFlight => {
                    in_flight = true;
                    break;
                }
            }
        }

        if in_flight {
            // Confirmation outlived the inline window; the settlement
            // sweep resolves the slice and finalizes the donation.
            self.store
                .append_audit(AuditEntry::new(
                    campaign.id,
                    "donation_awaiting_confirmation",
                    serde_json::json!({
                        "donation_id": donation.id,
                        "payment_ref": donation.payment_ref.as_str(),
                    }),
                    Utc::now(),
                ))
                .await?;
            let donation = self.store.donation(donation.id).await?;
            let allocations = self.store.allocations_for_donation(donation.id).await?;
            return Ok(DonationOutcome::from_records(&donation, &allocations, false));
        }

        let settlement = self.store.settle_donation(donation.id, Utc::now()).await?;
        self.store
            .append_audit(AuditEntry::new(
                campaign.id,
                "donation_settled",
                serde_json::json!({
                    "donation_id": settlement.donation.id,
                    "payment_ref": settlement.donation.payment_ref.as_str(),
                    "status": settlement.donation.status.to_string(),
                    "completed_amount": settlement.completed_amount,
                    "failed_amount": settlement.failed_amount,
                }),
                Utc::now(),
            ))
            .await?;
        if settlement.cap_reached {
            tracing::info!(
                campaign_id = %campaign.id,
                milestone_index = settlement.campaign.current_milestone_index,
                "milestone funding cap reached; awaiting proof"
            );
            self.store
                .append_audit(AuditEntry::new(
                    campaign.id,
                    "milestone_cap_reached",
                    serde_json::json!({
                        "milestone_index": settlement.campaign.current_milestone_index,
                    }),
                    Utc::now(),
                ))
                .await?;
        }

        let allocations = self.store.allocations_for_donation(donation.id).await?;
        Ok(DonationOutcome::from_records(
            &settlement.donation,
            &allocations,
            false,
        ))
    }

    /// Drive one allocation slice through submit and confirmation. Also
    /// used by the settlement sweep to resume slices the intake path
    /// never got to submit.
    pub(super) async fn settle_allocation(
        &self,
        campaign: &Campaign,
        donation: &Donation,
        allocation: &Allocation,
    ) -> Result<SliceOutcome, AppError> {
        let Some(onchain_id) = campaign.onchain_id else {
            // Checked before intake; repeated here so the invariant is local.
            return Ok(SliceOutcome::Failed(
                "campaign has no on-chain id".to_string(),
            ));
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .submit_donation_call(campaign, donation, allocation, onchain_id)
                .await
            {
                SubmitAttempt::Submitted { nonce, tx_hash } => {
                    // Persist the hash before waiting: a crash mid-wait
                    // leaves a resumable `processing` slice.
                    self.store
                        .mark_allocation_submitted(allocation.id, nonce, &tx_hash, Utc::now())
                        .await?;
                    tracing::info!(
                        donation_id = %donation.id,
                        milestone_index = allocation.milestone_index,
                        nonce,
                        tx_hash,
                        "allocation submitted to settlement"
                    );
                    return match await_confirmation(
                        self.settlement.as_ref(),
                        &tx_hash,
                        self.confirm_poll_interval,
                        self.confirm_max_polls,
                    )
                    .await
                    {
                        Ok(()) => {
                            self.store
                                .complete_allocation(allocation.id, Utc::now())
                                .await?;
                            Ok(SliceOutcome::Completed)
                        }
                        Err(SettlementError::Reverted { reason, .. }) => {
                            self.store
                                .fail_allocation(allocation.id, &reason, Utc::now())
                                .await?;
                            Ok(SliceOutcome::Failed(reason))
                        }
                        Err(SettlementError::ConfirmationTimeout { .. }) => {
                            Ok(SliceOutcome::InFlight)
                        }
                        Err(e) => {
                            tracing::warn!(
                                tx_hash,
                                error = %e,
                                "status poll failed; leaving allocation to the settlement sweep"
                            );
                            Ok(SliceOutcome::InFlight)
                        }
                    };
                }
                SubmitAttempt::Transient(reason) if attempt < SUBMIT_ATTEMPTS => {
                    tracing::warn!(
                        donation_id = %donation.id,
                        milestone_index = allocation.milestone_index,
                        attempt,
                        reason,
                        "transient settlement failure, retrying with fresh nonce"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                SubmitAttempt::Transient(reason) | SubmitAttempt::Fatal(reason) => {
                    self.store
                        .fail_allocation(allocation.id, &reason, Utc::now())
                        .await?;
                    return Ok(SliceOutcome::Failed(reason));
                }
            }
        }
    }

    /// One fetch-nonce → sign → submit sequence under the signer's lease.
    async fn submit_donation_call(
        &self,
        campaign: &Campaign,
        donation: &Donation,
        allocation: &Allocation,
        onchain_id: u64,
    ) -> SubmitAttempt {
        let _lease = self.leases.acquire(&campaign.signer_address).await;

        // The chain is the only nonce authority; never a cached counter.
        let nonce = match self.settlement.expected_nonce(&campaign.signer_address).await {
            Ok(n) => n,
            Err(e) if e.is_transient() => return SubmitAttempt::Transient(e.to_string()),
            Err(e) => return SubmitAttempt::Fatal(e.to_string()),
        };

        let message = TypedMessage::Donation(DonationPermit {
            campaign_onchain_id: onchain_id,
            amount_minor: allocation.amount.minor_units(),
            payment_ref: donation.payment_ref.as_str().to_string(),
            nonce,
        });
        let signature = match self.signer.sign(&campaign.signer_key_id, &message) {
            Ok(s) => s,
            Err(SignerError::Unavailable { reason }) => return SubmitAttempt::Transient(reason),
            Err(e) => return SubmitAttempt::Fatal(e.to_string()),
        };

        let call = DonationCall {
            signer_address: campaign.signer_address.clone(),
            campaign_onchain_id: onchain_id,
            amount_minor: allocation.amount.minor_units(),
            payment_ref: donation.payment_ref.as_str().to_string(),
            nonce,
            signature,
        };
        match self.settlement.donate_with_signature(&call).await {
            Ok(tx_hash) => SubmitAttempt::Submitted { nonce, tx_hash },
            Err(e) if e.is_transient() => SubmitAttempt::Transient(e.to_string()),
            Err(e) => SubmitAttempt::Fatal(e.to_string()),
        }
    }
}
