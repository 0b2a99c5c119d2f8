// SPDX-License-Identifier: BUSL-1.1
//! # Reconciliation Orchestrator
//!
//! Composes the ledger store, signer gateway, settlement client, and
//! payout rail into the three flows that move money:
//!
//! - [`donation`]: payment-succeeded event → allocation plan → signed,
//!   nonce-sequenced settlement calls → campaign balances.
//! - [`review`]: admin approve (payout + on-chain approval + cursor
//!   advance) and reject.
//! - [`sweep`]: deadline expiry, resolution of allocations whose
//!   confirmation outlived the inline polling window, and submission of
//!   slices intake never reached.
//!
//! All clients are injected at construction; the engine holds no global
//! state beyond the per-signer nonce leases.

pub mod donation;
pub mod review;
pub mod sweep;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use giv_core::CampaignId;
use giv_ledger::{AuditEntry, Campaign, LedgerStore};
use giv_payout::PayoutRail;
use giv_settlement::{NonceLeases, SettlementClient};
use giv_signer::SignerGateway;

use crate::error::AppError;

pub use donation::{AllocationView, DonationOutcome, PaymentEvent};
pub use review::ReviewOutcome;
pub use sweep::{DeadlineSweepReport, SettlementSweepReport};

/// The reconciliation orchestrator.
pub struct Engine {
    store: Arc<dyn LedgerStore>,
    signer: Arc<SignerGateway>,
    settlement: Arc<dyn SettlementClient>,
    payout: Arc<dyn PayoutRail>,
    leases: NonceLeases,
    /// Interval between confirmation polls.
    confirm_poll_interval: Duration,
    /// Polls before the engine stops waiting inline and defers the
    /// allocation to the settlement sweep.
    confirm_max_polls: u32,
}

impl Engine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        signer: Arc<SignerGateway>,
        settlement: Arc<dyn SettlementClient>,
        payout: Arc<dyn PayoutRail>,
    ) -> Self {
        Self {
            store,
            signer,
            settlement,
            payout,
            leases: NonceLeases::new(),
            confirm_poll_interval: Duration::from_secs(2),
            confirm_max_polls: 15,
        }
    }

    /// Override the confirmation polling window.
    pub fn with_confirmation_window(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.confirm_poll_interval = poll_interval;
        self.confirm_max_polls = max_polls;
        self
    }

    /// The ledger store this engine mutates.
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Link a campaign to the settlement contract and the payout rail.
    ///
    /// Asserts that the stored signer address matches what the custody
    /// key actually derives — a mismatch is configuration corruption and
    /// aborts provisioning before any external call.
    pub async fn provision_campaign(
        &self,
        campaign_id: CampaignId,
        onchain_id: u64,
        ngo_contact_email: &str,
    ) -> Result<Campaign, AppError> {
        let campaign = self.store.campaign(campaign_id).await?;
        if campaign.onchain_id.is_some() {
            return Err(AppError::Conflict(format!(
                "campaign {campaign_id} is already provisioned"
            )));
        }

        self.signer
            .assert_address(&campaign.signer_key_id, &campaign.signer_address)?;

        let payout_account = self
            .payout
            .provision_account(&campaign.name, ngo_contact_email)
            .await?;

        let now = Utc::now();
        let provisioned = self
            .store
            .provision_campaign(campaign_id, onchain_id, &payout_account, now)
            .await?;

        self.store
            .append_audit(AuditEntry::new(
                campaign_id,
                "campaign_provisioned",
                serde_json::json!({
                    "onchain_id": onchain_id,
                    "payout_account": payout_account,
                }),
                now,
            ))
            .await?;

        tracing::info!(
            campaign_id = %campaign_id,
            onchain_id,
            payout_account = %provisioned.payout_account.as_deref().unwrap_or_default(),
            "campaign provisioned"
        );
        Ok(provisioned)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("confirm_poll_interval", &self.confirm_poll_interval)
            .field("confirm_max_polls", &self.confirm_max_polls)
            .finish()
    }
}
