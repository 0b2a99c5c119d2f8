// SPDX-License-Identifier: BUSL-1.1
//! # giv-ledger — Reconciliation Ledger Domain
//!
//! The off-chain source of truth for milestone-escrowed campaigns:
//!
//! - [`Campaign`] / [`Milestone`]: the aggregate with running balances and
//!   the milestone cursor.
//! - [`milestone`]: the runtime-validated milestone lifecycle.
//! - [`allocation`]: the pure engine that splits a donation's gross
//!   across milestones.
//! - [`Donation`] / [`Allocation`]: intake records with per-slice
//!   settlement outcomes.
//! - [`LedgerStore`]: the persistence seam, with a DashMap-backed
//!   [`MemoryLedgerStore`] for tests and DB-less development.

pub mod allocation;
pub mod audit;
pub mod campaign;
pub mod donation;
pub mod error;
pub mod milestone;
pub mod store;

pub use allocation::{split_donation, AllocationSlice};
pub use audit::AuditEntry;
pub use campaign::{Campaign, Milestone};
pub use donation::{Allocation, AllocationStatus, Donation, DonationStatus};
pub use error::LedgerError;
pub use milestone::{validate_transition, MilestoneEvent, MilestoneStatus};
pub use store::{
    require_cursor, ApprovalOutcome, DonationIntake, DonationSettlement, LedgerStore,
    MemoryLedgerStore,
};
