// SPDX-License-Identifier: BUSL-1.1
//! # Milestone Lifecycle
//!
//! Runtime-validated state machine for a campaign milestone. Transitions
//! are driven by [`MilestoneEvent`]s and checked by [`validate_transition`];
//! there is no way to move a milestone between statuses without going
//! through it.
//!
//! ```text
//!   locked ──activate──▶ active ──cap_reached──▶ pending_proof
//!                                                     │
//!                                   ┌─submit_proof────┘
//!                                   ▼
//!                             pending_review ──approve──▶ approved
//!                                   │
//!                                 reject
//!                                   ▼
//!                               rejected ──submit_proof──▶ pending_review
//!
//!   pending_proof / rejected ──deadline_expired──▶ failed_deadline
//! ```
//!
//! `approved` and `failed_deadline` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Status of a single milestone within its campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    /// Not yet reachable: an earlier milestone is still unresolved.
    Locked,
    /// The campaign cursor points here; donations fill this milestone.
    Active,
    /// Funding cap reached; waiting for the NGO to submit proof of work.
    PendingProof,
    /// Proof submitted; waiting for a reviewer decision.
    PendingReview,
    /// Reviewer approved; escrow released. Terminal.
    Approved,
    /// Reviewer rejected the proof; the NGO may resubmit.
    Rejected,
    /// Proof window elapsed without an approved proof. Terminal.
    FailedDeadline,
}

impl MilestoneStatus {
    /// True for statuses no event can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::FailedDeadline)
    }

    /// True while the milestone still holds donor escrow.
    pub fn holds_escrow(self) -> bool {
        !matches!(self, Self::Locked | Self::Approved)
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Locked => "locked",
            Self::Active => "active",
            Self::PendingProof => "pending_proof",
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::FailedDeadline => "failed_deadline",
        };
        f.write_str(s)
    }
}

impl FromStr for MilestoneStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "locked" => Ok(Self::Locked),
            "active" => Ok(Self::Active),
            "pending_proof" => Ok(Self::PendingProof),
            "pending_review" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "failed_deadline" => Ok(Self::FailedDeadline),
            other => Err(LedgerError::Store(format!(
                "unknown milestone status: {other}"
            ))),
        }
    }
}

/// Lifecycle events that move a milestone between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneEvent {
    /// The campaign cursor advanced to this milestone.
    Activate,
    /// Cumulative collected funds reached this milestone's cap.
    CapReached,
    /// The NGO submitted (or resubmitted) proof of completion.
    SubmitProof,
    /// A reviewer approved the submitted proof.
    Approve,
    /// A reviewer rejected the submitted proof.
    Reject,
    /// The proof window elapsed without approval.
    DeadlineExpired,
}

impl fmt::Display for MilestoneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Activate => "activate",
            Self::CapReached => "cap_reached",
            Self::SubmitProof => "submit_proof",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::DeadlineExpired => "deadline_expired",
        };
        f.write_str(s)
    }
}

/// Compute the status an event moves a milestone to, or reject the event.
///
/// The full transition table lives here and nowhere else. Callers apply
/// the returned status only after their own preconditions (cursor
/// position, balances) also hold.
pub fn validate_transition(
    from: MilestoneStatus,
    event: MilestoneEvent,
) -> Result<MilestoneStatus, LedgerError> {
    use MilestoneEvent as E;
    use MilestoneStatus as S;

    let to = match (from, event) {
        (S::Locked, E::Activate) => S::Active,
        (S::Active, E::CapReached) => S::PendingProof,
        (S::PendingProof, E::SubmitProof) => S::PendingReview,
        (S::Rejected, E::SubmitProof) => S::PendingReview,
        (S::PendingReview, E::Approve) => S::Approved,
        (S::PendingReview, E::Reject) => S::Rejected,
        (S::PendingProof, E::DeadlineExpired) => S::FailedDeadline,
        (S::Rejected, E::DeadlineExpired) => S::FailedDeadline,
        _ => return Err(LedgerError::InvalidTransition { from, event }),
    };
    Ok(to)
}
