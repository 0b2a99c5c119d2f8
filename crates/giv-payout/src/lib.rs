// SPDX-License-Identifier: BUSL-1.1
//! # giv-payout — Payout Rail Client
//!
//! Moves released milestone escrow to NGO accounts on the fiat payout
//! rail. [`PayoutRail`] is the seam; [`HttpPayoutRail`] talks to the real
//! provider, [`MockPayoutRail`] backs tests. Every transfer carries an
//! idempotency key, so retries cannot double-pay.

pub mod error;
pub mod http;
pub mod mock;
pub mod rail;
mod retry;

pub use error::PayoutError;
pub use http::{HttpPayoutRail, PayoutConfig};
pub use mock::MockPayoutRail;
pub use rail::{PayoutRail, Transfer, TransferRequest, TransferStatus};
