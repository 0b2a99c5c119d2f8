// SPDX-License-Identifier: BUSL-1.1
//! # giv-core — Core Domain Primitives for the Giv Stack
//!
//! This crate provides the building blocks shared by every other crate in
//! the workspace:
//!
//! - **Money** in integer minor units with decimal-exact parsing and
//!   formatting. Donation amounts never touch binary floats — the
//!   allocation engine's sums must be exact to the cent.
//! - **Typed identifiers** for campaigns, donations, and allocations.
//! - **Canonical bytes** and SHA-256 **content digests** — the single
//!   sanctioned path to a deterministic byte encoding of a serializable
//!   value. Typed-data signing and webhook verification both depend on it.
//! - **Validation errors** shared by the intake boundary.

pub mod canonical;
pub mod error;
pub mod ids;
pub mod money;

// Re-export primary types.
pub use canonical::{sha256_digest, CanonicalBytes, ContentDigest};
pub use error::ValidationError;
pub use ids::{AllocationId, CampaignId, DonationId, PaymentRef};
pub use money::Money;
