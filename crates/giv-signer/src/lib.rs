// SPDX-License-Identifier: BUSL-1.1
//! # giv-signer — Signer Gateway for the Giv Stack
//!
//! Wraps custody key management behind a trait and produces deterministic
//! signatures over typed structured data for the settlement contract:
//!
//! - [`KeyCustodian`]: storage/signing backend for one custody key.
//!   [`LocalKeyCustodian`] holds the key in memory (development, tests);
//!   [`EnvKeyCustodian`] loads a hex seed from an environment variable
//!   (container deployments with injected secrets).
//! - [`SignerGateway`]: key-id → custodian registry. Signs
//!   [`DonationPermit`] and [`MilestoneApproval`] typed messages under a
//!   [`SettlementDomain`] separator and derives the settlement address
//!   for a key. `assert_address` defends against a key/address mismatch
//!   at provisioning time — a mismatch is fatal, never retried.
//! - [`webhook`]: detached-signature verification for inbound payment
//!   processor events.
//!
//! ## Security Invariants
//!
//! - Signing input is always [`CanonicalBytes`] — never raw structs — so
//!   two components hashing the same message agree byte-for-byte.
//! - Key material is zeroized on drop.

pub mod custodian;
pub mod error;
pub mod gateway;
pub mod hex;
pub mod typed_data;
pub mod webhook;

pub use custodian::{EnvKeyCustodian, KeyCustodian, LocalKeyCustodian};
pub use error::SignerError;
pub use gateway::{derive_settlement_address, is_valid_settlement_address, SignerGateway};
pub use typed_data::{
    DonationPermit, MilestoneApproval, SettlementDomain, TypedMessage, TypedSignature,
};

// Re-export for downstream verification call sites.
pub use giv_core::CanonicalBytes;
