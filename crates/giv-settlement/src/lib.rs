// SPDX-License-Identifier: BUSL-1.1
//! # giv-settlement — Settlement-Layer Client
//!
//! Submits the signer gateway's typed-data signatures to the escrow
//! settlement contract and tracks confirmation:
//!
//! - [`SettlementClient`]: the orchestrator-facing trait.
//! - [`JsonRpcSettlementClient`]: production JSON-RPC implementation.
//! - [`NonceLeases`]: per-signer submission serialization.
//! - [`MockSettlementClient`]: scriptable in-memory contract for tests.

pub mod client;
pub mod error;
pub mod evm;
pub mod mock;
pub mod nonce;
mod retry;

pub use client::{await_confirmation, ApprovalCall, DonationCall, SettlementClient, TxStatus};
pub use error::SettlementError;
pub use evm::{EvmSettlementConfig, JsonRpcSettlementClient};
pub use mock::{MockSettlementClient, SubmittedCall};
pub use nonce::NonceLeases;
