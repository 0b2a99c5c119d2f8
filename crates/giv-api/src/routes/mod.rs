// SPDX-License-Identifier: BUSL-1.1
//! # HTTP Route Modules
//!
//! One module per resource; each exposes `router()` returning a
//! `Router<AppState>`. All routers except [`events`] are mounted behind
//! the bearer-auth middleware — the webhook intake authenticates with
//! the processor's body signature instead.

pub mod admin;
pub mod campaigns;
pub mod events;
pub mod proofs;
pub mod review;
