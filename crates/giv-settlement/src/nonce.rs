// SPDX-License-Identifier: BUSL-1.1
//! # Per-Signer Nonce Leases
//!
//! The settlement contract consumes one nonce per signed call, strictly in
//! order. Two concurrent submissions for the same signer would both derive
//! the same expected nonce and one would revert, so every
//! sign-and-submit sequence runs under that signer's lease:
//!
//! ```text
//! let _lease = leases.acquire(&signer_address).await;
//! let nonce = client.expected_nonce(&signer_address).await?;
//! // sign with nonce, submit, confirm — then drop the lease
//! ```
//!
//! Nonce values are never cached across leases; the chain is re-queried
//! each time, so a crashed or failed submission cannot leave a stale
//! counter behind.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-signer submission locks.
#[derive(Debug, Default)]
pub struct NonceLeases {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NonceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the submission lease for a signer address. Held leases
    /// queue fairly; dropping the guard releases the lease.
    pub async fn acquire(&self, signer_address: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(signer_address.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn same_signer_is_serialized() {
        let leases = Arc::new(NonceLeases::new());
        let counter = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let leases = leases.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _lease = leases.acquire("0xAA").await;
                // If two tasks held the lease at once, both would read the
                // same value before either writes.
                let seen = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(seen + 1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn different_signers_do_not_block_each_other() {
        let leases = NonceLeases::new();
        let a = leases.acquire("0xAA").await;
        // A second signer's lease must be immediately available while the
        // first is held.
        let b = leases.acquire("0xBB").await;
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn lease_lookup_is_case_insensitive() {
        let leases = Arc::new(NonceLeases::new());
        let guard = leases.acquire("0xAbCd").await;
        let leases2 = leases.clone();
        let pending = tokio::spawn(async move {
            let _g = leases2.acquire("0xabcd").await;
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        drop(guard);
        pending.await.unwrap();
    }
}
