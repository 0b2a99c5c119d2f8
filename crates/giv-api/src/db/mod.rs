// SPDX-License-Identifier: BUSL-1.1
//! # Database Persistence Layer
//!
//! Postgres persistence for the reconciliation ledger via SQLx.
//!
//! The database is **optional**. When `DATABASE_URL` is set, the ledger
//! is backed by [`ledger::PgLedgerStore`] and survives restarts. When
//! absent, the API runs on the in-memory store — suitable only for
//! development and tests, since escrow state would not survive a
//! restart.

pub mod ledger;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 Ledger state will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    // Run embedded migrations.
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}
