//! Ledger read capability
//!
//! The engine never touches tables directly: every aggregation goes through
//! the `LedgerReader` trait, injected explicitly at construction. Two
//! backends exist, in-memory for development and tests and Postgres for
//! deployments, selected from the environment at startup.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::Account;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;

/// Which side of the ledger a flow aggregation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// `payment` transactions leaving scope accounts via `from_account_id`.
    Payments,
    /// `deposit` transactions landing on scope accounts via `to_account_id`.
    Deposits,
}

/// Payment total for one category group.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySum {
    pub category: Option<String>,
    pub total: f64,
}

/// Payment total and transaction count for one description group.
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantSum {
    pub description: Option<String>,
    pub total: f64,
    pub count: i64,
}

/// Payment total for one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySum {
    pub day: NaiveDate,
    pub total: f64,
}

/// Read-only aggregate access to the account/transaction ledger.
///
/// All time intervals are closed-open `[start, end)`. Implementations must
/// never be called with an empty scope; the executors short-circuit before
/// issuing a query, so an `IN ()` style predicate never reaches the backend.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Account ids owned by `user_id`, optionally narrowed to a single
    /// account. A caller-supplied id outside the owned set yields nothing.
    async fn account_ids(&self, user_id: Uuid, account_id: Option<Uuid>) -> Result<Vec<Uuid>>;

    /// Accounts owned by `user_id` with current balances, optionally
    /// filtered by account type.
    async fn accounts(&self, user_id: Uuid, account_type: Option<&str>) -> Result<Vec<Account>>;

    /// Payment sums grouped by category, descending by total (ties broken
    /// by category name ascending), optionally restricted to `categories`.
    async fn payment_sums_by_category(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        categories: Option<&[String]>,
    ) -> Result<Vec<CategorySum>>;

    /// Total of one flow kind over the scope within `[start, end)`.
    /// Zero when no transactions match.
    async fn flow_total(
        &self,
        flow: FlowKind,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64>;

    /// Payment sums and counts grouped by description, descending by total
    /// (ties broken by description ascending), truncated to `limit`.
    async fn payment_sums_by_description(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MerchantSum>>;

    /// Payment sums grouped by calendar date, ascending by date.
    async fn payment_sums_by_day(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailySum>>;

    /// Top spending categories (nulls excluded), descending by total with
    /// category name ascending as the tie-break, truncated to `limit`.
    async fn top_payment_categories(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>>;

    /// Payment sum for a single category over `[start, end)`.
    async fn payment_sum_for_category(
        &self,
        category: &str,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64>;
}

/// Select the ledger backend from the environment: Postgres when
/// `POSTGRES_URL`/`DATABASE_URL` is configured, in-memory otherwise.
pub fn ledger_from_env() -> Arc<dyn LedgerReader> {
    let database_url = env::var("POSTGRES_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok();

    if let Some(url) = database_url {
        match PostgresLedger::connect_lazy(&url) {
            Ok(ledger) => {
                info!("Ledger backend: postgres");
                return Arc::new(ledger);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres ledger backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Ledger backend: in-memory");
    Arc::new(InMemoryLedger::new())
}
