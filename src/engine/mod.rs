//! Widget query engine
//!
//! Public entry point for dynamic widget queries. Validates the declarative
//! query config, resolves the time range and account scope, dispatches to
//! the matching aggregation executor and returns a normalized result list.
//!
//! The engine is stateless and reentrant: every call is a pure function of
//! its inputs plus the ledger it reads through. It performs no writes, no
//! retries and holds nothing across calls.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ledger::LedgerReader;
use crate::models::{DataRow, QueryConfig, QueryFilters, QueryType};
use crate::Result;

pub mod executors;

/// Accounts the query is permitted to read: always restricted to accounts
/// owned by `user_id`, further narrowed to `filters.account_id` when set.
/// Ownership is enforced by the ledger query itself: a foreign account id
/// simply resolves to an empty scope, never to someone else's data.
pub async fn resolve_scope(
    ledger: &dyn LedgerReader,
    user_id: Uuid,
    filters: &QueryFilters,
) -> Result<Vec<Uuid>> {
    ledger.account_ids(user_id, filters.account_id).await
}

/// Executes dynamic widget queries against a ledger.
pub struct WidgetQueryEngine {
    ledger: Arc<dyn LedgerReader>,
}

impl WidgetQueryEngine {
    pub fn new(ledger: Arc<dyn LedgerReader>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> Arc<dyn LedgerReader> {
        Arc::clone(&self.ledger)
    }

    /// Execute a widget query anchored at the current time.
    pub async fn execute(&self, config: &QueryConfig, user_id: Uuid) -> Result<Vec<DataRow>> {
        self.execute_at(config, user_id, Utc::now()).await
    }

    /// Execute a widget query anchored at an explicit `now`.
    ///
    /// Ledger failures propagate unmodified; an empty account scope and an
    /// unrecognized query type both produce an empty result, never an error.
    pub async fn execute_at(
        &self,
        config: &QueryConfig,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<DataRow>> {
        let (start, end) = config.time_range.resolve(now);

        let scope = resolve_scope(self.ledger.as_ref(), user_id, &config.filters).await?;

        debug!(
            query_type = ?config.query_type,
            time_range = ?config.time_range,
            scope_len = scope.len(),
            "Executing widget query"
        );

        let ledger = self.ledger.as_ref();
        let filters = &config.filters;

        match config.query_type {
            QueryType::SpendingByCategory => {
                executors::spending_by_category(ledger, &scope, start, end, filters).await
            }
            QueryType::MonthlyTrend => {
                executors::monthly_trend(ledger, &scope, start, end).await
            }
            QueryType::MonthlyIncomeExpenses => {
                executors::monthly_income_expenses(ledger, &scope, start, end).await
            }
            QueryType::AccountBalances => {
                executors::account_balances(ledger, user_id, &scope, filters).await
            }
            QueryType::TopMerchants => {
                executors::top_merchants(ledger, &scope, start, end, filters).await
            }
            QueryType::DailySpending => {
                executors::daily_spending(ledger, &scope, start, end).await
            }
            QueryType::CategoryTrend => {
                executors::category_trend(ledger, &scope, start, end, filters).await
            }
            QueryType::Unknown => {
                warn!("Unrecognized query type in widget config, returning no data");
                Ok(Vec::new())
            }
        }
    }
}
