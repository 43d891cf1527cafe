//! Aggregation executors
//!
//! One executor per query type, sharing a single shape: take the resolved
//! account scope, the `[start, end)` interval and the filters, return a
//! produced (non-lazy) ordered sequence of flat records.
//!
//! Every executor short-circuits on an empty scope before touching the
//! ledger. This is a required invariant, not an optimization: an empty
//! membership predicate is false-for-all or invalid syntax on typical
//! query engines, so no query may be issued at all.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::ledger::{FlowKind, LedgerReader};
use crate::models::{round2, DataRow, QueryFilters};
use crate::timerange::{day_label, enumerate_months, month_label, next_month};
use crate::Result;

/// Default truncation for `top_merchants`.
const DEFAULT_MERCHANT_LIMIT: usize = 10;

/// Auto-selection size for `category_trend` when no categories are given.
const TOP_CATEGORY_COUNT: usize = 5;

fn name_value_row(name: String, value: f64) -> DataRow {
    let mut row = DataRow::new();
    row.insert("name".to_string(), Value::from(name));
    row.insert("value".to_string(), Value::from(round2(value)));
    row
}

/// Payment sums grouped by category, descending by total. Null categories
/// surface as `"Uncategorized"`.
pub async fn spending_by_category(
    ledger: &dyn LedgerReader,
    scope: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filters: &QueryFilters,
) -> Result<Vec<DataRow>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let categories = (!filters.categories.is_empty()).then_some(filters.categories.as_slice());
    let sums = ledger
        .payment_sums_by_category(scope, start, end, categories)
        .await?;

    Ok(sums
        .into_iter()
        .map(|group| {
            name_value_row(
                group.category.unwrap_or_else(|| "Uncategorized".to_string()),
                group.total,
            )
        })
        .collect())
}

/// Per-month payment sum for every calendar month in range. Months with no
/// transactions still appear with a zero value.
pub async fn monthly_trend(
    ledger: &dyn LedgerReader,
    scope: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DataRow>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    for month in enumerate_months(start, end) {
        let spending = ledger
            .flow_total(FlowKind::Payments, scope, month, next_month(month))
            .await?;
        rows.push(name_value_row(month_label(month), spending));
    }

    Ok(rows)
}

/// Per-month income (deposits) vs expenses (payments). Both default to zero
/// for months without matching transactions.
pub async fn monthly_income_expenses(
    ledger: &dyn LedgerReader,
    scope: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DataRow>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();
    for month in enumerate_months(start, end) {
        let month_end = next_month(month);

        let income = ledger
            .flow_total(FlowKind::Deposits, scope, month, month_end)
            .await?;
        let expenses = ledger
            .flow_total(FlowKind::Payments, scope, month, month_end)
            .await?;

        let mut row = DataRow::new();
        row.insert("name".to_string(), Value::from(month_label(month)));
        row.insert("income".to_string(), Value::from(round2(income)));
        row.insert("expenses".to_string(), Value::from(round2(expenses)));
        rows.push(row);
    }

    Ok(rows)
}

/// Current balance of every scoped account, optionally restricted by
/// account type. No time filtering applies.
pub async fn account_balances(
    ledger: &dyn LedgerReader,
    user_id: Uuid,
    scope: &[Uuid],
    filters: &QueryFilters,
) -> Result<Vec<DataRow>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let accounts = ledger
        .accounts(user_id, filters.account_type.as_deref())
        .await?;

    Ok(accounts
        .into_iter()
        .filter(|account| scope.contains(&account.id))
        .map(|account| {
            let mut row = name_value_row(account.name, account.balance);
            row.insert("type".to_string(), Value::from(account.account_type));
            row
        })
        .collect())
}

/// Payment sum and count grouped by description, descending by sum,
/// truncated to `filters.limit` (default 10). Null descriptions surface as
/// `"Unknown"`.
pub async fn top_merchants(
    ledger: &dyn LedgerReader,
    scope: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filters: &QueryFilters,
) -> Result<Vec<DataRow>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let limit = filters.limit.unwrap_or(DEFAULT_MERCHANT_LIMIT);
    let sums = ledger
        .payment_sums_by_description(scope, start, end, limit)
        .await?;

    Ok(sums
        .into_iter()
        .map(|group| {
            let mut row = name_value_row(
                group.description.unwrap_or_else(|| "Unknown".to_string()),
                group.total,
            );
            row.insert("transactions".to_string(), Value::from(group.count));
            row
        })
        .collect())
}

/// Payment sum grouped by calendar date, ascending.
pub async fn daily_spending(
    ledger: &dyn LedgerReader,
    scope: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<DataRow>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let sums = ledger.payment_sums_by_day(scope, start, end).await?;

    Ok(sums
        .into_iter()
        .map(|group| name_value_row(day_label(group.day), group.total))
        .collect())
}

/// Per-month spending for a selected category set, one numeric field per
/// category on every month row. When no categories are given, the top five
/// by total spend in range are auto-selected (ties broken by name).
pub async fn category_trend(
    ledger: &dyn LedgerReader,
    scope: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filters: &QueryFilters,
) -> Result<Vec<DataRow>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let categories = if filters.categories.is_empty() {
        ledger
            .top_payment_categories(scope, start, end, TOP_CATEGORY_COUNT)
            .await?
    } else {
        filters.categories.clone()
    };

    let mut rows = Vec::new();
    for month in enumerate_months(start, end) {
        let month_end = next_month(month);

        let mut row = DataRow::new();
        row.insert("name".to_string(), Value::from(month_label(month)));

        for category in &categories {
            let spending = ledger
                .payment_sum_for_category(category, scope, month, month_end)
                .await?;
            row.insert(category.clone(), Value::from(round2(spending)));
        }

        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WidgetQueryEngine;
    use crate::ledger::InMemoryLedger;
    use crate::models::{Account, QueryConfig, QueryType, Transaction};
    use crate::timerange::TimeRange;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 0, 0).unwrap()
    }

    fn name_of(row: &DataRow) -> &str {
        row.get("name").and_then(Value::as_str).unwrap_or("")
    }

    fn field(row: &DataRow, key: &str) -> f64 {
        row.get(key).and_then(Value::as_f64).unwrap_or(f64::NAN)
    }

    /// Checking account with three merchants across three categories in
    /// Jan/Feb 2025, plus deposits and an untouched savings account.
    async fn seeded_engine() -> (WidgetQueryEngine, Uuid) {
        let ledger = InMemoryLedger::new();
        let user_id = Uuid::new_v4();

        let checking = Account::new(user_id, "Checking", "checking", 500.0);
        let checking_id = checking.id;
        ledger.add_account(checking).await;
        ledger
            .add_account(Account::new(user_id, "Savings", "savings", 1500.0))
            .await;

        ledger
            .add_transaction(Transaction::payment(
                checking_id,
                100.0,
                Some("Food"),
                Some("SuperMart"),
                at(2025, 1, 5),
            ))
            .await;
        ledger
            .add_transaction(Transaction::payment(
                checking_id,
                200.0,
                Some("Food"),
                Some("SuperMart"),
                at(2025, 1, 12),
            ))
            .await;
        ledger
            .add_transaction(Transaction::payment(
                checking_id,
                200.0,
                Some("Transport"),
                Some("Metro Card"),
                at(2025, 1, 20),
            ))
            .await;
        ledger
            .add_transaction(Transaction::payment(
                checking_id,
                100.0,
                Some("Entertainment"),
                Some("Cinema"),
                at(2025, 2, 2),
            ))
            .await;

        ledger
            .add_transaction(Transaction::deposit(checking_id, 1000.0, at(2025, 1, 1)))
            .await;
        ledger
            .add_transaction(Transaction::deposit(checking_id, 1200.0, at(2025, 2, 1)))
            .await;

        (WidgetQueryEngine::new(Arc::new(ledger)), user_id)
    }

    fn config(query_type: QueryType, time_range: TimeRange) -> QueryConfig {
        QueryConfig {
            query_type,
            time_range,
            filters: QueryFilters::default(),
        }
    }

    #[tokio::test]
    async fn test_spending_by_category_totals_and_order() {
        let (engine, user_id) = seeded_engine().await;

        let rows = engine
            .execute_at(
                &config(QueryType::SpendingByCategory, TimeRange::AllTime),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(name_of(&rows[0]), "Food");
        assert_eq!(field(&rows[0], "value"), 300.0);
        assert_eq!(name_of(&rows[1]), "Transport");
        assert_eq!(field(&rows[1], "value"), 200.0);
        assert_eq!(name_of(&rows[2]), "Entertainment");
        assert_eq!(field(&rows[2], "value"), 100.0);

        // No transaction is double-counted: group totals add up to the
        // total payment volume.
        let total: f64 = rows.iter().map(|row| field(row, "value")).sum();
        assert_eq!(total, 600.0);
    }

    #[tokio::test]
    async fn test_spending_by_category_honors_category_filter() {
        let (engine, user_id) = seeded_engine().await;

        let mut cfg = config(QueryType::SpendingByCategory, TimeRange::AllTime);
        cfg.filters.categories = vec!["Food".to_string()];

        let rows = engine.execute_at(&cfg, user_id, fixed_now()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(name_of(&rows[0]), "Food");
        assert_eq!(field(&rows[0], "value"), 300.0);
    }

    #[tokio::test]
    async fn test_null_category_maps_to_uncategorized() {
        let ledger = InMemoryLedger::new();
        let user_id = Uuid::new_v4();
        let account = Account::new(user_id, "Checking", "checking", 0.0);
        let account_id = account.id;
        ledger.add_account(account).await;
        ledger
            .add_transaction(Transaction::payment(
                account_id,
                42.0,
                None,
                None,
                at(2025, 1, 5),
            ))
            .await;

        let engine = WidgetQueryEngine::new(Arc::new(ledger));
        let rows = engine
            .execute_at(
                &config(QueryType::SpendingByCategory, TimeRange::AllTime),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(name_of(&rows[0]), "Uncategorized");
    }

    #[tokio::test]
    async fn test_monthly_trend_zero_fills_empty_months() {
        let (engine, user_id) = seeded_engine().await;

        let rows = engine
            .execute_at(
                &config(QueryType::MonthlyTrend, TimeRange::ThisYear),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        // Jan through Mar 2025, one row per calendar month, no gaps.
        assert_eq!(rows.len(), 3);
        assert_eq!(name_of(&rows[0]), "Jan 2025");
        assert_eq!(field(&rows[0], "value"), 500.0);
        assert_eq!(name_of(&rows[1]), "Feb 2025");
        assert_eq!(field(&rows[1], "value"), 100.0);
        assert_eq!(name_of(&rows[2]), "Mar 2025");
        assert_eq!(field(&rows[2], "value"), 0.0);
    }

    #[tokio::test]
    async fn test_monthly_income_expenses() {
        let (engine, user_id) = seeded_engine().await;

        let rows = engine
            .execute_at(
                &config(QueryType::MonthlyIncomeExpenses, TimeRange::ThisYear),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(field(&rows[0], "income"), 1000.0);
        assert_eq!(field(&rows[0], "expenses"), 500.0);
        assert_eq!(field(&rows[1], "income"), 1200.0);
        assert_eq!(field(&rows[1], "expenses"), 100.0);
        assert_eq!(field(&rows[2], "income"), 0.0);
        assert_eq!(field(&rows[2], "expenses"), 0.0);
    }

    #[tokio::test]
    async fn test_account_balances_and_type_filter() {
        let (engine, user_id) = seeded_engine().await;

        let rows = engine
            .execute_at(
                &config(QueryType::AccountBalances, TimeRange::AllTime),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(row.contains_key("type"));
        }

        let mut cfg = config(QueryType::AccountBalances, TimeRange::AllTime);
        cfg.filters.account_type = Some("savings".to_string());

        let rows = engine.execute_at(&cfg, user_id, fixed_now()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(name_of(&rows[0]), "Savings");
        assert_eq!(field(&rows[0], "value"), 1500.0);
        assert_eq!(rows[0].get("type").and_then(Value::as_str), Some("savings"));
    }

    #[tokio::test]
    async fn test_top_merchants_limit_and_order() {
        let (engine, user_id) = seeded_engine().await;

        let mut cfg = config(QueryType::TopMerchants, TimeRange::AllTime);
        cfg.filters.limit = Some(2);

        let rows = engine.execute_at(&cfg, user_id, fixed_now()).await.unwrap();

        // SuperMart 300 (2 tx), Metro Card 200 (1 tx); Cinema truncated.
        assert_eq!(rows.len(), 2);
        assert_eq!(name_of(&rows[0]), "SuperMart");
        assert_eq!(field(&rows[0], "value"), 300.0);
        assert_eq!(
            rows[0].get("transactions").and_then(Value::as_i64),
            Some(2)
        );
        assert_eq!(name_of(&rows[1]), "Metro Card");
        assert_eq!(field(&rows[1], "value"), 200.0);
    }

    #[tokio::test]
    async fn test_daily_spending_ascending_by_date() {
        let (engine, user_id) = seeded_engine().await;

        let rows = engine
            .execute_at(
                &config(QueryType::DailySpending, TimeRange::ThisYear),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        let names: Vec<&str> = rows.iter().map(name_of).collect();
        assert_eq!(
            names,
            vec!["2025-01-05", "2025-01-12", "2025-01-20", "2025-02-02"]
        );
        assert_eq!(field(&rows[1], "value"), 200.0);
    }

    #[tokio::test]
    async fn test_category_trend_auto_selects_top_categories() {
        let (engine, user_id) = seeded_engine().await;

        let rows = engine
            .execute_at(
                &config(QueryType::CategoryTrend, TimeRange::ThisYear),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        // One row per month; every selected category is present on every
        // row even when the month's spend is zero.
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(row.contains_key("Food"));
            assert!(row.contains_key("Transport"));
            assert!(row.contains_key("Entertainment"));
        }

        assert_eq!(field(&rows[0], "Food"), 300.0);
        assert_eq!(field(&rows[0], "Entertainment"), 0.0);
        assert_eq!(field(&rows[1], "Entertainment"), 100.0);
        assert_eq!(field(&rows[2], "Food"), 0.0);
    }

    #[tokio::test]
    async fn test_category_trend_with_explicit_categories() {
        let (engine, user_id) = seeded_engine().await;

        let mut cfg = config(QueryType::CategoryTrend, TimeRange::ThisYear);
        cfg.filters.categories = vec!["Food".to_string()];

        let rows = engine.execute_at(&cfg, user_id, fixed_now()).await.unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(row.contains_key("Food"));
            assert!(!row.contains_key("Transport"));
        }
    }

    #[tokio::test]
    async fn test_rounding_is_consistent_across_executors() {
        let ledger = InMemoryLedger::new();
        let user_id = Uuid::new_v4();
        let account = Account::new(user_id, "Checking", "checking", 0.0);
        let account_id = account.id;
        ledger.add_account(account).await;

        // Two payments summing to 20.005 in raw amounts; both the category
        // view and the monthly view must round it identically.
        for _ in 0..2 {
            ledger
                .add_transaction(Transaction::payment(
                    account_id,
                    10.0025,
                    Some("Rounding"),
                    Some("Oddity"),
                    at(2025, 1, 5),
                ))
                .await;
        }

        let engine = WidgetQueryEngine::new(Arc::new(ledger));

        let by_category = engine
            .execute_at(
                &config(QueryType::SpendingByCategory, TimeRange::AllTime),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();
        let by_month = engine
            .execute_at(
                &config(QueryType::MonthlyTrend, TimeRange::ThisYear),
                user_id,
                fixed_now(),
            )
            .await
            .unwrap();

        let category_value = field(&by_category[0], "value");
        let month_value = field(&by_month[0], "value");
        assert_eq!(category_value, month_value);
        assert_eq!(category_value, round2(20.005));
    }

    #[tokio::test]
    async fn test_idempotent_under_reexecution() {
        let (engine, user_id) = seeded_engine().await;
        let cfg = config(QueryType::SpendingByCategory, TimeRange::AllTime);

        let first = engine.execute_at(&cfg, user_id, fixed_now()).await.unwrap();
        let second = engine.execute_at(&cfg, user_id, fixed_now()).await.unwrap();
        assert_eq!(first, second);
    }
}
