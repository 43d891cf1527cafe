//! Core data models for the widget query engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::timerange::TimeRange;

/// A single flat output record: a `name` key plus one or more numeric
/// value keys. JSON primitives only, consumed directly by the widget layer.
pub type DataRow = Map<String, Value>;

/// Round a monetary value to two decimal places.
///
/// Every monetary value the engine emits passes through here so that all
/// executors share one rounding convention (half away from zero on the
/// scaled value).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Payment,
    Transfer,
}

/// Aggregation strategy selected by a widget's stored configuration.
///
/// Unrecognized values deserialize to `Unknown`, which the dispatcher maps
/// to an empty result instead of an error. Widget configs are persisted
/// verbatim and may outlive the engine version that wrote them. `Unknown`
/// does not retain the raw value: round-tripping such a config through
/// this enum rewrites the token as `"unknown"`. Callers that must keep
/// the original token readable should store the raw JSON alongside.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    SpendingByCategory,
    MonthlyTrend,
    MonthlyIncomeExpenses,
    AccountBalances,
    TopMerchants,
    DailySpending,
    CategoryTrend,
    #[serde(other)]
    Unknown,
}

//
// ================= Ledger Entities =================
//

/// A user-owned bank account. Balance is the current ledger balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub account_type: String,
    pub balance: f64,
}

impl Account {
    pub fn new(user_id: Uuid, name: &str, account_type: &str, balance: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            account_type: account_type.to_string(),
            balance,
        }
    }
}

/// A ledger transaction. Amount is non-negative; direction is encoded by
/// `kind` plus which account field is populated (a payment always has
/// `from_account_id`, a deposit always has `to_account_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub amount: f64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Outgoing payment from an account.
    pub fn payment(
        from_account_id: Uuid,
        amount: f64,
        category: Option<&str>,
        description: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Payment,
            from_account_id: Some(from_account_id),
            to_account_id: None,
            amount,
            category: category.map(str::to_string),
            description: description.map(str::to_string),
            created_at,
        }
    }

    /// Incoming deposit to an account.
    pub fn deposit(to_account_id: Uuid, amount: f64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Deposit,
            from_account_id: None,
            to_account_id: Some(to_account_id),
            amount,
            category: None,
            description: None,
            created_at,
        }
    }
}

//
// ================= Query Configuration =================
//

/// Optional narrowing filters carried inside a widget's query config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Declarative query specification stored on a dynamic widget.
///
/// Deserialization is lenient: every field has a default so that widget
/// configs persisted by older (or newer) versions still execute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub filters: QueryFilters,
}
