//! In-memory ledger backend for development and tests

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ledger::{CategorySum, DailySum, FlowKind, LedgerReader, MerchantSum};
use crate::models::{Account, Transaction, TransactionKind};
use crate::Result;

/// In-memory account/transaction store implementing `LedgerReader`.
pub struct InMemoryLedger {
    accounts: Arc<RwLock<Vec<Account>>>,
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(Vec::new())),
            transactions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn add_account(&self, account: Account) {
        let mut accounts = self.accounts.write().await;
        accounts.push(account);
    }

    pub async fn add_transaction(&self, transaction: Transaction) {
        let mut transactions = self.transactions.write().await;
        transactions.push(transaction);
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn is_payment_in_scope(
    tx: &Transaction,
    scope: &[Uuid],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    tx.kind == TransactionKind::Payment
        && tx
            .from_account_id
            .map(|id| scope.contains(&id))
            .unwrap_or(false)
        && tx.created_at >= start
        && tx.created_at < end
}

/// Descending by total, name ascending on equal totals.
fn by_total_desc(a: &(Option<String>, f64), b: &(Option<String>, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.0.as_deref()
                .unwrap_or("")
                .cmp(b.0.as_deref().unwrap_or(""))
        })
}

#[async_trait]
impl LedgerReader for InMemoryLedger {
    async fn account_ids(&self, user_id: Uuid, account_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        let accounts = self.accounts.read().await;

        Ok(accounts
            .iter()
            .filter(|acc| acc.user_id == user_id)
            .filter(|acc| account_id.map(|id| acc.id == id).unwrap_or(true))
            .map(|acc| acc.id)
            .collect())
    }

    async fn accounts(&self, user_id: Uuid, account_type: Option<&str>) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;

        Ok(accounts
            .iter()
            .filter(|acc| acc.user_id == user_id)
            .filter(|acc| {
                account_type
                    .map(|ty| acc.account_type == ty)
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn payment_sums_by_category(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        categories: Option<&[String]>,
    ) -> Result<Vec<CategorySum>> {
        let transactions = self.transactions.read().await;

        let mut groups: HashMap<Option<String>, f64> = HashMap::new();
        for tx in transactions.iter() {
            if !is_payment_in_scope(tx, scope, start, end) {
                continue;
            }
            if let Some(wanted) = categories {
                let matches = tx
                    .category
                    .as_ref()
                    .map(|cat| wanted.contains(cat))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
            }
            *groups.entry(tx.category.clone()).or_insert(0.0) += tx.amount;
        }

        let mut sums: Vec<(Option<String>, f64)> = groups.into_iter().collect();
        sums.sort_by(by_total_desc);

        Ok(sums
            .into_iter()
            .map(|(category, total)| CategorySum { category, total })
            .collect())
    }

    async fn flow_total(
        &self,
        flow: FlowKind,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64> {
        let transactions = self.transactions.read().await;

        let total = transactions
            .iter()
            .filter(|tx| tx.created_at >= start && tx.created_at < end)
            .filter(|tx| match flow {
                FlowKind::Payments => {
                    tx.kind == TransactionKind::Payment
                        && tx
                            .from_account_id
                            .map(|id| scope.contains(&id))
                            .unwrap_or(false)
                }
                FlowKind::Deposits => {
                    tx.kind == TransactionKind::Deposit
                        && tx
                            .to_account_id
                            .map(|id| scope.contains(&id))
                            .unwrap_or(false)
                }
            })
            .map(|tx| tx.amount)
            .sum();

        Ok(total)
    }

    async fn payment_sums_by_description(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MerchantSum>> {
        let transactions = self.transactions.read().await;

        let mut groups: HashMap<Option<String>, (f64, i64)> = HashMap::new();
        for tx in transactions.iter() {
            if !is_payment_in_scope(tx, scope, start, end) {
                continue;
            }
            let entry = groups.entry(tx.description.clone()).or_insert((0.0, 0));
            entry.0 += tx.amount;
            entry.1 += 1;
        }

        let mut sums: Vec<(Option<String>, (f64, i64))> = groups.into_iter().collect();
        sums.sort_by(|a, b| {
            by_total_desc(&(a.0.clone(), a.1 .0), &(b.0.clone(), b.1 .0))
        });
        sums.truncate(limit);

        Ok(sums
            .into_iter()
            .map(|(description, (total, count))| MerchantSum {
                description,
                total,
                count,
            })
            .collect())
    }

    async fn payment_sums_by_day(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailySum>> {
        let transactions = self.transactions.read().await;

        let mut groups: HashMap<NaiveDate, f64> = HashMap::new();
        for tx in transactions.iter() {
            if !is_payment_in_scope(tx, scope, start, end) {
                continue;
            }
            *groups.entry(tx.created_at.date_naive()).or_insert(0.0) += tx.amount;
        }

        let mut sums: Vec<(NaiveDate, f64)> = groups.into_iter().collect();
        sums.sort_by_key(|(day, _)| *day);

        Ok(sums
            .into_iter()
            .map(|(day, total)| DailySum { day, total })
            .collect())
    }

    async fn top_payment_categories(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>> {
        let transactions = self.transactions.read().await;

        let mut groups: HashMap<String, f64> = HashMap::new();
        for tx in transactions.iter() {
            if !is_payment_in_scope(tx, scope, start, end) {
                continue;
            }
            if let Some(category) = &tx.category {
                *groups.entry(category.clone()).or_insert(0.0) += tx.amount;
            }
        }

        let mut sums: Vec<(String, f64)> = groups.into_iter().collect();
        sums.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        sums.truncate(limit);

        Ok(sums.into_iter().map(|(category, _)| category).collect())
    }

    async fn payment_sum_for_category(
        &self,
        category: &str,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64> {
        let transactions = self.transactions.read().await;

        let total = transactions
            .iter()
            .filter(|tx| is_payment_in_scope(tx, scope, start, end))
            .filter(|tx| tx.category.as_deref() == Some(category))
            .map(|tx| tx.amount)
            .sum();

        Ok(total)
    }
}
