//! Postgres ledger backend
//!
//! Lazily-connected `sqlx` pool; the schema is created on first use so a
//! fresh database works out of the box. All aggregation happens in SQL;
//! the executors only see the grouped results.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::EngineError;
use crate::ledger::{CategorySum, DailySum, FlowKind, LedgerReader, MerchantSum};
use crate::models::Account;
use crate::Result;

pub struct PostgresLedger {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresLedger {
    /// Build a ledger over a lazily-connected pool. No I/O happens until
    /// the first query.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| {
                EngineError::DataAccessError(format!("Failed to configure postgres pool: {}", e))
            })?;

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS accounts (
                      id UUID PRIMARY KEY,
                      user_id UUID NOT NULL,
                      name TEXT NOT NULL,
                      account_type TEXT NOT NULL,
                      balance DOUBLE PRECISION NOT NULL DEFAULT 0
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_accounts_user
                    ON accounts (user_id);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS transactions (
                      id UUID PRIMARY KEY,
                      kind TEXT NOT NULL,
                      from_account_id UUID,
                      to_account_id UUID,
                      amount DOUBLE PRECISION NOT NULL,
                      category TEXT,
                      description TEXT,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_transactions_from_time
                    ON transactions (from_account_id, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                EngineError::DataAccessError(format!("Failed to initialize ledger schema: {}", e))
            })?;

        Ok(())
    }
}

fn data_access(context: &str, e: sqlx::Error) -> EngineError {
    EngineError::DataAccessError(format!("{}: {}", context, e))
}

#[async_trait]
impl LedgerReader for PostgresLedger {
    async fn account_ids(&self, user_id: Uuid, account_id: Option<Uuid>) -> Result<Vec<Uuid>> {
        self.ensure_schema().await?;

        let rows = match account_id {
            Some(id) => {
                sqlx::query("SELECT id FROM accounts WHERE user_id = $1 AND id = $2")
                    .bind(user_id)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT id FROM accounts WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| data_access("Failed to resolve account scope", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.try_get("id").ok())
            .collect())
    }

    async fn accounts(&self, user_id: Uuid, account_type: Option<&str>) -> Result<Vec<Account>> {
        self.ensure_schema().await?;

        let rows = match account_type {
            Some(ty) => {
                sqlx::query(
                    r#"
                    SELECT id, user_id, name, account_type, balance
                    FROM accounts
                    WHERE user_id = $1 AND account_type = $2
                    "#,
                )
                .bind(user_id)
                .bind(ty)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, user_id, name, account_type, balance
                    FROM accounts
                    WHERE user_id = $1
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| data_access("Failed to load accounts", e))?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            accounts.push(Account {
                id: row
                    .try_get("id")
                    .map_err(|e| data_access("Malformed account row", e))?,
                user_id: row
                    .try_get("user_id")
                    .map_err(|e| data_access("Malformed account row", e))?,
                name: row
                    .try_get("name")
                    .map_err(|e| data_access("Malformed account row", e))?,
                account_type: row
                    .try_get("account_type")
                    .map_err(|e| data_access("Malformed account row", e))?,
                balance: row
                    .try_get("balance")
                    .map_err(|e| data_access("Malformed account row", e))?,
            });
        }

        Ok(accounts)
    }

    async fn payment_sums_by_category(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        categories: Option<&[String]>,
    ) -> Result<Vec<CategorySum>> {
        self.ensure_schema().await?;

        let scope = scope.to_vec();
        let rows = match categories {
            Some(wanted) => {
                sqlx::query(
                    r#"
                    SELECT category, SUM(amount) AS total
                    FROM transactions
                    WHERE kind = 'payment'
                      AND from_account_id = ANY($1)
                      AND created_at >= $2 AND created_at < $3
                      AND category = ANY($4)
                    GROUP BY category
                    ORDER BY SUM(amount) DESC, category ASC
                    "#,
                )
                .bind(scope)
                .bind(start)
                .bind(end)
                .bind(wanted.to_vec())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT category, SUM(amount) AS total
                    FROM transactions
                    WHERE kind = 'payment'
                      AND from_account_id = ANY($1)
                      AND created_at >= $2 AND created_at < $3
                    GROUP BY category
                    ORDER BY SUM(amount) DESC, category ASC
                    "#,
                )
                .bind(scope)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| data_access("Failed to aggregate spending by category", e))?;

        Ok(rows
            .into_iter()
            .map(|row| CategorySum {
                category: row.try_get("category").ok(),
                total: row.try_get("total").unwrap_or(0.0),
            })
            .collect())
    }

    async fn flow_total(
        &self,
        flow: FlowKind,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64> {
        self.ensure_schema().await?;

        // Column and kind are fixed strings per flow, never caller input.
        let (kind, account_column) = match flow {
            FlowKind::Payments => ("payment", "from_account_id"),
            FlowKind::Deposits => ("deposit", "to_account_id"),
        };

        let sql = format!(
            r#"
            SELECT COALESCE(SUM(amount), 0)::float8 AS total
            FROM transactions
            WHERE kind = $1
              AND {} = ANY($2)
              AND created_at >= $3 AND created_at < $4
            "#,
            account_column
        );

        let row = sqlx::query(&sql)
            .bind(kind)
            .bind(scope.to_vec())
            .bind(start)
            .bind(end)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| data_access("Failed to aggregate flow total", e))?;

        Ok(row.try_get("total").unwrap_or(0.0))
    }

    async fn payment_sums_by_description(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MerchantSum>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT description, SUM(amount) AS total, COUNT(id) AS tx_count
            FROM transactions
            WHERE kind = 'payment'
              AND from_account_id = ANY($1)
              AND created_at >= $2 AND created_at < $3
            GROUP BY description
            ORDER BY SUM(amount) DESC, description ASC
            LIMIT $4
            "#,
        )
        .bind(scope.to_vec())
        .bind(start)
        .bind(end)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| data_access("Failed to aggregate spending by merchant", e))?;

        Ok(rows
            .into_iter()
            .map(|row| MerchantSum {
                description: row.try_get("description").ok(),
                total: row.try_get("total").unwrap_or(0.0),
                count: row.try_get("tx_count").unwrap_or(0),
            })
            .collect())
    }

    async fn payment_sums_by_day(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DailySum>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS day, SUM(amount) AS total
            FROM transactions
            WHERE kind = 'payment'
              AND from_account_id = ANY($1)
              AND created_at >= $2 AND created_at < $3
            GROUP BY (created_at AT TIME ZONE 'UTC')::date
            ORDER BY day ASC
            "#,
        )
        .bind(scope.to_vec())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| data_access("Failed to aggregate daily spending", e))?;

        let mut sums = Vec::with_capacity(rows.len());
        for row in rows {
            let day: NaiveDate = row
                .try_get("day")
                .map_err(|e| data_access("Malformed daily spending row", e))?;
            sums.push(DailySum {
                day,
                total: row.try_get("total").unwrap_or(0.0),
            });
        }

        Ok(sums)
    }

    async fn top_payment_categories(
        &self,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT category
            FROM transactions
            WHERE kind = 'payment'
              AND category IS NOT NULL
              AND from_account_id = ANY($1)
              AND created_at >= $2 AND created_at < $3
            GROUP BY category
            ORDER BY SUM(amount) DESC, category ASC
            LIMIT $4
            "#,
        )
        .bind(scope.to_vec())
        .bind(start)
        .bind(end)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| data_access("Failed to rank spending categories", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.try_get("category").ok())
            .collect())
    }

    async fn payment_sum_for_category(
        &self,
        category: &str,
        scope: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0)::float8 AS total
            FROM transactions
            WHERE kind = 'payment'
              AND category = $1
              AND from_account_id = ANY($2)
              AND created_at >= $3 AND created_at < $4
            "#,
        )
        .bind(category)
        .bind(scope.to_vec())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| data_access("Failed to aggregate category trend", e))?;

        Ok(row.try_get("total").unwrap_or(0.0))
    }
}
