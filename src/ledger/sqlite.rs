//! SQLite-backed ledger
//!
//! Schema is created on connect. Entry identity is the full
//! (tag, amount, date, description, kind) tuple, enforced with a unique
//! index so re-importing a statement inserts nothing new.

use crate::error::AdvisorError;
use crate::ledger::LedgerStore;
use crate::models::{EntryKind, LedgerEntry, MonthlyTrendPoint, NewEntry, TagTotal};
use crate::Result;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (or create) the database at `url` and ensure the schema exists.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AdvisorError::LedgerError(format!("invalid database url: {}", e)))?
            .create_if_missing(true);

        // A shared in-memory database only exists per-connection; keep the
        // pool at a single connection so every query sees the same data.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              tag TEXT NOT NULL,
              amount REAL NOT NULL,
              date TEXT NOT NULL,
              description TEXT NOT NULL,
              kind TEXT NOT NULL CHECK (kind IN ('income', 'expense'))
            );
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_entries_identity
            ON ledger_entries (tag, amount, date, description, kind);
            "#,
        )
        .execute(&pool)
        .await?;

        info!(url = %url, "Ledger database ready");

        Ok(Self { pool })
    }

    fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry> {
        let date_raw: String = row.try_get("date")?;
        let kind_raw: String = row.try_get("kind")?;

        let date = NaiveDate::parse_from_str(&date_raw, DATE_FORMAT)
            .map_err(|e| AdvisorError::LedgerError(format!("bad date '{}': {}", date_raw, e)))?;
        let kind = EntryKind::parse(&kind_raw)
            .ok_or_else(|| AdvisorError::LedgerError(format!("bad kind '{}'", kind_raw)))?;

        Ok(LedgerEntry {
            id: row.try_get("id")?,
            tag: row.try_get("tag")?,
            amount: row.try_get("amount")?,
            date,
            description: row.try_get("description")?,
            kind,
        })
    }

    async fn fetch_entries<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn scalar_f64(&self, sql: &str) -> Result<f64> {
        let row = sqlx::query(sql).fetch_one(&self.pool).await?;
        Ok(row.try_get::<f64, _>(0)?)
    }
}

#[async_trait::async_trait]
impl LedgerStore for SqliteLedger {
    async fn insert(&self, entry: NewEntry) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO ledger_entries (tag, amount, date, description, kind)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.tag)
        .bind(entry.amount)
        .bind(entry.date.format(DATE_FORMAT).to_string())
        .bind(&entry.description)
        .bind(entry.kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, id: i64, entry: NewEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE ledger_entries
            SET tag = ?, amount = ?, date = ?, description = ?, kind = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.tag)
        .bind(entry.amount)
        .bind(entry.date.format(DATE_FORMAT).to_string())
        .bind(&entry.description)
        .bind(entry.kind.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AdvisorError::LedgerError(format!("no entry with id {}", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM ledger_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<LedgerEntry>> {
        self.fetch_entries(sqlx::query(
            "SELECT id, tag, amount, date, description, kind FROM ledger_entries ORDER BY id",
        ))
        .await
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(
            "SELECT id, tag, amount, date, description, kind FROM ledger_entries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::entry_from_row).transpose()
    }

    async fn fetch_by_month(&self, month: &str) -> Result<Vec<LedgerEntry>> {
        self.fetch_entries(
            sqlx::query(
                r#"
                SELECT id, tag, amount, date, description, kind
                FROM ledger_entries
                WHERE strftime('%Y-%m', date) = ?
                ORDER BY date, id
                "#,
            )
            .bind(month.to_string()),
        )
        .await
    }

    async fn fetch_by_tag(&self, tag: &str) -> Result<Vec<LedgerEntry>> {
        self.fetch_entries(
            sqlx::query(
                r#"
                SELECT id, tag, amount, date, description, kind
                FROM ledger_entries
                WHERE tag = ?
                ORDER BY date, id
                "#,
            )
            .bind(tag.to_string()),
        )
        .await
    }

    async fn tags(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT tag FROM ledger_entries ORDER BY tag")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("tag")?))
            .collect()
    }

    async fn total_income(&self) -> Result<f64> {
        self.scalar_f64(
            "SELECT COALESCE(SUM(amount), 0.0) FROM ledger_entries WHERE kind = 'income'",
        )
        .await
    }

    async fn total_expense(&self) -> Result<f64> {
        self.scalar_f64(
            "SELECT COALESCE(SUM(amount), 0.0) FROM ledger_entries WHERE kind = 'expense'",
        )
        .await
    }

    async fn monthly_trend(&self, months: u32) -> Result<Vec<MonthlyTrendPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT strftime('%Y-%m', date) AS month,
                   SUM(CASE WHEN kind = 'income' THEN amount ELSE 0.0 END) AS income,
                   SUM(CASE WHEN kind = 'expense' THEN amount ELSE 0.0 END) AS expense
            FROM ledger_entries
            GROUP BY month
            ORDER BY month DESC
            LIMIT ?
            "#,
        )
        .bind(months as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MonthlyTrendPoint {
                    month: row.try_get("month")?,
                    income: row.try_get("income")?,
                    expense: row.try_get("expense")?,
                })
            })
            .collect()
    }

    async fn top_expense_tags(&self, limit: u32) -> Result<Vec<TagTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT tag, SUM(amount) AS total
            FROM ledger_entries
            WHERE kind = 'expense'
            GROUP BY tag
            ORDER BY total DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TagTotal {
                    tag: row.try_get("tag")?,
                    total: row.try_get("total")?,
                })
            })
            .collect()
    }

    async fn large_expenses(&self, threshold: f64) -> Result<Vec<LedgerEntry>> {
        self.fetch_entries(
            sqlx::query(
                r#"
                SELECT id, tag, amount, date, description, kind
                FROM ledger_entries
                WHERE kind = 'expense' AND amount >= ?
                ORDER BY amount DESC
                "#,
            )
            .bind(threshold),
        )
        .await
    }

    async fn average_monthly_income(&self) -> Result<f64> {
        self.scalar_f64(
            r#"
            SELECT COALESCE(AVG(monthly), 0.0) FROM (
              SELECT SUM(amount) AS monthly
              FROM ledger_entries
              WHERE kind = 'income'
              GROUP BY strftime('%Y-%m', date)
            )
            "#,
        )
        .await
    }

    async fn average_monthly_expense(&self) -> Result<f64> {
        self.scalar_f64(
            r#"
            SELECT COALESCE(AVG(monthly), 0.0) FROM (
              SELECT SUM(amount) AS monthly
              FROM ledger_entries
              WHERE kind = 'expense'
              GROUP BY strftime('%Y-%m', date)
            )
            "#,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::{entry, seed_two_months};

    async fn memory_ledger() -> SqliteLedger {
        SqliteLedger::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_database_totals() {
        let ledger = memory_ledger().await;
        assert_eq!(ledger.total_income().await.unwrap(), 0.0);
        assert_eq!(ledger.total_expense().await.unwrap(), 0.0);
        assert_eq!(ledger.savings().await.unwrap(), 0.0);
        assert_eq!(ledger.average_monthly_expense().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_two_month_scenario_sql() {
        let ledger = memory_ledger().await;
        seed_two_months(&ledger).await;

        assert_eq!(ledger.total_income().await.unwrap(), 10_000.0);
        assert_eq!(ledger.total_expense().await.unwrap(), 2_575.0);
        assert_eq!(ledger.savings().await.unwrap(), 7_425.0);

        let trend = ledger.monthly_trend(3).await.unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].month, "2023-11");
        assert_eq!(trend[1].month, "2023-10");

        assert_eq!(ledger.average_monthly_income().await.unwrap(), 5000.0);
    }

    #[tokio::test]
    async fn test_reimport_inserts_nothing() {
        let ledger = memory_ledger().await;
        let e = entry("food", 175.0, "2023-11-06", "Weekly shopping", EntryKind::Expense);

        assert!(ledger.insert(e.clone()).await.unwrap());
        assert!(!ledger.insert(e).await.unwrap());
        assert_eq!(ledger.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let ledger = memory_ledger().await;
        seed_two_months(&ledger).await;

        let all = ledger.fetch_all().await.unwrap();
        assert_eq!(all.len(), 5);

        let first = &all[0];
        let fetched = ledger.fetch_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(&fetched, first);

        ledger
            .update(
                first.id,
                entry("salary", 5500.0, "2023-10-01", "Monthly pay + bonus", EntryKind::Income),
            )
            .await
            .unwrap();
        assert_eq!(ledger.total_income().await.unwrap(), 10_500.0);

        ledger.delete(first.id).await.unwrap();
        assert!(ledger.fetch_by_id(first.id).await.unwrap().is_none());

        let november = ledger.fetch_by_month("2023-11").await.unwrap();
        assert_eq!(november.len(), 3);

        let tags = ledger.tags().await.unwrap();
        assert!(tags.contains(&"hostel".to_string()));
    }
}
