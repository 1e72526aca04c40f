//! Transaction ledger
//!
//! Persists transactions and exposes the aggregate queries the Collector
//! stage consumes. All reads are point-in-time snapshots; the advisor
//! pipeline never mutates the ledger.

use crate::models::{EntryKind, LedgerEntry, MonthlyTrendPoint, NewEntry, TagTotal};
use crate::Result;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod sqlite;
pub use sqlite::SqliteLedger;

/// Trait for ledger persistence and aggregation
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert an entry. Returns false when an identical
    /// (tag, amount, date, description, kind) tuple already exists,
    /// which makes statement re-imports idempotent.
    async fn insert(&self, entry: NewEntry) -> Result<bool>;
    async fn update(&self, id: i64, entry: NewEntry) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;

    async fn fetch_all(&self) -> Result<Vec<LedgerEntry>>;
    async fn fetch_by_id(&self, id: i64) -> Result<Option<LedgerEntry>>;
    /// `month` is formatted `YYYY-MM`.
    async fn fetch_by_month(&self, month: &str) -> Result<Vec<LedgerEntry>>;
    async fn fetch_by_tag(&self, tag: &str) -> Result<Vec<LedgerEntry>>;
    async fn tags(&self) -> Result<Vec<String>>;

    async fn total_income(&self) -> Result<f64>;
    async fn total_expense(&self) -> Result<f64>;
    /// Most-recent-first monthly income/expense series, at most `months` long.
    async fn monthly_trend(&self, months: u32) -> Result<Vec<MonthlyTrendPoint>>;
    /// Expense totals per tag, descending, at most `limit` rows.
    async fn top_expense_tags(&self, limit: u32) -> Result<Vec<TagTotal>>;
    async fn large_expenses(&self, threshold: f64) -> Result<Vec<LedgerEntry>>;
    async fn average_monthly_income(&self) -> Result<f64>;
    async fn average_monthly_expense(&self) -> Result<f64>;

    async fn savings(&self) -> Result<f64> {
        Ok(self.total_income().await? - self.total_expense().await?)
    }
}

/// In-memory ledger for development and tests
pub struct InMemoryLedger {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    next_id: AtomicI64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicI64::new(1),
        }
    }

    fn month_key(entry: &LedgerEntry) -> String {
        entry.date.format("%Y-%m").to_string()
    }

    async fn monthly_totals(&self, kind: EntryKind) -> BTreeMap<String, f64> {
        let entries = self.entries.read().await;
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.kind == kind) {
            *totals.entry(Self::month_key(entry)).or_insert(0.0) += entry.amount;
        }
        totals
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedger {
    async fn insert(&self, entry: NewEntry) -> Result<bool> {
        let mut entries = self.entries.write().await;

        let duplicate = entries.iter().any(|existing| {
            existing.tag == entry.tag
                && existing.amount == entry.amount
                && existing.date == entry.date
                && existing.description == entry.description
                && existing.kind == entry.kind
        });
        if duplicate {
            return Ok(false);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        entries.push(LedgerEntry {
            id,
            tag: entry.tag,
            amount: entry.amount,
            date: entry.date,
            description: entry.description,
            kind: entry.kind,
        });
        Ok(true)
    }

    async fn update(&self, id: i64, entry: NewEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => {
                existing.tag = entry.tag;
                existing.amount = entry.amount;
                existing.date = entry.date;
                existing.description = entry.description;
                existing.kind = entry.kind;
                Ok(())
            }
            None => Err(crate::error::AdvisorError::LedgerError(format!(
                "no entry with id {}",
                id
            ))),
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.id != id);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<LedgerEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn fetch_by_month(&self, month: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| Self::month_key(e) == month)
            .cloned()
            .collect())
    }

    async fn fetch_by_tag(&self, tag: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.tag == tag)
            .cloned()
            .collect())
    }

    async fn tags(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut tags: Vec<String> = Vec::new();
        for entry in entries.iter() {
            if !tags.contains(&entry.tag) {
                tags.push(entry.tag.clone());
            }
        }
        Ok(tags)
    }

    async fn total_income(&self) -> Result<f64> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.kind == EntryKind::Income)
            .map(|e| e.amount)
            .sum())
    }

    async fn total_expense(&self) -> Result<f64> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.kind == EntryKind::Expense)
            .map(|e| e.amount)
            .sum())
    }

    async fn monthly_trend(&self, months: u32) -> Result<Vec<MonthlyTrendPoint>> {
        let entries = self.entries.read().await;
        let mut by_month: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for entry in entries.iter() {
            let slot = by_month.entry(Self::month_key(entry)).or_insert((0.0, 0.0));
            match entry.kind {
                EntryKind::Income => slot.0 += entry.amount,
                EntryKind::Expense => slot.1 += entry.amount,
            }
        }

        // BTreeMap iterates months ascending; the trend is most-recent-first.
        Ok(by_month
            .into_iter()
            .rev()
            .take(months as usize)
            .map(|(month, (income, expense))| MonthlyTrendPoint {
                month,
                income,
                expense,
            })
            .collect())
    }

    async fn top_expense_tags(&self, limit: u32) -> Result<Vec<TagTotal>> {
        let entries = self.entries.read().await;
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.kind == EntryKind::Expense) {
            *totals.entry(entry.tag.clone()).or_insert(0.0) += entry.amount;
        }

        let mut ranked: Vec<TagTotal> = totals
            .into_iter()
            .map(|(tag, total)| TagTotal { tag, total })
            .collect();
        ranked.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn large_expenses(&self, threshold: f64) -> Result<Vec<LedgerEntry>> {
        let mut large: Vec<LedgerEntry> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.kind == EntryKind::Expense && e.amount >= threshold)
            .cloned()
            .collect();
        large.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(std::cmp::Ordering::Equal));
        Ok(large)
    }

    async fn average_monthly_income(&self) -> Result<f64> {
        let totals = self.monthly_totals(EntryKind::Income).await;
        if totals.is_empty() {
            return Ok(0.0);
        }
        Ok(totals.values().sum::<f64>() / totals.len() as f64)
    }

    async fn average_monthly_expense(&self) -> Result<f64> {
        let totals = self.monthly_totals(EntryKind::Expense).await;
        if totals.is_empty() {
            return Ok(0.0);
        }
        Ok(totals.values().sum::<f64>() / totals.len() as f64)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) fn entry(
        tag: &str,
        amount: f64,
        date: &str,
        description: &str,
        kind: EntryKind,
    ) -> NewEntry {
        NewEntry {
            tag: tag.to_string(),
            amount,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: description.to_string(),
            kind,
        }
    }

    /// Two months of sample data: income 5000 + 5000, expenses 1200 + 1200 + 175.
    pub(crate) async fn seed_two_months(ledger: &dyn LedgerStore) {
        ledger
            .insert(entry("salary", 5000.0, "2023-10-01", "Monthly pay", EntryKind::Income))
            .await
            .unwrap();
        ledger
            .insert(entry("hostel", 1200.0, "2023-10-01", "Monthly rent", EntryKind::Expense))
            .await
            .unwrap();
        ledger
            .insert(entry("salary", 5000.0, "2023-11-01", "Monthly pay", EntryKind::Income))
            .await
            .unwrap();
        ledger
            .insert(entry("hostel", 1200.0, "2023-11-01", "Monthly rent", EntryKind::Expense))
            .await
            .unwrap();
        ledger
            .insert(entry("food", 175.0, "2023-11-06", "Weekly shopping", EntryKind::Expense))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_ledger_totals() {
        let ledger = InMemoryLedger::new();
        assert_eq!(ledger.total_income().await.unwrap(), 0.0);
        assert_eq!(ledger.total_expense().await.unwrap(), 0.0);
        assert_eq!(ledger.savings().await.unwrap(), 0.0);
        assert!(ledger.monthly_trend(3).await.unwrap().is_empty());
        assert_eq!(ledger.average_monthly_income().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_two_month_scenario() {
        let ledger = InMemoryLedger::new();
        seed_two_months(&ledger).await;

        assert_eq!(ledger.total_income().await.unwrap(), 10_000.0);
        assert_eq!(ledger.total_expense().await.unwrap(), 2_575.0);
        assert_eq!(ledger.savings().await.unwrap(), 7_425.0);

        let trend = ledger.monthly_trend(3).await.unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].month, "2023-11");
        assert_eq!(trend[0].income, 5000.0);
        assert_eq!(trend[0].expense, 1375.0);
        assert_eq!(trend[1].month, "2023-10");
        assert_eq!(trend[1].expense, 1200.0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_idempotent() {
        let ledger = InMemoryLedger::new();
        let e = entry("food", 175.0, "2023-11-06", "Weekly shopping", EntryKind::Expense);

        assert!(ledger.insert(e.clone()).await.unwrap());
        assert!(!ledger.insert(e).await.unwrap());
        assert_eq!(ledger.fetch_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_top_expense_tags_ordering() {
        let ledger = InMemoryLedger::new();
        seed_two_months(&ledger).await;

        let top = ledger.top_expense_tags(5).await.unwrap();
        assert_eq!(top[0].tag, "hostel");
        assert_eq!(top[0].total, 2400.0);
        assert_eq!(top[1].tag, "food");
        assert_eq!(top[1].total, 175.0);
    }

    #[tokio::test]
    async fn test_large_expenses_threshold() {
        let ledger = InMemoryLedger::new();
        seed_two_months(&ledger).await;
        ledger
            .insert(entry("fashion", 12_500.0, "2023-11-20", "Wedding outfit", EntryKind::Expense))
            .await
            .unwrap();

        let large = ledger.large_expenses(10_000.0).await.unwrap();
        assert_eq!(large.len(), 1);
        assert_eq!(large[0].tag, "fashion");
    }

    #[tokio::test]
    async fn test_month_filter_and_update() {
        let ledger = InMemoryLedger::new();
        seed_two_months(&ledger).await;

        let november = ledger.fetch_by_month("2023-11").await.unwrap();
        assert_eq!(november.len(), 3);

        let first = ledger.fetch_all().await.unwrap()[0].clone();
        ledger
            .update(
                first.id,
                entry("salary", 5500.0, "2023-10-01", "Monthly pay + bonus", EntryKind::Income),
            )
            .await
            .unwrap();
        assert_eq!(ledger.total_income().await.unwrap(), 10_500.0);

        let missing = ledger
            .update(
                9999,
                entry("salary", 1.0, "2023-10-01", "x", EntryKind::Income),
            )
            .await;
        assert!(missing.is_err());
    }
}
