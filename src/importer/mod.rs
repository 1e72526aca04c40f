//! Bank statement import
//!
//! Parses a bank-specific CSV export into normalized transaction tuples,
//! assigns each a category via the keyword classifier, and inserts them
//! into a ledger. Duplicate rows are counted, not re-inserted.

use crate::classifier::RuleBasedTagClassifier;
use crate::error::AdvisorError;
use crate::ledger::LedgerStore;
use crate::models::{EntryKind, NewEntry};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub mod pnb;
pub use pnb::Pnb;

/// One statement row after bank-specific normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatementEntry {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
}

/// Trait for one bank's statement layout
pub trait StatementFormat: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    /// Parse raw statement text into normalized rows.
    fn parse(&self, input: &str) -> Result<Vec<RawStatementEntry>>;
}

/// Resolve a parser by bank name.
pub fn resolve_format(bank: &str) -> Result<Box<dyn StatementFormat>> {
    match bank.to_lowercase().as_str() {
        "pnb" => Ok(Box::new(Pnb)),
        other => Err(AdvisorError::ImportError(format!(
            "bank '{}' is not supported",
            other
        ))),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
}

pub struct StatementImporter {
    classifier: RuleBasedTagClassifier,
}

impl StatementImporter {
    pub fn new() -> Self {
        Self {
            classifier: RuleBasedTagClassifier::new(),
        }
    }

    /// Parse statement text and tag every row. Statement withdrawals are
    /// recorded as expenses.
    pub fn entries(&self, input: &str, bank: &str) -> Result<Vec<NewEntry>> {
        let format = resolve_format(bank)?;
        let rows = format.parse(input)?;

        Ok(rows
            .into_iter()
            .map(|row| NewEntry {
                tag: self.classifier.classify(&row.description).to_string(),
                amount: row.amount,
                date: row.date,
                description: row.description,
                kind: EntryKind::Expense,
            })
            .collect())
    }

    /// Read a statement file from disk. Only CSV exports are supported.
    pub fn entries_from_file(&self, path: &Path, bank: &str) -> Result<Vec<NewEntry>> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase) {
            Some(ext) if ext == "csv" => {}
            Some(ext) if ext == "pdf" => {
                return Err(AdvisorError::ImportError(
                    "pdf statements are not supported yet".to_string(),
                ));
            }
            _ => {
                return Err(AdvisorError::ImportError(format!(
                    "unknown statement extension on '{}'",
                    path.display()
                )));
            }
        }

        let input = std::fs::read_to_string(path)?;
        self.entries(&input, bank)
    }

    /// Parse, tag and insert a statement into the ledger.
    pub async fn import_into(
        &self,
        ledger: &dyn LedgerStore,
        input: &str,
        bank: &str,
    ) -> Result<ImportSummary> {
        let entries = self.entries(input, bank)?;

        let mut summary = ImportSummary {
            imported: 0,
            duplicates: 0,
        };
        for entry in entries {
            if ledger.insert(entry).await? {
                summary.imported += 1;
            } else {
                summary.duplicates += 1;
            }
        }

        info!(
            bank = bank,
            imported = summary.imported,
            duplicates = summary.duplicates,
            "Statement import complete"
        );

        Ok(summary)
    }
}

impl Default for StatementImporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use super::pnb::tests::SAMPLE_STATEMENT;

    #[test]
    fn test_unsupported_bank() {
        let err = resolve_format("sbi").unwrap_err();
        assert!(matches!(err, AdvisorError::ImportError(_)));
    }

    #[test]
    fn test_entries_are_tagged() {
        let importer = StatementImporter::new();
        let entries = importer.entries(SAMPLE_STATEMENT, "pnb").unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].tag, "food");
        assert_eq!(entries[0].kind, EntryKind::Expense);
        assert_eq!(entries[1].tag, "cash_withdrawal");
        assert_eq!(entries[2].tag, "hostel");
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let importer = StatementImporter::new();
        let ledger = InMemoryLedger::new();

        let first = importer
            .import_into(&ledger, SAMPLE_STATEMENT, "pnb")
            .await
            .unwrap();
        assert_eq!(first, ImportSummary { imported: 3, duplicates: 0 });

        let second = importer
            .import_into(&ledger, SAMPLE_STATEMENT, "pnb")
            .await
            .unwrap();
        assert_eq!(second, ImportSummary { imported: 0, duplicates: 3 });

        assert_eq!(ledger.fetch_all().await.unwrap().len(), 3);
    }
}
