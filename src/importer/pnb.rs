//! Punjab National Bank statement parser
//!
//! PNB CSV exports wrap the transaction table in account metadata: the table
//! starts at the header row containing "Transaction Date" and ends before the
//! trailing disclaimer row starting with "Unless". Only withdrawal rows are
//! kept; dates arrive as `dd/mm/YYYY` and amounts with comma grouping.

use crate::error::AdvisorError;
use crate::importer::{RawStatementEntry, StatementFormat};
use crate::Result;
use chrono::NaiveDate;

const DATE_COLUMN: &str = "Transaction Date";
const WITHDRAWAL_COLUMN: &str = "Withdrawal";
const NARRATION_COLUMN: &str = "Narration";

#[derive(Debug)]
pub struct Pnb;

impl Pnb {
    fn transaction_section(input: &str) -> Result<String> {
        let lines: Vec<&str> = input.lines().collect();

        let start = lines
            .iter()
            .position(|line| line.contains(DATE_COLUMN))
            .ok_or_else(|| {
                AdvisorError::ImportError("transaction history not found".to_string())
            })?;
        let end = lines
            .iter()
            .position(|line| line.contains("Unless"))
            .unwrap_or(lines.len());

        Ok(lines[start..end].join("\n"))
    }

    fn column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| AdvisorError::ImportError(format!("missing column '{}'", name)))
    }

    fn parse_amount(raw: &str) -> Result<f64> {
        raw.trim()
            .replace(',', "")
            .parse::<f64>()
            .map_err(|_| AdvisorError::ImportError(format!("bad amount '{}'", raw)))
    }

    fn parse_date(raw: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y")
            .map_err(|_| AdvisorError::ImportError(format!("bad date '{}'", raw)))
    }
}

impl StatementFormat for Pnb {
    fn name(&self) -> &'static str {
        "pnb"
    }

    fn parse(&self, input: &str) -> Result<Vec<RawStatementEntry>> {
        let section = Self::transaction_section(input)?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(section.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AdvisorError::ImportError(format!("csv header error: {}", e)))?
            .clone();
        let date_idx = Self::column(&headers, DATE_COLUMN)?;
        let withdrawal_idx = Self::column(&headers, WITHDRAWAL_COLUMN)?;
        let narration_idx = Self::column(&headers, NARRATION_COLUMN)?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| AdvisorError::ImportError(format!("csv row error: {}", e)))?;

            let withdrawal = record.get(withdrawal_idx).unwrap_or("").trim();
            if withdrawal.is_empty() {
                continue;
            }

            entries.push(RawStatementEntry {
                date: Self::parse_date(record.get(date_idx).unwrap_or(""))?,
                amount: Self::parse_amount(withdrawal)?,
                description: record.get(narration_idx).unwrap_or("").trim().to_string(),
            });
        }

        Ok(entries)
    }
}
