//! Collector stage
//!
//! The only stage with no generative dependency: merges the raw user answers
//! with point-in-time ledger aggregates into the collector snapshot. Ledger
//! read failures are fatal for the run and propagate unchanged.

use crate::ledger::LedgerStore;
use crate::models::{
    CollectorSnapshot, FinancialSummary, PipelineState, StateField, StateUpdate, UserAnswers,
};
use crate::stages::Stage;
use crate::Result;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub trend_months: u32,
    pub top_tags_limit: u32,
    pub large_transaction_threshold: f64,
}

pub struct CollectorStage {
    ledger: Arc<dyn LedgerStore>,
    config: CollectorConfig,
}

impl CollectorStage {
    pub fn new(ledger: Arc<dyn LedgerStore>, config: CollectorConfig) -> Self {
        Self { ledger, config }
    }
}

#[async_trait::async_trait]
impl Stage for CollectorStage {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::UserProfile]
    }

    fn writes(&self) -> StateField {
        StateField::CollectorSnapshot
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate> {
        let total_income = self.ledger.total_income().await?;
        let total_expense = self.ledger.total_expense().await?;
        let savings = self.ledger.savings().await?;
        let monthly_trend = self.ledger.monthly_trend(self.config.trend_months).await?;
        let top_expense_tags = self
            .ledger
            .top_expense_tags(self.config.top_tags_limit)
            .await?;
        let large_transactions = self
            .ledger
            .large_expenses(self.config.large_transaction_threshold)
            .await?;

        let financial = FinancialSummary {
            total_income,
            total_expense,
            savings,
            monthly_trend,
            top_expense_tags,
            large_transactions,
        };

        let snapshot_hash = snapshot_hash(&state.user_profile, &financial);

        debug!(
            total_income = total_income,
            total_expense = total_expense,
            savings = savings,
            "Collector snapshot assembled"
        );

        Ok(StateUpdate::CollectorSnapshot(CollectorSnapshot {
            user: state.user_profile.clone(),
            financial,
            snapshot_hash,
        }))
    }
}

/// SHA256 over the snapshot content, streamed into the hasher without an
/// intermediate String.
fn snapshot_hash(user: &UserAnswers, financial: &FinancialSummary) -> String {
    let mut hasher = Sha256::new();

    let content = (user, financial);
    if serde_json::to_writer(&mut HashWriter(&mut hasher), &content).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::seed_two_months;
    use crate::ledger::InMemoryLedger;

    fn answers() -> UserAnswers {
        let mut answers = UserAnswers::new();
        answers.insert("age".to_string(), serde_json::json!(28));
        answers.insert(
            "financial_goals".to_string(),
            serde_json::json!("Save for a house down payment"),
        );
        answers
    }

    fn config() -> CollectorConfig {
        CollectorConfig {
            trend_months: 3,
            top_tags_limit: 5,
            large_transaction_threshold: 10_000.0,
        }
    }

    #[tokio::test]
    async fn test_snapshot_merges_answers_and_aggregates() {
        let ledger = Arc::new(InMemoryLedger::new());
        seed_two_months(ledger.as_ref()).await;

        let stage = CollectorStage::new(ledger, config());
        let state = PipelineState::new(answers());

        let update = stage.run(&state).await.unwrap();
        let snapshot = match update {
            StateUpdate::CollectorSnapshot(snapshot) => snapshot,
            other => panic!("unexpected update for field {}", other.field()),
        };

        assert_eq!(snapshot.financial.total_income, 10_000.0);
        assert_eq!(snapshot.financial.total_expense, 2_575.0);
        assert_eq!(snapshot.financial.savings, 7_425.0);
        assert_eq!(snapshot.financial.monthly_trend.len(), 2);
        assert_eq!(snapshot.financial.monthly_trend[0].month, "2023-11");
        assert_eq!(snapshot.user["age"], 28);
        assert!(!snapshot.snapshot_hash.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_hash_is_content_addressed() {
        let ledger = Arc::new(InMemoryLedger::new());
        let stage = CollectorStage::new(ledger.clone(), config());
        let state = PipelineState::new(answers());

        let hash = |update: StateUpdate| match update {
            StateUpdate::CollectorSnapshot(s) => s.snapshot_hash,
            _ => unreachable!(),
        };

        let empty_hash = hash(stage.run(&state).await.unwrap());
        assert_eq!(empty_hash, hash(stage.run(&state).await.unwrap()));

        seed_two_months(ledger.as_ref()).await;
        let seeded_hash = hash(stage.run(&state).await.unwrap());
        assert_ne!(empty_hash, seeded_hash);
    }
}
