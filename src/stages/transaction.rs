//! Transaction analysis stage

use crate::backend::GenerativeBackend;
use crate::models::{PipelineState, StateField, StateUpdate, TransactionInsight};
use crate::stages::{generate_structured, section, Stage};
use crate::Result;
use std::sync::Arc;

const SYSTEM: &str = "You are a financial research assistant. You analyze user transactions for deeper insight into their financial behavior.";

const FORMAT: &str = r#"Return ONLY valid JSON, no explanation text:
{
  "spending_habits_summary": "spending patterns over time, spikes and category concentration",
  "savings_pattern": "how the savings rate moves month to month",
  "key_observation": "the single most important takeaway from the transactions"
}"#;

pub struct TransactionStage {
    backend: Arc<dyn GenerativeBackend>,
}

impl TransactionStage {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Stage for TransactionStage {
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::CollectorSnapshot]
    }

    fn writes(&self) -> StateField {
        StateField::TransactionInsight
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate> {
        let inputs = state.projection(self.name(), self.reads())?;

        let prompt = format!(
            "{}\nTASK:\nAnalyze the financial data above. Consider spending spikes by month and category, whether expenses concentrate in essentials or non-essentials, and whether the income-versus-expense trend is stable, increasing or erratic.\n\n{}",
            section("FINANCIAL DATA", &inputs["collector_snapshot"]),
            FORMAT
        );

        let output: crate::models::StageOutput<TransactionInsight> =
            generate_structured(self.backend.as_ref(), self.name(), SYSTEM, prompt, FORMAT).await;

        Ok(StateUpdate::TransactionInsight(output))
    }
}
