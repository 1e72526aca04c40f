//! Behavior analysis stage

use crate::backend::GenerativeBackend;
use crate::models::{BehaviorProfile, PipelineState, StateField, StateUpdate};
use crate::stages::{generate_structured, section, Stage};
use crate::Result;
use std::sync::Arc;

const SYSTEM: &str = "You are a financial behavior analyst. You identify a user's psychological and strategic approach to money management from their financial data and actions.";

const FORMAT: &str = r#"Return ONLY valid JSON, no explanation text:
{
  "financial_archetype": "the user's archetype, e.g. Cautious Saver, Impulsive Spender, Strategic Planner",
  "risk_tolerance": "risk-averse, risk-neutral or risk-seeking, stated plainly",
  "short_term_goal_focus": "the most visible short-term goal or pattern",
  "long_term_goal_focus": "the most visible long-term goal or pattern",
  "behavioral_trait": "the user's dominant behavioral tendencies"
}"#;

pub struct BehaviorStage {
    backend: Arc<dyn GenerativeBackend>,
}

impl BehaviorStage {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Stage for BehaviorStage {
    fn name(&self) -> &'static str {
        "behavior"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::CollectorSnapshot]
    }

    fn writes(&self) -> StateField {
        StateField::BehaviorProfile
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate> {
        let inputs = state.projection(self.name(), self.reads())?;

        let prompt = format!(
            "{}\nTASK:\nAnalyze the information above and produce a structured behavioral profile: the user's financial archetype, risk tolerance, short- and long-term focus, and dominant behavioral traits.\n\n{}",
            section("FINANCIAL SNAPSHOT", &inputs["collector_snapshot"]),
            FORMAT
        );

        let output: crate::models::StageOutput<BehaviorProfile> =
            generate_structured(self.backend.as_ref(), self.name(), SYSTEM, prompt, FORMAT).await;

        Ok(StateUpdate::BehaviorProfile(output))
    }
}
