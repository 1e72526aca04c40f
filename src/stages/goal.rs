//! Goal planning stage
//!
//! Turns the analysis outputs into one structured, honestly-assessed goal
//! plan. Runs concurrently with the advice stage.

use crate::backend::GenerativeBackend;
use crate::models::{GoalPlan, PipelineState, StateField, StateUpdate};
use crate::stages::{generate_structured, section, Stage};
use crate::Result;
use std::sync::Arc;

const SYSTEM: &str = "You are a financial planning assistant. You help the user reach their financial goals given their profile, behavior and constraints.";

const FORMAT: &str = r#"Return ONLY valid JSON, no explanation text:
{
  "goal_title": "title of the financial goal",
  "linked_profile_goal": "the stated user goal this plan serves",
  "realistic_target": "a realistic target given the user's financial situation",
  "user_defined_timeframe": "the user's own timeframe, quoted or judged",
  "honest_assessment": "a frank feasibility assessment; say so when the goal is unrealistic",
  "goal_category": "short_term or long_term",
  "steps": ["ordered, concrete steps to reach the goal"],
  "priority": "High, Medium or Low"
}"#;

pub struct GoalStage {
    backend: Arc<dyn GenerativeBackend>,
}

impl GoalStage {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Stage for GoalStage {
    fn name(&self) -> &'static str {
        "goal"
    }

    fn reads(&self) -> &'static [StateField] {
        &[
            StateField::UserProfile,
            StateField::CollectorSnapshot,
            StateField::TransactionInsight,
            StateField::BehaviorProfile,
        ]
    }

    fn writes(&self) -> StateField {
        StateField::GoalPlan
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate> {
        let inputs = state.projection(self.name(), self.reads())?;

        let prompt = format!(
            "{}{}{}{}\nTASK:\nDesign a structured, feasible goal plan. Ground every target in the actual savings numbers; if the user's own timeframe is unrealistic, say so in the honest assessment instead of inflating the plan.\n\n{}",
            section("USER PROFILE", &inputs["user_profile"]),
            section("FINANCIAL SNAPSHOT", &inputs["collector_snapshot"]),
            section("TRANSACTION INSIGHTS", &inputs["transaction_insight"]),
            section("BEHAVIORAL ANALYSIS", &inputs["behavior_profile"]),
            FORMAT
        );

        let output: crate::models::StageOutput<GoalPlan> =
            generate_structured(self.backend.as_ref(), self.name(), SYSTEM, prompt, FORMAT).await;

        Ok(StateUpdate::GoalPlan(output))
    }
}
