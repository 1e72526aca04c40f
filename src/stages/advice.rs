//! Advice planning stage

use crate::backend::GenerativeBackend;
use crate::models::{AdvicePlan, PipelineState, StateField, StateUpdate};
use crate::stages::{generate_structured, section, Stage};
use crate::Result;
use std::sync::Arc;

const SYSTEM: &str = "You are a certified financial advisor. You give practical, personalized planning advice based on the user's financial profile, behavioral patterns and spending data.";

const FORMAT: &str = r#"Return ONLY valid JSON, no explanation text:
{
  "for_archetype": "the financial archetype this advice is designed for",
  "advice_tone": "the tone that suits the user: encouraging, strict or neutral",
  "advice_title": "clear, actionable title summarizing the advice",
  "advice_details": "2-4 sentences on what the user should focus on right now",
  "behavioral_problems": ["major behavioral blockers"],
  "behavioral_solution": "a habit-based strategy to fix the main blocker",
  "behavior_solution_steps": ["short, concrete steps implementing that strategy"],
  "implementation_steps": ["practical next steps across budgeting, saving and planning"]
}"#;

pub struct AdviceStage {
    backend: Arc<dyn GenerativeBackend>,
}

impl AdviceStage {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Stage for AdviceStage {
    fn name(&self) -> &'static str {
        "advice"
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
        StateField::AdvicePlan
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate> {
        let inputs = state.projection(self.name(), self.reads())?;

        let prompt = format!(
            "{}{}{}{}\nTASK:\nGenerate structured advice for the user.\n\nRULES:\n1. If monthly savings are zero or negative, do not suggest investments; focus on expense control first.\n2. Tailor the tone to the user's financial archetype.\n3. Name behavioral issues directly and give a realistic plan to fix them.\n4. Be honest; if something is not feasible, say so.\n\n{}",
            section("USER PROFILE", &inputs["user_profile"]),
            section("FINANCIAL SNAPSHOT", &inputs["collector_snapshot"]),
            section("TRANSACTION INSIGHTS", &inputs["transaction_insight"]),
            section("BEHAVIORAL ANALYSIS", &inputs["behavior_profile"]),
            FORMAT
        );

        let output: crate::models::StageOutput<AdvicePlan> =
            generate_structured(self.backend.as_ref(), self.name(), SYSTEM, prompt, FORMAT).await;

        Ok(StateUpdate::AdvicePlan(output))
    }
}
