//! Report evaluation stage
//!
//! Scores the current report; its output is the sole signal for the
//! engine's retry decision.

use crate::backend::GenerativeBackend;
use crate::models::{PipelineState, ReportEvaluation, StateField, StateUpdate};
use crate::stages::{generate_structured, section, Stage};
use crate::Result;
use std::sync::Arc;

const SYSTEM: &str = "You are a strict report quality evaluator for financial advisory reports.";

const FORMAT: &str = r#"Return ONLY valid JSON, no explanation text:
{
  "consistency_score": 0.0,
  "tone_score": 0.0,
  "actionability_score": 0.0,
  "clarity_score": 0.0,
  "completeness_score": 0.0,
  "professionalism_score": 0.0,
  "language_score": 0.0,
  "ai_generated_score": 0.0,
  "overall_score": 0.0,
  "feedback": "specific, actionable improvement suggestions; brief confirmation when the report passes",
  "is_completed": false
}
All scores are 0-10."#;

pub struct ReportEvalStage {
    backend: Arc<dyn GenerativeBackend>,
}

impl ReportEvalStage {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Stage for ReportEvalStage {
    fn name(&self) -> &'static str {
        "report_eval"
    }

    fn reads(&self) -> &'static [StateField] {
        &[StateField::Report]
    }

    fn writes(&self) -> StateField {
        StateField::ReportEvaluation
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate> {
        let inputs = state.projection(self.name(), self.reads())?;

        let prompt = format!(
            "{}\nTASK:\nScore the report 0-10 on each criterion: consistency with the user data, tone appropriateness, actionability of recommendations, clarity, completeness, professional presentation, language quality, and generated-output standards. Set is_completed=true only when the report needs no further revision. When a score is low, the feedback must say exactly what to fix; be constructive and specific, not generic.\n\n{}",
            section("REPORT UNDER EVALUATION", &inputs["report"]),
            FORMAT
        );

        let output: crate::models::StageOutput<ReportEvaluation> =
            generate_structured(self.backend.as_ref(), self.name(), SYSTEM, prompt, FORMAT).await;

        Ok(StateUpdate::ReportEvaluation(output))
    }
}
