//! Report generation stage
//!
//! Produces the client-ready markdown report from every upstream artifact.
//! On retry iterations the previous evaluation's feedback is folded into the
//! prompt so the regenerated report addresses it.

use crate::backend::GenerativeBackend;
use crate::models::{PipelineState, Report, StateField, StateUpdate};
use crate::stages::{generate_structured, section, Stage};
use crate::Result;
use std::sync::Arc;

const SYSTEM: &str = "You are a professional report writer. You produce structured, client-ready financial reports in clear, human-readable markdown.";

const FORMAT: &str = r#"Return ONLY valid JSON, no explanation text:
{
  "report_title": "clear, professional title",
  "report_description": "one-paragraph description of the report",
  "report_tone": "the tone chosen for this user's archetype",
  "professionalism": "how the report's structure serves clarity",
  "language_tone": "plain-language commitment, no jargon",
  "final_report": "the full markdown report: title, introduction, background, key findings, recommendations, timeline, conclusion"
}"#;

pub struct ReportStage {
    backend: Arc<dyn GenerativeBackend>,
}

impl ReportStage {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl Stage for ReportStage {
    fn name(&self) -> &'static str {
        "report"
    }

    fn reads(&self) -> &'static [StateField] {
        &[
            StateField::UserProfile,
            StateField::CollectorSnapshot,
            StateField::TransactionInsight,
            StateField::GoalPlan,
            StateField::BehaviorProfile,
            StateField::AdvicePlan,
        ]
    }

    fn writes(&self) -> StateField {
        StateField::Report
    }

    async fn run(&self, state: &PipelineState) -> Result<StateUpdate> {
        let inputs = state.projection(self.name(), self.reads())?;

        let mut prompt = format!(
            "{}{}{}{}{}{}",
            section("USER PROFILE", &inputs["user_profile"]),
            section("FINANCIAL SNAPSHOT", &inputs["collector_snapshot"]),
            section("TRANSACTION INSIGHTS", &inputs["transaction_insight"]),
            section("BEHAVIORAL ANALYSIS", &inputs["behavior_profile"]),
            section("GOAL PLAN", &inputs["goal_plan"]),
            section("ADVICE", &inputs["advice_plan"]),
        );

        // Present on retry iterations only.
        if let Some(evaluation) = &state.report_evaluation {
            if let Some(evaluation) = evaluation.as_ready() {
                prompt.push_str(&format!(
                    "PRIOR EVALUATION FEEDBACK (the previous draft scored {:.1}/10; address every point):\n{}\n\n",
                    evaluation.overall_score, evaluation.feedback
                ));
            }
        }

        prompt.push_str(&format!(
            "TASK:\nGenerate a comprehensive markdown report summarizing the data above: title, introduction, background, key findings, recommendations, timeline, conclusion. Where an input section carries an error instead of data, state that the data is not available for that section rather than inventing it. Maintain clarity, confidence and empathy.\n\n{}",
            FORMAT
        ));

        let output: crate::models::StageOutput<Report> =
            generate_structured(self.backend.as_ref(), self.name(), SYSTEM, prompt, FORMAT).await;

        Ok(StateUpdate::Report(output))
    }
}
