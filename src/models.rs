//! Core data models for the advisor pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::AdvisorError;
use crate::Result;

/// Free-form self-reported answers (goal, age, dependents, income source, …).
/// Ordered map so prompt rendering is deterministic.
pub type UserAnswers = BTreeMap<String, Value>;

//
// ================= Ledger =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(EntryKind::Income),
            "expense" => Some(EntryKind::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted ledger transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: i64,
    pub tag: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub kind: EntryKind,
}

/// A transaction without identity, as produced by the importer or API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEntry {
    pub tag: String,
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyTrendPoint {
    /// Calendar month formatted as `YYYY-MM`.
    pub month: String,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagTotal {
    pub tag: String,
    pub total: f64,
}

//
// ================= Collector Snapshot =================
//

/// Point-in-time ledger aggregates merged by the Collector stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub savings: f64,
    /// Most-recent-first monthly series.
    pub monthly_trend: Vec<MonthlyTrendPoint>,
    /// Descending by total.
    pub top_expense_tags: Vec<TagTotal>,
    pub large_transactions: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSnapshot {
    pub user: UserAnswers,
    pub financial: FinancialSummary,
    /// SHA-256 over the snapshot content, for audit trails.
    pub snapshot_hash: String,
}

//
// ================= Stage Outputs =================
//

/// What a generative stage writes: either the validated object or the
/// fallback error record when the backend never produced valid output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StageOutput<T> {
    Ready(T),
    Failed(StageFailure),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageFailure {
    pub error: String,
    pub raw: String,
}

impl<T> StageOutput<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, StageOutput::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            StageOutput::Ready(value) => Some(value),
            StageOutput::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BehaviorProfile {
    pub financial_archetype: String,
    pub risk_tolerance: String,
    pub short_term_goal_focus: String,
    pub long_term_goal_focus: String,
    pub behavioral_trait: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionInsight {
    pub spending_habits_summary: String,
    pub savings_pattern: String,
    pub key_observation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalPlan {
    pub goal_title: String,
    pub linked_profile_goal: String,
    pub realistic_target: String,
    pub user_defined_timeframe: String,
    pub honest_assessment: String,
    /// e.g. `short_term`, `long_term`
    pub goal_category: String,
    pub steps: Vec<String>,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdvicePlan {
    pub for_archetype: String,
    pub advice_tone: String,
    pub advice_title: String,
    pub advice_details: String,
    pub behavioral_problems: Vec<String>,
    pub behavioral_solution: String,
    pub behavior_solution_steps: Vec<String>,
    pub implementation_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub report_title: String,
    pub report_description: String,
    pub report_tone: String,
    pub professionalism: String,
    pub language_tone: String,
    /// Markdown body presented to the user.
    pub final_report: String,
}

/// Quality scores for the current report. Sub-scores are 0–10.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportEvaluation {
    pub consistency_score: f64,
    pub tone_score: f64,
    pub actionability_score: f64,
    pub clarity_score: f64,
    pub completeness_score: f64,
    pub professionalism_score: f64,
    pub language_score: f64,
    pub ai_generated_score: f64,
    pub overall_score: f64,
    pub feedback: String,
    pub is_completed: bool,
}

//
// ================= Shared Pipeline State =================
//

/// Names of the Shared Pipeline State fields a stage may declare in its
/// input projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateField {
    UserProfile,
    CollectorSnapshot,
    BehaviorProfile,
    TransactionInsight,
    GoalPlan,
    AdvicePlan,
    Report,
    ReportEvaluation,
}

impl StateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::UserProfile => "user_profile",
            StateField::CollectorSnapshot => "collector_snapshot",
            StateField::BehaviorProfile => "behavior_profile",
            StateField::TransactionInsight => "transaction_insight",
            StateField::GoalPlan => "goal_plan",
            StateField::AdvicePlan => "advice_plan",
            StateField::Report => "report",
            StateField::ReportEvaluation => "report_evaluation",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single field written by one stage run.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    CollectorSnapshot(CollectorSnapshot),
    BehaviorProfile(StageOutput<BehaviorProfile>),
    TransactionInsight(StageOutput<TransactionInsight>),
    GoalPlan(StageOutput<GoalPlan>),
    AdvicePlan(StageOutput<AdvicePlan>),
    Report(StageOutput<Report>),
    ReportEvaluation(StageOutput<ReportEvaluation>),
}

impl StateUpdate {
    pub fn field(&self) -> StateField {
        match self {
            StateUpdate::CollectorSnapshot(_) => StateField::CollectorSnapshot,
            StateUpdate::BehaviorProfile(_) => StateField::BehaviorProfile,
            StateUpdate::TransactionInsight(_) => StateField::TransactionInsight,
            StateUpdate::GoalPlan(_) => StateField::GoalPlan,
            StateUpdate::AdvicePlan(_) => StateField::AdvicePlan,
            StateUpdate::Report(_) => StateField::Report,
            StateUpdate::ReportEvaluation(_) => StateField::ReportEvaluation,
        }
    }
}

/// The record threaded through one advisor run. Created fresh per invocation,
/// discarded after the result is extracted.
///
/// Every field except `report` and `report_evaluation` is write-once; the
/// engine enforces this through [`PipelineState::apply`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub run_id: Uuid,
    pub user_profile: UserAnswers,
    pub collector_snapshot: Option<CollectorSnapshot>,
    pub behavior_profile: Option<StageOutput<BehaviorProfile>>,
    pub transaction_insight: Option<StageOutput<TransactionInsight>>,
    pub goal_plan: Option<StageOutput<GoalPlan>>,
    pub advice_plan: Option<StageOutput<AdvicePlan>>,
    pub report: Option<StageOutput<Report>>,
    pub report_evaluation: Option<StageOutput<ReportEvaluation>>,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(user_profile: UserAnswers) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            user_profile,
            collector_snapshot: None,
            behavior_profile: None,
            transaction_insight: None,
            goal_plan: None,
            advice_plan: None,
            report: None,
            report_evaluation: None,
            error: None,
        }
    }

    pub fn contains(&self, field: StateField) -> bool {
        match field {
            StateField::UserProfile => true,
            StateField::CollectorSnapshot => self.collector_snapshot.is_some(),
            StateField::BehaviorProfile => self.behavior_profile.is_some(),
            StateField::TransactionInsight => self.transaction_insight.is_some(),
            StateField::GoalPlan => self.goal_plan.is_some(),
            StateField::AdvicePlan => self.advice_plan.is_some(),
            StateField::Report => self.report.is_some(),
            StateField::ReportEvaluation => self.report_evaluation.is_some(),
        }
    }

    /// Apply a stage's output. Rejects a second write to any write-once field.
    pub fn apply(&mut self, update: StateUpdate) -> Result<()> {
        let field = update.field();
        match update {
            StateUpdate::CollectorSnapshot(value) => {
                Self::set_once(&mut self.collector_snapshot, value, field)
            }
            StateUpdate::BehaviorProfile(value) => {
                Self::set_once(&mut self.behavior_profile, value, field)
            }
            StateUpdate::TransactionInsight(value) => {
                Self::set_once(&mut self.transaction_insight, value, field)
            }
            StateUpdate::GoalPlan(value) => Self::set_once(&mut self.goal_plan, value, field),
            StateUpdate::AdvicePlan(value) => Self::set_once(&mut self.advice_plan, value, field),
            // The report/evaluation pair is rewritten on every retry iteration.
            StateUpdate::Report(value) => {
                self.report = Some(value);
                Ok(())
            }
            StateUpdate::ReportEvaluation(value) => {
                self.report_evaluation = Some(value);
                Ok(())
            }
        }
    }

    fn set_once<T>(slot: &mut Option<T>, value: T, field: StateField) -> Result<()> {
        if slot.is_some() {
            return Err(AdvisorError::StateError(format!(
                "field {} is write-once and already set",
                field
            )));
        }
        *slot = Some(value);
        Ok(())
    }

    /// Materialize the named fields as JSON for prompt construction.
    /// Every requested field must be present.
    pub fn projection(
        &self,
        stage: &'static str,
        fields: &[StateField],
    ) -> Result<BTreeMap<&'static str, Value>> {
        let mut out = BTreeMap::new();
        for field in fields {
            let value = match field {
                StateField::UserProfile => Some(serde_json::to_value(&self.user_profile)?),
                StateField::CollectorSnapshot => self
                    .collector_snapshot
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
                StateField::BehaviorProfile => self
                    .behavior_profile
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
                StateField::TransactionInsight => self
                    .transaction_insight
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
                StateField::GoalPlan => self
                    .goal_plan
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
                StateField::AdvicePlan => self
                    .advice_plan
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
                StateField::Report => self.report.as_ref().map(serde_json::to_value).transpose()?,
                StateField::ReportEvaluation => self
                    .report_evaluation
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
            };

            match value {
                Some(value) => {
                    out.insert(field.as_str(), value);
                }
                None => {
                    return Err(AdvisorError::UnmetDependency {
                        stage,
                        field: field.as_str(),
                    });
                }
            }
        }
        Ok(out)
    }
}

//
// ================= Final Result =================
//

/// Everything the caller gets back from one advisor run: the report plus all
/// intermediate artifacts for display.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisorResult {
    pub run_id: Uuid,
    pub report: StageOutput<Report>,
    pub behavior_profile: StageOutput<BehaviorProfile>,
    pub transaction_insight: StageOutput<TransactionInsight>,
    pub goal_plan: StageOutput<GoalPlan>,
    pub advice_plan: StageOutput<AdvicePlan>,
    pub report_evaluation: StageOutput<ReportEvaluation>,
    pub collector_snapshot: CollectorSnapshot,
    /// True when the evaluation cleared the approval threshold.
    pub approved: bool,
    /// True when the retry cap was hit and the latest report was returned as-is.
    pub best_effort: bool,
    pub iterations: u32,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_behavior() -> BehaviorProfile {
        BehaviorProfile {
            financial_archetype: "Cautious Saver".to_string(),
            risk_tolerance: "Low".to_string(),
            short_term_goal_focus: "Emergency fund".to_string(),
            long_term_goal_focus: "House down payment".to_string(),
            behavioral_trait: "Disciplined".to_string(),
        }
    }

    #[test]
    fn test_stage_output_serde_untagged() {
        let ready: StageOutput<BehaviorProfile> = StageOutput::Ready(sample_behavior());
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["financial_archetype"], "Cautious Saver");

        let failed: StageOutput<BehaviorProfile> = StageOutput::Failed(StageFailure {
            error: "generation failed to produce a valid schema".to_string(),
            raw: "not json".to_string(),
        });
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "generation failed to produce a valid schema");
        assert_eq!(json["raw"], "not json");

        let back: StageOutput<BehaviorProfile> = serde_json::from_value(json).unwrap();
        assert!(!back.is_ready());
    }

    #[test]
    fn test_write_once_rejects_second_write() {
        let mut state = PipelineState::new(UserAnswers::new());
        state
            .apply(StateUpdate::BehaviorProfile(StageOutput::Ready(
                sample_behavior(),
            )))
            .unwrap();

        let err = state
            .apply(StateUpdate::BehaviorProfile(StageOutput::Ready(
                sample_behavior(),
            )))
            .unwrap_err();
        assert!(matches!(err, AdvisorError::StateError(_)));
    }

    #[test]
    fn test_report_is_overwritable() {
        let mut state = PipelineState::new(UserAnswers::new());
        let report = Report {
            report_title: "t".to_string(),
            report_description: "d".to_string(),
            report_tone: "calm".to_string(),
            professionalism: "high".to_string(),
            language_tone: "plain".to_string(),
            final_report: "# Report".to_string(),
        };
        state
            .apply(StateUpdate::Report(StageOutput::Ready(report.clone())))
            .unwrap();
        state
            .apply(StateUpdate::Report(StageOutput::Ready(report)))
            .unwrap();
    }

    #[test]
    fn test_projection_errors_on_absent_field() {
        let state = PipelineState::new(UserAnswers::new());
        let err = state
            .projection("behavior", &[StateField::CollectorSnapshot])
            .unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::UnmetDependency {
                stage: "behavior",
                field: "collector_snapshot"
            }
        ));
    }

    #[test]
    fn test_projection_includes_user_profile() {
        let mut answers = UserAnswers::new();
        answers.insert("age".to_string(), serde_json::json!(28));
        let state = PipelineState::new(answers);

        let projection = state
            .projection("behavior", &[StateField::UserProfile])
            .unwrap();
        assert_eq!(projection["user_profile"]["age"], 28);
    }
}
