//! Orchestration engine
//!
//! Drives the seven stages through the fixed dependency topology:
//!
//! Collector → [Behavior ‖ Transaction] → [Goal ‖ Advice] → Report ⇄ Evaluate
//!
//! Sibling stages run concurrently and the engine waits for all of them at
//! each barrier. The only cycle is the report/evaluation loop, gated by the
//! approval threshold and bounded by the iteration cap.

use crate::backend::GenerativeBackend;
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::ledger::LedgerStore;
use crate::models::{AdvisorResult, PipelineState, StateField, StateUpdate, UserAnswers};
use crate::stages::collector::CollectorConfig;
use crate::stages::{
    AdviceStage, BehaviorStage, CollectorStage, GoalStage, ReportEvalStage, ReportStage, Stage,
    TransactionStage,
};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct AdvisorEngine {
    collector: CollectorStage,
    behavior: BehaviorStage,
    transaction: TransactionStage,
    goal: GoalStage,
    advice: AdviceStage,
    report: ReportStage,
    report_eval: ReportEvalStage,
    approval_threshold: f64,
    max_report_iterations: u32,
}

impl AdvisorEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        backend: Arc<dyn GenerativeBackend>,
        config: &AdvisorConfig,
    ) -> Self {
        let collector_config = CollectorConfig {
            trend_months: config.trend_months,
            top_tags_limit: config.top_tags_limit,
            large_transaction_threshold: config.large_transaction_threshold,
        };

        Self {
            collector: CollectorStage::new(ledger, collector_config),
            behavior: BehaviorStage::new(backend.clone()),
            transaction: TransactionStage::new(backend.clone()),
            goal: GoalStage::new(backend.clone()),
            advice: AdviceStage::new(backend.clone()),
            report: ReportStage::new(backend.clone()),
            report_eval: ReportEvalStage::new(backend),
            approval_threshold: config.approval_threshold,
            max_report_iterations: config.max_report_iterations.max(1),
        }
    }

    /// Run one advisor pipeline over a fresh state.
    pub async fn run(&self, answers: UserAnswers) -> Result<AdvisorResult> {
        let start_time = Instant::now();
        let mut state = PipelineState::new(answers);

        info!(run_id = ?state.run_id, "Advisor pipeline starting");

        let (approved, best_effort, iterations) = match self.drive(&mut state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                state.error = Some(e.to_string());
                error!(run_id = ?state.run_id, error = %e, "Advisor pipeline failed");
                return Err(e);
            }
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            run_id = ?state.run_id,
            iterations = iterations,
            approved = approved,
            elapsed_ms = elapsed_ms,
            "Advisor pipeline finished"
        );

        Ok(AdvisorResult {
            run_id: state.run_id,
            report: required(state.report, StateField::Report)?,
            behavior_profile: required(state.behavior_profile, StateField::BehaviorProfile)?,
            transaction_insight: required(
                state.transaction_insight,
                StateField::TransactionInsight,
            )?,
            goal_plan: required(state.goal_plan, StateField::GoalPlan)?,
            advice_plan: required(state.advice_plan, StateField::AdvicePlan)?,
            report_evaluation: required(state.report_evaluation, StateField::ReportEvaluation)?,
            collector_snapshot: required(state.collector_snapshot, StateField::CollectorSnapshot)?,
            approved,
            best_effort,
            iterations,
            elapsed_ms,
        })
    }

    /// Walk the topology over the given state; returns
    /// (approved, best_effort, iterations).
    async fn drive(&self, state: &mut PipelineState) -> Result<(bool, bool, u32)> {
        // === COLLECT ===
        // Ledger read failures are fatal for the whole run.
        let update = self.launch(&self.collector, state).await?;
        state.apply(update)?;

        // === ANALYZE ===
        // Behavior and Transaction own disjoint output fields; run both and
        // hold at the barrier until each has finished.
        let (behavior, transaction) = tokio::join!(
            self.launch(&self.behavior, state),
            self.launch(&self.transaction, state),
        );
        state.apply(behavior?)?;
        state.apply(transaction?)?;

        // === PLAN ===
        let (goal, advice) = tokio::join!(
            self.launch(&self.goal, state),
            self.launch(&self.advice, state),
        );
        state.apply(goal?)?;
        state.apply(advice?)?;

        // === REPORT / EVALUATE ===
        let mut iterations = 0u32;
        let (approved, best_effort) = loop {
            iterations += 1;

            let update = self.launch(&self.report, state).await?;
            state.apply(update)?;

            let update = self.launch(&self.report_eval, state).await?;
            state.apply(update)?;

            let evaluation = state
                .report_evaluation
                .as_ref()
                .and_then(|output| output.as_ready());
            let approved = evaluation
                .map(|e| e.is_completed && e.overall_score >= self.approval_threshold)
                .unwrap_or(false);

            if approved {
                info!(iterations = iterations, "Report approved");
                break (true, false);
            }

            if iterations >= self.max_report_iterations {
                warn!(
                    iterations = iterations,
                    "Report iteration cap reached, returning best-effort report"
                );
                break (false, true);
            }

            match evaluation {
                Some(e) => info!(
                    score = e.overall_score,
                    feedback = %e.feedback,
                    "Report not approved, regenerating"
                ),
                None => info!("Report evaluation unavailable, regenerating"),
            }
        };

        Ok((approved, best_effort, iterations))
    }

    /// Scheduling invariant: a stage never starts before every field in its
    /// declared input projection is present.
    async fn launch(&self, stage: &dyn Stage, state: &PipelineState) -> Result<StateUpdate> {
        for field in stage.reads() {
            if !state.contains(*field) {
                return Err(AdvisorError::UnmetDependency {
                    stage: stage.name(),
                    field: field.as_str(),
                });
            }
        }

        debug!(stage = stage.name(), "Stage started");
        let update = stage.run(state).await?;
        debug!(stage = stage.name(), field = %update.field(), "Stage finished");
        Ok(update)
    }
}

fn required<T>(value: Option<T>, field: StateField) -> Result<T> {
    value.ok_or_else(|| {
        AdvisorError::StateError(format!("field {} missing at pipeline exit", field))
    })
}
