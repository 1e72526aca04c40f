//! Pipeline stages
//!
//! Each stage declares the state fields it reads, calls the generative
//! backend with a schema-bound prompt, and writes exactly one field of the
//! Shared Pipeline State. The Collector is the one deterministic exception.

use crate::backend::{GenerationRequest, GenerativeBackend};
use crate::models::{PipelineState, StageFailure, StageOutput, StateField, StateUpdate};
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

pub mod advice;
pub mod behavior;
pub mod collector;
pub mod goal;
pub mod report;
pub mod report_eval;
pub mod transaction;

pub use advice::AdviceStage;
pub use behavior::BehaviorStage;
pub use collector::CollectorStage;
pub use goal::GoalStage;
pub use report::ReportStage;
pub use report_eval::ReportEvalStage;
pub use transaction::TransactionStage;

/// Trait for one pipeline stage: projected inputs in, one field out.
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    /// State fields that must be present before this stage may run.
    fn reads(&self) -> &'static [StateField];
    fn writes(&self) -> StateField;
    async fn run(&self, state: &PipelineState) -> Result<StateUpdate>;
}

/// Pull the JSON body out of a model response: strips markdown fences and
/// any reasoning preamble around the outermost object.
pub(crate) fn extract_json(raw: &str) -> &str {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if cleaned.starts_with('{') {
        return cleaned;
    }

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned,
    }
}

/// Render one projected state field as a prompt section.
pub(crate) fn section(title: &str, value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("{}:\n{}\n", title, body)
}

/// Schema-bound generation with one self-correction attempt.
///
/// attempt(parse) → attempt(parse with repair hint) → fallback. Failures
/// never escape as errors; the stage's output field carries the fallback
/// record and downstream stages render the section as unavailable.
pub(crate) async fn generate_structured<T: DeserializeOwned>(
    backend: &dyn GenerativeBackend,
    stage: &'static str,
    system: &str,
    prompt: String,
    format_instructions: &str,
) -> StageOutput<T> {
    let request = GenerationRequest {
        system: system.to_string(),
        prompt,
    };

    let raw = match backend.generate(&request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(stage = stage, error = %e, "Generation call failed");
            return StageOutput::Failed(StageFailure {
                error: format!("generation call failed: {}", e),
                raw: String::new(),
            });
        }
    };

    match serde_json::from_str::<T>(extract_json(&raw)) {
        Ok(value) => return StageOutput::Ready(value),
        Err(e) => {
            debug!(stage = stage, error = %e, "Output failed schema validation, retrying");
        }
    }

    // One re-request asking the backend to fix its own malformed output.
    let repair = GenerationRequest {
        system: request.system,
        prompt: format!(
            "Your previous output failed schema validation.\n\nPREVIOUS OUTPUT:\n{}\n\nRewrite it as valid JSON matching the required schema. {}",
            raw, format_instructions
        ),
    };

    match backend.generate(&repair).await {
        Ok(repaired) => {
            if let Ok(value) = serde_json::from_str::<T>(extract_json(&repaired)) {
                return StageOutput::Ready(value);
            }
        }
        Err(e) => {
            warn!(stage = stage, error = %e, "Repair generation call failed");
        }
    }

    warn!(stage = stage, "Stage degraded to fallback output");

    StageOutput::Failed(StageFailure {
        error: "generation failed to produce a valid schema".to_string(),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BehaviorProfile;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend that replays a fixed script of responses.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerativeBackend for ScriptedBackend {
        fn provider(&self) -> &'static str {
            "scripted"
        }

        async fn generate(&self, _request: &GenerationRequest) -> crate::Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| {
                    crate::error::AdvisorError::GenerationError("script exhausted".to_string())
                })
        }
    }

    const VALID_BEHAVIOR: &str = r#"{
        "financial_archetype": "Cautious Saver",
        "risk_tolerance": "Low",
        "short_term_goal_focus": "Emergency fund",
        "long_term_goal_focus": "Down payment",
        "behavioral_trait": "Disciplined"
    }"#;

    #[test]
    fn test_extract_json_strips_fences() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(fenced), "{\"a\": 1}");

        let bare = "  {\"a\": 1}  ";
        assert_eq!(extract_json(bare), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_skips_reasoning_preamble() {
        let noisy = "Let me think about this.\n\n{\"a\": 1}\n\nDone.";
        assert_eq!(extract_json(noisy), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_valid_output_first_try() {
        let backend = ScriptedBackend::new(&[VALID_BEHAVIOR]);
        let output: StageOutput<BehaviorProfile> =
            generate_structured(&backend, "behavior", "system", "prompt".to_string(), "{}").await;

        assert!(output.is_ready());
        assert_eq!(output.as_ready().unwrap().risk_tolerance, "Low");
    }

    #[tokio::test]
    async fn test_self_correction_recovers() {
        let backend = ScriptedBackend::new(&["this is not json at all", VALID_BEHAVIOR]);
        let output: StageOutput<BehaviorProfile> =
            generate_structured(&backend, "behavior", "system", "prompt".to_string(), "{}").await;

        assert!(output.is_ready());
    }

    #[tokio::test]
    async fn test_double_failure_degrades_to_fallback() {
        let backend = ScriptedBackend::new(&["garbage one", "garbage two"]);
        let output: StageOutput<BehaviorProfile> =
            generate_structured(&backend, "behavior", "system", "prompt".to_string(), "{}").await;

        match output {
            StageOutput::Failed(failure) => {
                assert_eq!(failure.error, "generation failed to produce a valid schema");
                assert_eq!(failure.raw, "garbage one");
            }
            StageOutput::Ready(_) => panic!("expected fallback output"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_degrades_to_fallback() {
        let backend = ScriptedBackend::new(&[]);
        let output: StageOutput<BehaviorProfile> =
            generate_structured(&backend, "behavior", "system", "prompt".to_string(), "{}").await;

        match output {
            StageOutput::Failed(failure) => {
                assert!(failure.error.contains("generation call failed"));
            }
            StageOutput::Ready(_) => panic!("expected fallback output"),
        }
    }
}
