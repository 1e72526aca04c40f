use chrono::NaiveDate;
use fintrack_advisor::{
    backend::{BackendRouter, GenerativeBackend, MockBackend},
    config::AdvisorConfig,
    engine::AdvisorEngine,
    ledger::{InMemoryLedger, LedgerStore, SqliteLedger},
    models::{EntryKind, NewEntry, UserAnswers},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();
    let config = AdvisorConfig::from_env()?;

    info!("Personal Finance Advisor starting");

    // Ledger: SQLite when configured, otherwise an in-memory sample ledger
    let ledger: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => Arc::new(SqliteLedger::connect(url).await?),
        None => {
            let ledger = Arc::new(InMemoryLedger::new());
            seed_sample_ledger(ledger.as_ref()).await?;
            info!("No DATABASE_URL set, using an in-memory sample ledger");
            ledger
        }
    };

    // Backend: configured providers, or the mock backend for a keyless demo
    let backend: Arc<dyn GenerativeBackend> = match BackendRouter::from_config(&config) {
        Ok(router) => Arc::new(router),
        Err(e) => {
            eprintln!("⚠️  {}", e);
            eprintln!("📌 Running the demo against the mock backend");
            Arc::new(MockBackend)
        }
    };

    let engine = AdvisorEngine::new(ledger, backend, &config);

    let answers = sample_answers();
    info!("Running advisor pipeline");

    match engine.run(answers).await {
        Ok(result) => {
            println!("\n=== ADVISOR RESULT ===");
            println!("Run ID: {}", result.run_id);
            println!(
                "Approved: {} (best effort: {}, iterations: {})",
                result.approved, result.best_effort, result.iterations
            );

            match result.report.as_ready() {
                Some(report) => {
                    println!("\n--- {} ---\n", report.report_title);
                    println!("{}", report.final_report);
                }
                None => println!("\nReport generation failed; see intermediate artifacts."),
            }

            if let Some(evaluation) = result.report_evaluation.as_ready() {
                println!("\nEvaluation: {:.1}/10", evaluation.overall_score);
                println!("Feedback: {}", evaluation.feedback);
            }

            Ok(())
        }
        Err(e) => {
            eprintln!("Advisor run failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}

fn sample_answers() -> UserAnswers {
    let mut answers = UserAnswers::new();
    answers.insert("age".to_string(), serde_json::json!(28));
    answers.insert("occupation".to_string(), serde_json::json!("Software Engineer"));
    answers.insert("annual_income".to_string(), serde_json::json!(85_000));
    answers.insert(
        "financial_goals".to_string(),
        serde_json::json!("Save for house down payment and build emergency fund"),
    );
    answers.insert("target_amount".to_string(), serde_json::json!(50_000));
    answers.insert("timeline".to_string(), serde_json::json!("3 years"));
    answers.insert("risk_tolerance".to_string(), serde_json::json!("Moderate"));
    answers
}

async fn seed_sample_ledger(ledger: &dyn LedgerStore) -> fintrack_advisor::Result<()> {
    let rows = [
        ("salary", 5000.0, "2023-10-01", "Monthly pay", EntryKind::Income),
        ("food", 150.0, "2023-10-05", "Weekly shopping", EntryKind::Expense),
        ("hostel", 1200.0, "2023-10-01", "Monthly rent", EntryKind::Expense),
        ("salary", 5000.0, "2023-11-01", "Monthly pay", EntryKind::Income),
        ("food", 175.0, "2023-11-06", "Weekly shopping", EntryKind::Expense),
        ("hostel", 1200.0, "2023-11-01", "Monthly rent", EntryKind::Expense),
    ];

    for (tag, amount, date, description, kind) in rows {
        ledger
            .insert(NewEntry {
                tag: tag.to_string(),
                amount,
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .map_err(|e| fintrack_advisor::error::AdvisorError::LedgerError(e.to_string()))?,
                description: description.to_string(),
                kind,
            })
            .await?;
    }

    Ok(())
}
