use fintrack_advisor::{
    api::{start_server, ApiState},
    backend::{BackendRouter, GenerativeBackend},
    config::AdvisorConfig,
    engine::AdvisorEngine,
    importer::StatementImporter,
    ledger::{InMemoryLedger, LedgerStore, SqliteLedger},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();
    let config = AdvisorConfig::from_env()?;

    info!("🚀 Personal Finance Advisor - API Server");
    info!("📍 Port: {}", config.port);

    // A working generative backend is required before the server starts.
    let backend: Arc<dyn GenerativeBackend> = Arc::new(BackendRouter::from_config(&config)?);

    let ledger: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => Arc::new(SqliteLedger::connect(url).await?),
        None => {
            info!("No DATABASE_URL set, using an in-memory ledger");
            Arc::new(InMemoryLedger::new())
        }
    };

    let engine = Arc::new(AdvisorEngine::new(ledger.clone(), backend, &config));

    let state = ApiState {
        engine,
        ledger,
        importer: Arc::new(StatementImporter::new()),
        config: config.clone(),
    };

    info!("✅ Advisor engine initialized");
    info!("📡 Starting API server...");

    start_server(state, config.port).await?;

    Ok(())
}
