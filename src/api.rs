//! REST API Server
//!
//! Exposes the advisor pipeline plus the ledger CRUD/import surface over
//! HTTP for the GUI and CLI consumers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::AdvisorConfig;
use crate::engine::AdvisorEngine;
use crate::error::AdvisorError;
use crate::importer::StatementImporter;
use crate::ledger::LedgerStore;
use crate::models::{NewEntry, UserAnswers};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct AdviseRequest {
    pub answers: UserAnswers,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub bank: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub month: Option<String>,
    pub tag: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<AdvisorEngine>,
    pub ledger: Arc<dyn LedgerStore>,
    pub importer: Arc<StatementImporter>,
    pub config: AdvisorConfig,
}

fn error_status(error: &AdvisorError) -> StatusCode {
    match error {
        AdvisorError::ImportError(_) | AdvisorError::ConfigError(_) => StatusCode::BAD_REQUEST,
        AdvisorError::LedgerError(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(error: AdvisorError) -> (StatusCode, Json<ApiResponse>) {
    (
        error_status(&error),
        Json(ApiResponse::error(error.to_string())),
    )
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Advisor Endpoint
/// =============================

async fn run_advisor(
    State(state): State<ApiState>,
    Json(req): Json<AdviseRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(answer_count = req.answers.len(), "Received advisor request");

    match state.engine.run(req.answers).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::success(result))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Ledger Endpoints
/// =============================

async fn list_transactions(
    State(state): State<ApiState>,
    Query(filter): Query<TransactionFilter>,
) -> (StatusCode, Json<ApiResponse>) {
    let result = match (&filter.month, &filter.tag) {
        (Some(month), _) => state.ledger.fetch_by_month(month).await,
        (None, Some(tag)) => state.ledger.fetch_by_tag(tag).await,
        (None, None) => state.ledger.fetch_all().await,
    };

    match result {
        Ok(entries) => (StatusCode::OK, Json(ApiResponse::success(entries))),
        Err(e) => failure(e),
    }
}

async fn create_transaction(
    State(state): State<ApiState>,
    Json(entry): Json<NewEntry>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.ledger.insert(entry).await {
        Ok(inserted) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                serde_json::json!({ "inserted": inserted }),
            )),
        ),
        Err(e) => failure(e),
    }
}

async fn update_transaction(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(entry): Json<NewEntry>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.ledger.update(id, entry).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "id": id }))),
        ),
        Err(e) => failure(e),
    }
}

async fn delete_transaction(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.ledger.delete(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "id": id }))),
        ),
        Err(e) => failure(e),
    }
}

async fn summary(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let ledger = state.ledger.as_ref();

    let assembled = async {
        Ok::<serde_json::Value, AdvisorError>(serde_json::json!({
            "total_income": ledger.total_income().await?,
            "total_expense": ledger.total_expense().await?,
            "savings": ledger.savings().await?,
            "average_monthly_income": ledger.average_monthly_income().await?,
            "average_monthly_expense": ledger.average_monthly_expense().await?,
            "monthly_trend": ledger.monthly_trend(state.config.trend_months).await?,
            "top_expense_tags": ledger.top_expense_tags(state.config.top_tags_limit).await?,
            "large_transactions": ledger
                .large_expenses(state.config.large_transaction_threshold)
                .await?,
        }))
    }
    .await;

    match assembled {
        Ok(summary) => (StatusCode::OK, Json(ApiResponse::success(summary))),
        Err(e) => failure(e),
    }
}

async fn import_statement(
    State(state): State<ApiState>,
    Json(req): Json<ImportRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(bank = %req.bank, "Received statement import");

    match state
        .importer
        .import_into(state.ledger.as_ref(), &req.content, &req.bank)
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(ApiResponse::success(summary))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/advise", post(run_advisor))
        .route(
            "/api/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/api/transactions/:id",
            axum::routing::put(update_transaction).delete(delete_transaction),
        )
        .route("/api/summary", get(summary))
        .route("/api/import", post(import_statement))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
