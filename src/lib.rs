//! Personal Finance Advisor
//!
//! A personal-finance tracker with an LLM-driven advisor pipeline:
//! - Transaction ledger with aggregate queries (SQLite or in-memory)
//! - Bank-statement CSV import with keyword category tagging
//! - Seven-stage advisor pipeline over a shared, typed state record
//! - Dependency-driven orchestration with barriers and a bounded
//!   report/evaluation retry loop
//!
//! PIPELINE:
//! COLLECT → [BEHAVIOR ‖ TRANSACTION] → [GOAL ‖ ADVICE] → REPORT ⇄ EVALUATE

pub mod api;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod importer;
pub mod ledger;
pub mod models;
pub mod stages;

pub use error::Result;

// Re-export common types
pub use classifier::RuleBasedTagClassifier;
pub use config::AdvisorConfig;
pub use engine::AdvisorEngine;
pub use models::*;
