//! Banking Widget Engine
//!
//! A query engine for the dynamic dashboard widgets of a banking
//! assistant:
//! - Declarative widget queries (query type + time range + filters)
//! - Time-bucketed aggregations over an account/transaction ledger
//! - Pluggable ledger backends (in-memory, Postgres)
//! - Widget storage with cached-data refresh
//! - Tool-usage analytics for chat traces
//!
//! QUERY PIPELINE:
//! CONFIG → TIME RANGE → ACCOUNT SCOPE → EXECUTOR → DATA ROWS

pub mod analytics;
pub mod api;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod timerange;
pub mod widgets;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use timerange::TimeRange;
