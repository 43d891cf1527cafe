//! Tool-usage analytics
//!
//! Records which specialist agent handled each step of a chat trace and
//! aggregates usage into per-agent summaries. Storage and deterministic
//! aggregation only; routing and agent execution live elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::round2;
use crate::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UsageStatus {
    Healthy,
    Errored,
}

/// One executed step of a chat trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsageRecord {
    pub usage_id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub trace_id: Uuid,
    pub agent_name: String,
    pub task_type: String,
    pub tool_name: Option<String>,
    pub duration_ms: u64,
    pub tokens_used: u64,
    pub status: UsageStatus,
    pub created_at: DateTime<Utc>,
}

/// Aggregated usage for one (agent, task type) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageSummaryRow {
    pub agent: String,
    pub task_type: String,
    pub total_steps: u64,
    pub avg_duration_ms: f64,
    pub total_tokens: u64,
    pub unique_sessions: u64,
}

/// In-memory tool-usage log.
pub struct AnalyticsLog {
    records: Arc<RwLock<Vec<ToolUsageRecord>>>,
}

impl AnalyticsLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn record(&self, record: ToolUsageRecord) -> Result<Uuid> {
        let usage_id = record.usage_id;
        let mut records = self.records.write().await;
        records.push(record);
        Ok(usage_id)
    }

    /// All records for a session, ascending by timestamp.
    pub async fn records_for_session(&self, session_id: Uuid) -> Result<Vec<ToolUsageRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<ToolUsageRecord> = records
            .iter()
            .filter(|record| record.session_id == session_id)
            .cloned()
            .collect();

        items.sort_by_key(|record| record.created_at);
        Ok(items)
    }

    /// Per (agent, task type) usage summary, optionally filtered by user
    /// and/or agent. Deterministically ordered by agent then task type.
    pub async fn usage_summary(
        &self,
        user_id: Option<Uuid>,
        agent_name: Option<&str>,
    ) -> Result<Vec<UsageSummaryRow>> {
        let records = self.records.read().await;

        let mut groups: BTreeMap<(String, String), (u64, u64, u64, HashSet<Uuid>)> =
            BTreeMap::new();

        for record in records.iter() {
            if user_id.map(|id| record.user_id != id).unwrap_or(false) {
                continue;
            }
            if agent_name
                .map(|name| record.agent_name != name)
                .unwrap_or(false)
            {
                continue;
            }

            let entry = groups
                .entry((record.agent_name.clone(), record.task_type.clone()))
                .or_insert((0, 0, 0, HashSet::new()));
            entry.0 += 1;
            entry.1 += record.duration_ms;
            entry.2 += record.tokens_used;
            entry.3.insert(record.session_id);
        }

        Ok(groups
            .into_iter()
            .map(|((agent, task_type), (steps, duration, tokens, sessions))| UsageSummaryRow {
                agent,
                task_type,
                total_steps: steps,
                avg_duration_ms: round2(duration as f64 / steps as f64),
                total_tokens: tokens,
                unique_sessions: sessions.len() as u64,
            })
            .collect())
    }
}

impl Default for AnalyticsLog {
    fn default() -> Self {
        Self::new()
    }
}
