//! Wire types for the marketlens research service.
//!
//! Every request/response body the client exchanges with the server lives
//! here. Stream frames are not HTTP bodies and live in `marketlens-core`.

use serde::{Deserialize, Serialize};

pub mod reports;

// Re-export core types for convenience
pub use marketlens_core::{Budget, LlmConfigs, ModelConfig};
pub use reports::ReportSort;

// ─── Workflow ────────────────────────────────────────────────────────────────

/// Stream tuning forwarded to the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamConfig {
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
        }
    }
}

fn default_recursion_limit() -> u32 {
    150
}

/// Workflow configuration sent with every submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_members: Option<serde_json::Value>,
    pub researcher_credits: u32,
    pub market_credits: u32,
    pub coder_credits: u32,
    pub browser_credits: u32,
    #[serde(default)]
    pub stream_config: StreamConfig,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_configs: Option<LlmConfigs>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            team_members: None,
            researcher_credits: 6,
            market_credits: 6,
            coder_credits: 0,
            browser_credits: 3,
            stream_config: StreamConfig::default(),
            budget: Budget::Low,
            llm_configs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub query: String,
}

/// Request body for `POST /api/run-workflow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    pub request: WorkflowRequest,
    pub config: WorkflowConfig,
}

impl RunWorkflowRequest {
    pub fn new(query: &str, config: WorkflowConfig) -> Self {
        Self {
            request: WorkflowRequest {
                query: query.trim().to_string(),
            },
            config,
        }
    }
}

/// Returned by `POST /api/run-workflow`. The stream location arrives in the
/// `Content-Location` header, not the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunWorkflowResponse {
    pub run_id: String,
    pub session_id: String,
    #[serde(default)]
    pub status: String,
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Ticker reference attached to report metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerRef {
    pub ticker: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReportMetadata {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub tickers: Option<Vec<TickerRef>>,
    #[serde(default)]
    pub ticker_type: Option<String>,
}

/// A persisted research report (markdown body).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub metadata: ReportMetadata,
    pub session_id: String,
}

/// Returned by `GET /api/recent-reports?limit=N`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentReportsResponse {
    pub reports: Vec<Report>,
}

/// Returned by `GET /api/history/reports/{session_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReportsResponse {
    pub reports: Vec<Report>,
}

// ─── History ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySession {
    pub session_id: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Returned by `GET /api/history/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySessionsResponse {
    pub sessions: Vec<HistorySession>,
}

/// A message the workflow persisted for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Returned by `GET /api/history/messages/{session_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessagesResponse {
    pub messages: Vec<StoredMessage>,
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// Returned by `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_body_matches_server_schema() {
        let mut config = WorkflowConfig::default();
        config.llm_configs = Some(LlmConfigs::default());
        let body = serde_json::to_value(RunWorkflowRequest::new("  NVDA outlook ", config))
            .expect("serialize");

        assert_eq!(body["request"]["query"], "NVDA outlook");
        assert_eq!(body["config"]["budget"], "low");
        assert_eq!(body["config"]["stream_config"]["recursion_limit"], 150);
        assert_eq!(body["config"]["llm_configs"]["basic"]["provider"], "OPENAI");
        assert!(body["config"].get("team_members").is_none());
    }

    #[test]
    fn report_tolerates_sparse_metadata() {
        let report: Report = serde_json::from_str(
            r##"{"title":"AAPL deep dive","content":"# Summary","timestamp":"2025-05-01T10:00:00-04:00","metadata":{"query":"apple","tickers":[{"ticker":"AAPL","company_name":"Apple"}],"ticker_type":"company"},"session_id":"s-9","_id":"abc"}"##,
        )
        .expect("parse report");
        let tickers = report.metadata.tickers.as_ref().expect("tickers");
        assert_eq!(tickers[0].ticker, "AAPL");
        assert_eq!(tickers[0].extra["company_name"], "Apple");

        let bare: Report =
            serde_json::from_str(r#"{"session_id":"s-1","content":"x"}"#).expect("parse");
        assert_eq!(bare.metadata, ReportMetadata::default());
        assert_eq!(bare.title, None);
    }
}
