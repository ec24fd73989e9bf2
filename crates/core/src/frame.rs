//! Stream frames: the JSON payload of one server-sent event.

use crate::event::{AgentName, LogEvent};
use serde_json::Value;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server-side outcome of persisting the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSaveStatus {
    Saved,
    Error,
    NotGenerated,
    Other(String),
}

impl ReportSaveStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "saved" => Self::Saved,
            "error" => Self::Error,
            "not_generated" => Self::NotGenerated,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Saved => "saved",
            Self::Error => "error",
            Self::NotGenerated => "not_generated",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ReportSaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    /// One chunk failed server-side; the stream keeps going
    ChunkError,
    /// The server-side stream died
    StreamError,
    Other,
}

impl ServerErrorKind {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::ChunkError)
    }
}

/// One entry of a batch frame's `logs` array.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Event(LogEvent),
    /// The entry did not decode as a log event
    Malformed { raw: Value, error: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogBatch {
    pub session_id: Option<String>,
    pub logs: Vec<BatchEntry>,
    /// Agent the supervisor routes to next
    pub next: Option<AgentName>,
    /// Agent that produced the chunk
    pub last_agent: Option<AgentName>,
}

impl LogBatch {
    pub fn events(&self) -> impl Iterator<Item = &LogEvent> {
        self.logs.iter().filter_map(|entry| match entry {
            BatchEntry::Event(event) => Some(event),
            BatchEntry::Malformed { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    ConnectionEstablished {
        session_id: Option<String>,
        message: Option<String>,
    },
    Heartbeat,
    ReportStatus {
        session_id: Option<String>,
        status: ReportSaveStatus,
        error_message: Option<String>,
    },
    StreamComplete {
        session_id: Option<String>,
        report_status: ReportSaveStatus,
        message: Option<String>,
    },
    Batch(LogBatch),
    ServerError {
        session_id: Option<String>,
        kind: ServerErrorKind,
        error: String,
        details: Option<String>,
    },
    /// Valid JSON of an unexpected shape
    Unexpected(Value),
}

impl StreamFrame {
    /// Parse one `data:` payload. Only invalid JSON is an error; any
    /// well-formed payload maps to a frame, `Unexpected` as the last resort.
    pub fn parse(payload: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(payload)?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::Unexpected(value);
        };

        let str_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let agent_field = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .map(AgentName::parse)
        };
        let session_id = str_field("session_id");

        match obj.get("type").and_then(Value::as_str) {
            Some("connection_established") => {
                return Self::ConnectionEstablished {
                    session_id,
                    message: str_field("message"),
                };
            }
            Some("heartbeat") => return Self::Heartbeat,
            Some("report_status") => {
                return Self::ReportStatus {
                    session_id,
                    status: ReportSaveStatus::parse(&str_field("status").unwrap_or_default()),
                    error_message: str_field("error_message"),
                };
            }
            Some("stream_complete") => {
                return Self::StreamComplete {
                    session_id,
                    report_status: ReportSaveStatus::parse(
                        &str_field("report_status").unwrap_or_default(),
                    ),
                    message: str_field("message"),
                };
            }
            _ => {}
        }

        if let Some(logs) = obj.get("logs").and_then(Value::as_array) {
            let logs = logs
                .iter()
                .map(|raw| match serde_json::from_value::<LogEvent>(raw.clone()) {
                    Ok(event) => BatchEntry::Event(event),
                    Err(err) => BatchEntry::Malformed {
                        raw: raw.clone(),
                        error: err.to_string(),
                    },
                })
                .collect();
            return Self::Batch(LogBatch {
                session_id,
                logs,
                next: agent_field("next"),
                last_agent: agent_field("last_agent"),
            });
        }

        if obj.contains_key("error") {
            let kind = match obj.get("type").and_then(Value::as_str) {
                Some("chunk_error") => ServerErrorKind::ChunkError,
                Some("stream_error") => ServerErrorKind::StreamError,
                _ => ServerErrorKind::Other,
            };
            let error = match obj.get("error") {
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            return Self::ServerError {
                session_id,
                kind,
                error,
                details: str_field("details"),
            };
        }

        Self::Unexpected(value)
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::ConnectionEstablished { session_id, .. }
            | Self::ReportStatus { session_id, .. }
            | Self::StreamComplete { session_id, .. }
            | Self::ServerError { session_id, .. } => session_id.as_deref(),
            Self::Batch(batch) => batch.session_id.as_deref(),
            Self::Heartbeat | Self::Unexpected(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::Heartbeat => "heartbeat",
            Self::ReportStatus { .. } => "report_status",
            Self::StreamComplete { .. } => "stream_complete",
            Self::Batch(_) => "batch",
            Self::ServerError { .. } => "server_error",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
