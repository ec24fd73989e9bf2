use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single log event pushed by the research workflow.
///
/// Events arrive in batches over the event stream and must be applied in
/// arrival order. Unknown `type` strings and unknown agent names are kept as
/// values so a consumer can still render something for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub event_type: LogEventType,
    /// Originating agent, if the server attributed one
    #[serde(
        default,
        deserialize_with = "blank_agent_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub agent: Option<AgentName>,
    /// Free text, or a structured object (plan steps)
    #[serde(default)]
    pub content: LogContent,
    /// Explicit working/finished marker; overrides content sniffing when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_state: Option<AgentState>,
    /// Explicit supervisor hand-off; overrides content sniffing when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<Handoff>,
}

impl LogEvent {
    pub fn new(event_type: LogEventType, agent: Option<AgentName>, content: LogContent) -> Self {
        Self {
            event_type,
            agent,
            content,
            agent_state: None,
            handoff: None,
        }
    }

    pub fn status(agent: Option<AgentName>, text: impl Into<String>) -> Self {
        Self::new(LogEventType::Status, agent, LogContent::text(text))
    }

    pub fn agent_output(agent: AgentName, text: impl Into<String>) -> Self {
        Self::new(LogEventType::AgentOutput, Some(agent), LogContent::text(text))
    }

    pub fn plan_step(step: &PlanStep) -> Self {
        let agent = step.agent_name();
        let content = serde_json::to_value(step)
            .map(LogContent::Structured)
            .unwrap_or_default();
        Self::new(LogEventType::PlanStep, agent, content)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(LogEventType::Error, None, LogContent::text(text))
    }

    pub fn with_agent_state(mut self, state: AgentState) -> Self {
        self.agent_state = Some(state);
        self
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn is_from(&self, agent: &AgentName) -> bool {
        self.agent.as_ref() == Some(agent)
    }
}

fn blank_agent_as_none<'de, D>(deserializer: D) -> Result<Option<AgentName>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|name| !name.trim().is_empty())
        .map(AgentName::from))
}

/// Log event kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogEventType {
    Status,
    AgentOutput,
    PlanStep,
    Error,
    Separator,
    FinalReport,
    ConnectionEstablished,
    StreamComplete,
    ReportStatus,
    /// Any type this client does not know; kept for fallback rendering
    Unknown(String),
}

impl LogEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::AgentOutput => "agent_output",
            Self::PlanStep => "plan_step",
            Self::Error => "error",
            Self::Separator => "separator",
            Self::FinalReport => "final_report",
            Self::ConnectionEstablished => "connection_established",
            Self::StreamComplete => "stream_complete",
            Self::ReportStatus => "report_status",
            Self::Unknown(raw) => raw,
        }
    }

    /// Control events change run state but render nothing themselves.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Self::ConnectionEstablished | Self::StreamComplete | Self::ReportStatus
        )
    }
}

impl From<String> for LogEventType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "status" => Self::Status,
            "agent_output" => Self::AgentOutput,
            "plan_step" => Self::PlanStep,
            "error" => Self::Error,
            "separator" => Self::Separator,
            "final_report" => Self::FinalReport,
            "connection_established" => Self::ConnectionEstablished,
            "stream_complete" => Self::StreamComplete,
            "report_status" => Self::ReportStatus,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<LogEventType> for String {
    fn from(value: LogEventType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LogEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named worker in the research workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentName {
    Planner,
    Supervisor,
    Researcher,
    Coder,
    Market,
    Browser,
    Analyst,
    Reporter,
    Coordinator,
    Other(String),
}

impl AgentName {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "planner" => Self::Planner,
            "supervisor" => Self::Supervisor,
            "researcher" => Self::Researcher,
            "coder" => Self::Coder,
            "market" => Self::Market,
            "browser" => Self::Browser,
            "analyst" => Self::Analyst,
            "reporter" => Self::Reporter,
            "coordinator" => Self::Coordinator,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Planner => "planner",
            Self::Supervisor => "supervisor",
            Self::Researcher => "researcher",
            Self::Coder => "coder",
            Self::Market => "market",
            Self::Browser => "browser",
            Self::Analyst => "analyst",
            Self::Reporter => "reporter",
            Self::Coordinator => "coordinator",
            Self::Other(raw) => raw,
        }
    }

    /// Capitalized name for headers, e.g. `Planner`.
    pub fn display_name(&self) -> String {
        let raw = self.as_str();
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl From<String> for AgentName {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for AgentName {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<AgentName> for String {
    fn from(value: AgentName) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured working/finished marker supplied by newer servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Processing,
    Done,
    #[serde(other)]
    Unknown,
}

/// Supervisor hand-off from one agent to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<AgentName>,
    pub to: AgentName,
}

/// Event payload: plain text or a structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogContent {
    Text(String),
    Structured(serde_json::Value),
}

impl Default for LogContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl LogContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Text as-is; structured payloads as compact JSON.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(serde_json::Value::String(text)) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }

    /// Case-insensitive substring test against the text form.
    pub fn contains_ci(&self, needle: &str) -> bool {
        self.display_text()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    /// Interpret an object payload as a plan step.
    pub fn plan_step(&self) -> Option<PlanStep> {
        match self {
            Self::Structured(value @ serde_json::Value::Object(_)) => {
                serde_json::from_value(value.clone()).ok()
            }
            _ => None,
        }
    }
}

/// One task item emitted by the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(rename = "Task", default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Note", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "Agent", default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl PlanStep {
    pub fn agent_name(&self) -> Option<AgentName> {
        self.agent
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(AgentName::parse)
    }

    pub fn task_or_na(&self) -> &str {
        self.task.as_deref().unwrap_or("N/A")
    }

    pub fn description_or_na(&self) -> &str {
        self.description.as_deref().unwrap_or("N/A")
    }
}
