use crate::status::RunStatus;
use crate::view::EntryId;
use marketlens_core::{AgentName, LogEventType};
use std::collections::BTreeMap;

/// Where plan steps currently go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanPhase {
    /// Steps render standalone
    #[default]
    NoPendingPlan,
    /// A planner output just landed; the next step opens a container under it
    PendingPlannerOutput(EntryId),
    /// Steps append here until the next planner output
    StepsContainerOpen { container: EntryId, steps: usize },
}

/// Record of one entry the reducer appended, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEntry {
    pub id: EntryId,
    pub source: LogEventType,
    pub agent: Option<AgentName>,
}

/// Everything the reducer remembers about the current run.
///
/// Created empty by each submission and dropped by the next one.
#[derive(Debug, Clone, Default)]
pub struct TranscriptState {
    pub session_id: Option<String>,
    pub query: Option<String>,
    pub status: RunStatus,
    pub entries: Vec<RenderedEntry>,
    /// At most one standing indicator per agent
    pub indicators: BTreeMap<AgentName, EntryId>,
    pub plan: PlanPhase,
    /// Supervisor "evaluating" notes, retired by the next assignment
    pub evaluating_notes: Vec<EntryId>,
    pub latest_reporter_output: Option<EntryId>,
    pub report_action: Option<EntryId>,
    /// The action was placed before any reporter output existed
    pub report_action_top_level: bool,
    pub report_ready: bool,
    /// Last hand-off target
    pub active_agent: Option<AgentName>,
    pub plan_title: Option<String>,
    /// Latest status text, for a one-line progress display
    pub headline: Option<String>,
}

impl TranscriptState {
    pub fn new_run(query: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            ..Self::default()
        }
    }

    pub fn record(&mut self, id: EntryId, source: LogEventType, agent: Option<AgentName>) {
        self.entries.push(RenderedEntry { id, source, agent });
    }

    pub fn indicator_for(&self, agent: &AgentName) -> Option<EntryId> {
        self.indicators.get(agent).copied()
    }

    /// Steps nested in the open container, if any.
    pub fn open_container(&self) -> Option<EntryId> {
        match self.plan {
            PlanPhase::StepsContainerOpen { container, .. } => Some(container),
            _ => None,
        }
    }
}
