use marketlens_core::{AgentName, Handoff, PlanStep};
use std::fmt;

pub const PLAN_STEPS_HEADING: &str = "Plan Steps";
pub const PLAN_STEPS_NOTE: &str = "Planner handed off the following plan to the supervisor:";

/// Handle to an entry appended to a view. Ids are never reused within a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One rendered transcript item.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    RunStarted {
        query: String,
    },
    /// Transient "agent is working" marker
    Processing {
        agent: AgentName,
        text: String,
    },
    StatusNote {
        agent: Option<AgentName>,
        text: String,
    },
    SupervisorNote {
        text: String,
        handoff: Option<Handoff>,
    },
    AgentOutput {
        agent: Option<AgentName>,
        text: String,
    },
    /// Collapsible container for the steps of one plan
    PlanSteps {
        heading: String,
        note: String,
    },
    PlanStep {
        step: PlanStep,
        /// Rendered without a planner output to nest under
        standalone: bool,
    },
    ReportAction {
        session_id: Option<String>,
    },
    Error {
        text: String,
    },
    Separator,
    FinalReport {
        text: String,
    },
    /// Anything the reducer could not interpret
    Fallback {
        label: String,
        raw: String,
    },
}

impl Entry {
    pub fn plan_steps_container() -> Self {
        Self::PlanSteps {
            heading: PLAN_STEPS_HEADING.to_string(),
            note: PLAN_STEPS_NOTE.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::Processing { .. } => "processing",
            Self::StatusNote { .. } => "status",
            Self::SupervisorNote { .. } => "supervisor",
            Self::AgentOutput { .. } => "agent_output",
            Self::PlanSteps { .. } => "plan_steps",
            Self::PlanStep { .. } => "plan_step",
            Self::ReportAction { .. } => "report_action",
            Self::Error { .. } => "error",
            Self::Separator => "separator",
            Self::FinalReport { .. } => "final_report",
            Self::Fallback { .. } => "fallback",
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::PlanSteps { .. })
    }
}

fn agent_label(agent: Option<&AgentName>) -> String {
    agent
        .map(AgentName::display_name)
        .unwrap_or_else(|| "Agent".to_string())
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { query } => write!(f, "> {query}"),
            Self::Processing { agent, text } => {
                write!(f, "[{}] ... {text}", agent.display_name())
            }
            Self::StatusNote { text, .. } => write!(f, "  · {text}"),
            Self::SupervisorNote { text, .. } => write!(f, "[Supervisor] {text}"),
            Self::AgentOutput { agent, text } => {
                write!(f, "[{}] {text}", agent_label(agent.as_ref()))
            }
            Self::PlanSteps { heading, note } => write!(f, "{heading}: {note}"),
            Self::PlanStep { step, standalone } => {
                let owner = step
                    .agent_name()
                    .map(|a| a.display_name())
                    .unwrap_or_else(|| "N/A".to_string());
                if *standalone {
                    write!(f, "[Plan step] ")?;
                }
                write!(
                    f,
                    "{} ({owner}): {}",
                    step.task_or_na(),
                    step.description_or_na()
                )?;
                match (&step.note, standalone) {
                    (Some(note), false) if !note.trim().is_empty() => write!(f, " Note: {note}"),
                    (note, true) => write!(f, " Note: {}", note.as_deref().unwrap_or("N/A")),
                    _ => Ok(()),
                }
            }
            Self::ReportAction { session_id } => match session_id {
                Some(id) => write!(f, "=> View full report: marketlens report {id}"),
                None => write!(f, "=> View full report"),
            },
            Self::Error { text } => write!(f, "Error: {text}"),
            Self::Separator => write!(f, "{}", "-".repeat(40)),
            Self::FinalReport { text } => write!(f, "[Final report]\n{text}"),
            Self::Fallback { label, raw } if raw.is_empty() => write!(f, "{label}"),
            Self::Fallback { label, raw } => write!(f, "{label}: {raw}"),
        }
    }
}

/// Rendering port driven by the reducer.
///
/// Implementations decide how entries look; the reducer only decides which
/// entries exist, where they nest, and when they retire.
pub trait TranscriptView {
    fn append_entry(&mut self, entry: Entry) -> EntryId;

    /// Append under `parent`. Unknown parents fall back to a top-level append.
    fn append_child(&mut self, parent: EntryId, entry: Entry) -> EntryId;

    /// Remove an entry from display. Retiring twice is a no-op.
    fn retire_entry(&mut self, id: EntryId);

    fn toggle_container(&mut self, id: EntryId);

    fn clear(&mut self);
}
