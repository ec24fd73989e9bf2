//! Builders for log events and frames, shared by tests across the workspace.

use crate::{AgentName, LogBatch, LogEvent, PlanStep, ReportSaveStatus, StreamFrame};

pub fn status(agent: AgentName, text: &str) -> LogEvent {
    LogEvent::status(Some(agent), text)
}

pub fn output(agent: AgentName, text: &str) -> LogEvent {
    LogEvent::agent_output(agent, text)
}

/// Plan step assigned to `agent` with a task and description.
pub fn step(agent: &str, task: &str) -> LogEvent {
    LogEvent::plan_step(&PlanStep {
        task: Some(task.to_string()),
        description: Some(format!("{task} (details)")),
        note: None,
        agent: Some(agent.to_string()),
    })
}

/// Reporter output carrying the legacy completion phrase.
pub fn report_saved_output() -> LogEvent {
    output(
        AgentName::Reporter,
        "Reporter agent has finished and the report has been saved.",
    )
}

pub fn batch(session_id: &str, logs: Vec<LogEvent>) -> StreamFrame {
    StreamFrame::Batch(LogBatch {
        session_id: Some(session_id.to_string()),
        logs: logs.into_iter().map(crate::BatchEntry::Event).collect(),
        next: None,
        last_agent: None,
    })
}

pub fn report_status(session_id: &str, status: ReportSaveStatus) -> StreamFrame {
    StreamFrame::ReportStatus {
        session_id: Some(session_id.to_string()),
        status,
        error_message: None,
    }
}

pub fn stream_complete(session_id: &str, report_status: ReportSaveStatus) -> StreamFrame {
    StreamFrame::StreamComplete {
        session_id: Some(session_id.to_string()),
        report_status,
        message: Some("Analysis stream complete.".to_string()),
    }
}
