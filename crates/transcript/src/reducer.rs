//! The streaming log-to-transcript reducer.

use crate::lexicon::{self, SupervisorSignal};
use crate::state::{PlanPhase, TranscriptState};
use crate::status::RunStatus;
use crate::view::{Entry, EntryId, TranscriptView};
use marketlens_core::{
    AgentName, AgentState, BatchEntry, Handoff, LogBatch, LogEvent, LogEventType,
    ReportSaveStatus, ServerErrorKind, StreamFrame,
};
use tracing::{debug, info, warn};

/// What the caller should do with the stream after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    /// The frame belonged to another session
    Ignored,
    /// The run reached a terminal frame; close the stream
    Finished,
}

/// Routing hints carried by the batch an event arrived in.
#[derive(Debug, Clone, Default)]
struct BatchContext {
    next: Option<AgentName>,
    last_agent: Option<AgentName>,
}

/// Applies log events and stream frames, in delivery order, to a view.
pub struct TranscriptReducer<V: TranscriptView> {
    view: V,
    state: TranscriptState,
}

impl<V: TranscriptView> TranscriptReducer<V> {
    pub fn new(view: V) -> Self {
        Self {
            view,
            state: TranscriptState::default(),
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }

    pub fn state(&self) -> &TranscriptState {
        &self.state
    }

    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    // ─── Run lifecycle ─────────────────────────────────────────────────────

    /// Drop the previous run entirely and start a new one.
    pub fn begin_run(&mut self, query: &str) {
        self.view.clear();
        self.state = TranscriptState::new_run(query);
        self.transition(RunStatus::Submitting);
        let id = self.view.append_entry(Entry::RunStarted {
            query: query.to_string(),
        });
        self.state
            .record(id, LogEventType::Unknown("run_started".to_string()), None);
    }

    /// Forget everything and go back to `Idle`.
    pub fn reset(&mut self) {
        self.view.clear();
        self.state = TranscriptState::default();
    }

    /// The submission was accepted and the stream is open.
    pub fn stream_opened(&mut self, session_id: &str) {
        self.state.session_id = Some(session_id.to_string());
        self.transition(RunStatus::Streaming);
    }

    /// Transport failure: submission rejected, connection dropped, or the
    /// stream ended early. Ignored once the run is terminal.
    pub fn connection_error(&mut self, message: &str) {
        if self.state.status.is_terminal() {
            debug!(
                status = %self.state.status,
                "ignoring transport error after run completed: {message}"
            );
            return;
        }
        warn!("run connection error: {message}");
        self.append(
            Entry::Error {
                text: message.to_string(),
            },
            LogEventType::Error,
            None,
        );
        self.transition(RunStatus::ConnectionError);
    }

    /// A `data:` payload that was not valid JSON. The stream continues.
    pub fn malformed_frame(&mut self, error: &str) {
        warn!("malformed stream frame: {error}");
        self.append(
            Entry::Error {
                text: format!("Error processing message: {error}"),
            },
            LogEventType::Error,
            None,
        );
    }

    pub fn toggle_container(&mut self, id: EntryId) {
        self.view.toggle_container(id);
    }

    // ─── Frames ────────────────────────────────────────────────────────────

    pub fn apply_frame(&mut self, frame: &StreamFrame) -> FrameOutcome {
        if let (Some(frame_sid), Some(run_sid)) = (frame.session_id(), &self.state.session_id)
            && frame_sid != run_sid.as_str()
        {
            warn!(
                frame = frame.kind(),
                frame_session = frame_sid,
                run_session = run_sid.as_str(),
                "ignoring frame for another session"
            );
            return FrameOutcome::Ignored;
        }
        self.mark_streaming();

        match frame {
            StreamFrame::ConnectionEstablished { session_id, .. } => {
                info!(session_id = session_id.as_deref(), "stream connection established");
                if self.state.session_id.is_none() {
                    self.state.session_id = session_id.clone();
                }
                FrameOutcome::Continue
            }
            StreamFrame::Heartbeat => FrameOutcome::Continue,
            StreamFrame::ReportStatus {
                status,
                error_message,
                ..
            } => {
                self.apply_report_status(status, error_message.as_deref());
                FrameOutcome::Continue
            }
            StreamFrame::StreamComplete { report_status, .. } => {
                self.apply_stream_complete(report_status);
                FrameOutcome::Finished
            }
            StreamFrame::Batch(batch) => {
                self.apply_batch(batch);
                FrameOutcome::Continue
            }
            StreamFrame::ServerError {
                kind,
                error,
                details,
                ..
            } => {
                let text = match details {
                    Some(details) if !details.is_empty() => format!("{error} ({details})"),
                    _ => error.clone(),
                };
                if kind.is_terminal() {
                    self.connection_error(&text);
                    FrameOutcome::Finished
                } else {
                    warn!("server chunk error: {text}");
                    self.append(Entry::Error { text }, LogEventType::Error, None);
                    FrameOutcome::Continue
                }
            }
            StreamFrame::Unexpected(raw) => {
                warn!("unexpected stream frame: {raw}");
                self.append(
                    Entry::Fallback {
                        label: "Unexpected data".to_string(),
                        raw: raw.to_string(),
                    },
                    LogEventType::Unknown("unexpected".to_string()),
                    None,
                );
                FrameOutcome::Continue
            }
        }
    }

    fn apply_batch(&mut self, batch: &LogBatch) {
        let ctx = BatchContext {
            next: batch.next.clone(),
            last_agent: batch.last_agent.clone(),
        };

        // Reporter completion makes a same-batch "preparing" status stale.
        let reporter_done = batch.events().any(|event| {
            event.event_type == LogEventType::AgentOutput
                && event.is_from(&AgentName::Reporter)
                && lexicon::is_report_saved_text(&event.content.display_text())
        });

        let mut headline = None;
        for entry in &batch.logs {
            match entry {
                BatchEntry::Event(event) => {
                    if reporter_done
                        && event.event_type == LogEventType::Status
                        && event.is_from(&AgentName::Reporter)
                        && event.content.contains_ci(lexicon::REPORTER_PREPARING)
                    {
                        debug!("dropping stale reporter status");
                        continue;
                    }
                    if event.event_type == LogEventType::Status {
                        headline = Some(event.content.display_text());
                    }
                    self.apply_event_with(event, &ctx);
                }
                BatchEntry::Malformed { raw, error } => self.apply_malformed(raw, error),
            }
        }

        if let Some(headline) = headline
            && !self.state.status.is_terminal()
        {
            self.state.headline = Some(headline);
        }
    }

    /// A batch entry that did not decode as a log event.
    pub fn apply_malformed(&mut self, raw: &serde_json::Value, error: &str) {
        warn!("malformed log entry: {error}");
        self.leave_pending_plan();
        self.append(
            Entry::Fallback {
                label: format!("Malformed log entry ({error})"),
                raw: raw.to_string(),
            },
            LogEventType::Unknown("malformed".to_string()),
            None,
        );
    }

    // ─── Events ────────────────────────────────────────────────────────────

    /// Apply one log event. Every event renders something except the
    /// control types, which only move run state.
    pub fn apply_event(&mut self, event: &LogEvent) {
        self.mark_streaming();
        self.apply_event_with(event, &BatchContext::default());
    }

    fn apply_event_with(&mut self, event: &LogEvent, ctx: &BatchContext) {
        let is_planner_output = event.event_type == LogEventType::AgentOutput
            && event.is_from(&AgentName::Planner);
        if event.event_type != LogEventType::PlanStep && !is_planner_output {
            self.leave_pending_plan();
        }

        match &event.event_type {
            LogEventType::Status => self.apply_status(event, ctx),
            LogEventType::AgentOutput => self.apply_agent_output(event),
            LogEventType::PlanStep => self.apply_plan_step(event),
            LogEventType::Error => {
                self.append(
                    Entry::Error {
                        text: event.content.display_text(),
                    },
                    LogEventType::Error,
                    event.agent.clone(),
                );
            }
            LogEventType::Separator => {
                self.append(Entry::Separator, LogEventType::Separator, None);
            }
            LogEventType::FinalReport => {
                self.retire_all_indicators();
                self.append(
                    Entry::FinalReport {
                        text: event.content.display_text(),
                    },
                    LogEventType::FinalReport,
                    event.agent.clone(),
                );
            }
            LogEventType::ConnectionEstablished => {
                debug!("connection_established event");
            }
            LogEventType::ReportStatus => {
                let status = ReportSaveStatus::parse(&event.content.display_text());
                self.apply_report_status(&status, None);
            }
            LogEventType::StreamComplete => {
                let status = ReportSaveStatus::parse(&event.content.display_text());
                self.apply_stream_complete(&status);
            }
            LogEventType::Unknown(raw_type) => {
                warn!(event_type = raw_type.as_str(), "unknown log event type");
                self.append(
                    Entry::Fallback {
                        label: format!("Unknown log type '{raw_type}'"),
                        raw: event.content.display_text(),
                    },
                    event.event_type.clone(),
                    event.agent.clone(),
                );
            }
        }
    }

    fn apply_status(&mut self, event: &LogEvent, ctx: &BatchContext) {
        let text = event.content.display_text();

        if let Some(handoff) = &event.handoff {
            let from = handoff.from.clone().or_else(|| ctx.last_agent.clone());
            self.assign(from, handoff.to.clone(), text);
            return;
        }
        match lexicon::supervisor_signal(&text) {
            Some(SupervisorSignal::Evaluating(agent)) => {
                self.retire_indicator(&agent);
                let id = self.append(
                    Entry::SupervisorNote {
                        text,
                        handoff: None,
                    },
                    LogEventType::Status,
                    Some(AgentName::Supervisor),
                );
                self.state.evaluating_notes.push(id);
                return;
            }
            Some(SupervisorSignal::Assigned(to)) => {
                match to.or_else(|| ctx.next.clone()) {
                    Some(to) => self.assign(ctx.last_agent.clone(), to, text),
                    None => {
                        self.append(
                            Entry::SupervisorNote {
                                text,
                                handoff: None,
                            },
                            LogEventType::Status,
                            Some(AgentName::Supervisor),
                        );
                    }
                }
                return;
            }
            None => {}
        }

        let is_processing = match event.agent_state {
            Some(AgentState::Processing) => true,
            Some(AgentState::Done) => false,
            Some(AgentState::Unknown) | None => lexicon::is_processing_text(&text),
        };

        match (&event.agent, is_processing) {
            (Some(agent), true) => {
                self.retire_indicator(agent);
                let id = self.append(
                    Entry::Processing {
                        agent: agent.clone(),
                        text,
                    },
                    LogEventType::Status,
                    Some(agent.clone()),
                );
                self.state.indicators.insert(agent.clone(), id);
            }
            (agent, _) => {
                if let (Some(agent), Some(AgentState::Done)) = (agent, event.agent_state) {
                    self.retire_indicator(agent);
                }
                self.append(
                    Entry::StatusNote {
                        agent: agent.clone(),
                        text,
                    },
                    LogEventType::Status,
                    agent.clone(),
                );
            }
        }
    }

    /// `from` falls back to the last hand-off target when the frame names
    /// no previous agent.
    fn assign(&mut self, from: Option<AgentName>, to: AgentName, text: String) {
        let from = from.or_else(|| self.state.active_agent.clone());
        for id in std::mem::take(&mut self.state.evaluating_notes) {
            self.view.retire_entry(id);
        }
        if let Some(from) = &from
            && *from != to
        {
            self.retire_indicator(from);
        }
        debug!(
            from = from.as_ref().map(AgentName::as_str),
            to = to.as_str(),
            "supervisor hand-off"
        );
        self.state.active_agent = Some(to.clone());
        self.append(
            Entry::SupervisorNote {
                text,
                handoff: Some(Handoff { from, to }),
            },
            LogEventType::Status,
            Some(AgentName::Supervisor),
        );
    }

    fn apply_agent_output(&mut self, event: &LogEvent) {
        let text = event.content.display_text();
        if let Some(agent) = &event.agent {
            self.retire_indicator(agent);
        }
        let id = self.append(
            Entry::AgentOutput {
                agent: event.agent.clone(),
                text: text.clone(),
            },
            LogEventType::AgentOutput,
            event.agent.clone(),
        );

        match &event.agent {
            Some(AgentName::Planner) => {
                self.state.plan = PlanPhase::PendingPlannerOutput(id);
                if let Some(title) = lexicon::plan_title(&text) {
                    self.state.plan_title = Some(title);
                }
            }
            Some(AgentName::Reporter) => {
                self.state.latest_reporter_output = Some(id);
                self.adopt_report_action(id);
                if lexicon::is_report_saved_text(&text) {
                    self.mark_report_ready();
                }
            }
            _ => {}
        }
    }

    fn apply_plan_step(&mut self, event: &LogEvent) {
        let Some(step) = event.content.plan_step() else {
            warn!("plan step without structured content");
            self.leave_pending_plan();
            self.append(
                Entry::Fallback {
                    label: "Unreadable plan step".to_string(),
                    raw: event.content.display_text(),
                },
                LogEventType::PlanStep,
                event.agent.clone(),
            );
            return;
        };
        let agent = step.agent_name().or_else(|| event.agent.clone());

        match self.state.plan {
            PlanPhase::PendingPlannerOutput(output) => {
                let container = self.view.append_child(output, Entry::plan_steps_container());
                self.state.record(container, LogEventType::PlanStep, None);
                let id = self.view.append_child(
                    container,
                    Entry::PlanStep {
                        step,
                        standalone: false,
                    },
                );
                self.state.record(id, LogEventType::PlanStep, agent);
                self.state.plan = PlanPhase::StepsContainerOpen {
                    container,
                    steps: 1,
                };
            }
            PlanPhase::StepsContainerOpen { container, steps } => {
                let id = self.view.append_child(
                    container,
                    Entry::PlanStep {
                        step,
                        standalone: false,
                    },
                );
                self.state.record(id, LogEventType::PlanStep, agent);
                self.state.plan = PlanPhase::StepsContainerOpen {
                    container,
                    steps: steps + 1,
                };
            }
            PlanPhase::NoPendingPlan => {
                self.append(
                    Entry::PlanStep {
                        step,
                        standalone: true,
                    },
                    LogEventType::PlanStep,
                    agent,
                );
            }
        }
    }

    // ─── Report readiness ──────────────────────────────────────────────────

    fn apply_report_status(&mut self, status: &ReportSaveStatus, error_message: Option<&str>) {
        match status {
            ReportSaveStatus::Saved => self.mark_report_ready(),
            ReportSaveStatus::Error => {
                if self.state.status.is_terminal() {
                    debug!(status = %self.state.status, "ignoring report error after run completed");
                    return;
                }
                let message = error_message.unwrap_or("unknown error");
                self.append(
                    Entry::Error {
                        text: format!("Failed to save report: {message}"),
                    },
                    LogEventType::ReportStatus,
                    Some(AgentName::Reporter),
                );
                self.transition(RunStatus::ReportFailed);
            }
            ReportSaveStatus::NotGenerated | ReportSaveStatus::Other(_) => {
                debug!(status = status.as_str(), "report status without effect");
            }
        }
    }

    fn apply_stream_complete(&mut self, status: &ReportSaveStatus) {
        info!(report_status = status.as_str(), "stream complete");
        match status {
            ReportSaveStatus::Saved => self.mark_report_ready(),
            ReportSaveStatus::Error => self.transition(RunStatus::ReportFailed),
            ReportSaveStatus::NotGenerated => self.transition(RunStatus::CompletedNoReport),
            ReportSaveStatus::Other(raw) => {
                warn!(report_status = raw.as_str(), "unknown report status at completion");
                self.transition(RunStatus::CompletedNoReport);
            }
        }
    }

    /// Idempotent: at most one view-report action per run.
    fn mark_report_ready(&mut self) {
        if self.state.status.is_terminal() && self.state.status != RunStatus::ReportReady {
            debug!(status = %self.state.status, "ignoring report-ready after run completed");
            return;
        }
        self.retire_indicator(&AgentName::Reporter);
        self.state.report_ready = true;
        if self.state.report_action.is_none() {
            let entry = Entry::ReportAction {
                session_id: self.state.session_id.clone(),
            };
            let id = match self.state.latest_reporter_output {
                Some(output) => self.view.append_child(output, entry),
                None => {
                    self.state.report_action_top_level = true;
                    self.view.append_entry(entry)
                }
            };
            self.state
                .record(id, LogEventType::ReportStatus, Some(AgentName::Reporter));
            self.state.report_action = Some(id);
        }
        if self.state.status != RunStatus::ReportReady {
            self.transition(RunStatus::ReportReady);
        }
    }

    /// An action placed at top level before any reporter output moves under
    /// the first reporter output that arrives. Still exactly one action.
    fn adopt_report_action(&mut self, output: EntryId) {
        let Some(action) = self.state.report_action else {
            return;
        };
        if !self.state.report_action_top_level {
            return;
        }
        self.view.retire_entry(action);
        let id = self.view.append_child(
            output,
            Entry::ReportAction {
                session_id: self.state.session_id.clone(),
            },
        );
        self.state
            .record(id, LogEventType::ReportStatus, Some(AgentName::Reporter));
        self.state.report_action = Some(id);
        self.state.report_action_top_level = false;
        debug!(from = %action, to = %id, "report action moved under reporter output");
    }

    // ─── Helpers ───────────────────────────────────────────────────────────

    fn append(&mut self, entry: Entry, source: LogEventType, agent: Option<AgentName>) -> EntryId {
        let id = self.view.append_entry(entry);
        self.state.record(id, source, agent);
        id
    }

    fn retire_indicator(&mut self, agent: &AgentName) {
        if let Some(id) = self.state.indicators.remove(agent) {
            debug!(agent = agent.as_str(), entry = %id, "retiring processing indicator");
            self.view.retire_entry(id);
        }
    }

    fn retire_all_indicators(&mut self) {
        for (_, id) in std::mem::take(&mut self.state.indicators) {
            self.view.retire_entry(id);
        }
    }

    fn leave_pending_plan(&mut self) {
        if matches!(self.state.plan, PlanPhase::PendingPlannerOutput(_)) {
            self.state.plan = PlanPhase::NoPendingPlan;
        }
    }

    fn mark_streaming(&mut self) {
        if self.state.status == RunStatus::Submitting {
            self.transition(RunStatus::Streaming);
        }
    }

    fn transition(&mut self, next: RunStatus) {
        let current = self.state.status;
        if current == next {
            return;
        }
        if current.can_transition_to(next) {
            debug!(from = %current, to = %next, "run status");
            self.state.status = next;
        } else {
            warn!(from = %current, to = %next, "ignoring invalid run status transition");
        }
    }
}
