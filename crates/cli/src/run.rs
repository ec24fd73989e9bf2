//! One research run at a time: submit, stream, reduce.

use anyhow::{Result, bail};
use futures_util::StreamExt;
use marketlens_api::{RunWorkflowRequest, WorkflowConfig};
use marketlens_api_client::{ApiClient, FrameStream, StreamError, SubmittedRun};
use marketlens_core::{Budget, LogEvent, StreamFrame};
use marketlens_transcript::{FrameOutcome, RunStatus, TranscriptReducer, TranscriptView};
use tracing::{info, warn};

use crate::config::{api_client, load_config, workflow_config};
use crate::console::ConsoleView;

/// Owns the reducer and at most one open event stream.
pub struct RunController<V: TranscriptView> {
    api: ApiClient,
    handle: RunHandle<V>,
}

/// The active run: the sole ingress for its events.
pub struct RunHandle<V: TranscriptView> {
    reducer: TranscriptReducer<V>,
    stream: Option<FrameStream>,
    run: Option<SubmittedRun>,
}

impl<V: TranscriptView> RunController<V> {
    pub fn new(api: ApiClient, view: V) -> Self {
        Self {
            api,
            handle: RunHandle {
                reducer: TranscriptReducer::new(view),
                stream: None,
                run: None,
            },
        }
    }

    pub fn handle(&self) -> &RunHandle<V> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut RunHandle<V> {
        &mut self.handle
    }

    /// Close any active run, reset the transcript, submit `query` and open
    /// its event stream. Failures are recorded on the handle as a
    /// connection error rather than returned.
    pub async fn submit_query(&mut self, query: &str, config: WorkflowConfig) -> &mut RunHandle<V> {
        self.handle.close();
        self.handle.run = None;
        self.handle.reducer.begin_run(query);

        let request = RunWorkflowRequest::new(query, config);
        let run = match self.api.submit_query(&request).await {
            Ok(run) => run,
            Err(err) => {
                self.handle
                    .reducer
                    .connection_error(&format!("Failed to submit query: {err:#}"));
                return &mut self.handle;
            }
        };

        self.handle.reducer.stream_opened(&run.session_id);
        match self.api.open_stream(&run.stream_url).await {
            Ok(stream) => {
                info!(session_id = run.session_id.as_str(), "event stream open");
                self.handle.stream = Some(stream);
            }
            Err(err) => {
                self.handle
                    .reducer
                    .connection_error(&format!("Failed to open event stream: {err:#}"));
            }
        }
        self.handle.run = Some(run);
        &mut self.handle
    }
}

impl<V: TranscriptView> RunHandle<V> {
    pub fn reducer(&self) -> &TranscriptReducer<V> {
        &self.reducer
    }

    pub fn view(&self) -> &V {
        self.reducer.view()
    }

    pub fn status(&self) -> RunStatus {
        self.reducer.status()
    }

    pub fn run(&self) -> Option<&SubmittedRun> {
        self.run.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.reducer.state().session_id.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Dropping the stream closes the HTTP connection.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            info!("event stream closed");
        }
    }

    pub fn on_event(&mut self, event: &LogEvent) {
        self.reducer.apply_event(event);
    }

    pub fn on_frame(&mut self, frame: &StreamFrame) -> FrameOutcome {
        let outcome = self.reducer.apply_frame(frame);
        if outcome == FrameOutcome::Finished {
            self.close();
        }
        outcome
    }

    /// Consume the stream until a terminal frame or the end of transport.
    pub async fn drive(&mut self) -> RunStatus {
        while let Some(stream) = self.stream.as_mut() {
            match stream.next().await {
                Some(Ok(frame)) => {
                    self.on_frame(&frame);
                }
                Some(Err(StreamError::Malformed { source, .. })) => {
                    self.reducer.malformed_frame(&source.to_string());
                }
                Some(Err(err)) => {
                    warn!("event stream failed: {err}");
                    self.reducer.connection_error(&format!("Connection lost: {err}"));
                    self.close();
                }
                None => {
                    self.reducer
                        .connection_error("Event stream ended before the analysis completed");
                    self.close();
                }
            }
        }
        self.status()
    }
}

/// `marketlens run`: stream a run live to stderr, then print the settled
/// transcript to stdout.
pub async fn run_query(
    query: &str,
    budget: Option<Budget>,
    expand_plans: bool,
    quiet: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let config = load_config()?;
    let api = api_client(&config)?;
    let workflow = workflow_config(&config, budget);
    let expand = expand_plans || config.display.expand_plan_steps;

    let mut controller = RunController::new(api, ConsoleView::new(std::io::stderr(), !quiet));
    let status = controller.submit_query(query, workflow).await.drive().await;

    let handle = controller.handle();
    if !quiet {
        eprintln!();
    }
    print!("{}", handle.view().tree().render_plain(expand));
    println!();
    println!("Status: {}", status.describe());
    if let Some(session_id) = handle.session_id() {
        println!("Session: {session_id}");
    }
    if status.is_failure() {
        bail!("run did not complete: {}", status.describe());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketlens_core::testing;
    use marketlens_core::{AgentName, ReportSaveStatus};
    use marketlens_transcript::TranscriptTree;
    use std::time::Duration;

    fn unreachable_controller() -> RunController<TranscriptTree> {
        // port 9 (discard) is closed on test machines; connects fail fast
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client");
        RunController::new(api, TranscriptTree::new())
    }

    #[tokio::test]
    async fn failed_submission_is_a_connection_error() {
        let mut controller = unreachable_controller();
        let handle = controller
            .submit_query("NVDA", WorkflowConfig::default())
            .await;
        assert_eq!(handle.status(), RunStatus::ConnectionError);
        assert!(!handle.is_open());
        assert_eq!(handle.view().count("error"), 1);
        assert_eq!(handle.drive().await, RunStatus::ConnectionError);
    }

    #[tokio::test]
    async fn resubmitting_resets_the_previous_run() {
        let mut controller = unreachable_controller();
        let handle = controller.handle_mut();
        handle.reducer.begin_run("first");
        handle.reducer.stream_opened("s-1");
        handle.on_event(&testing::status(AgentName::Coder, "Coder is coding"));
        handle.on_event(&testing::report_saved_output());
        assert_eq!(handle.status(), RunStatus::ReportReady);
        assert_eq!(handle.view().count("processing"), 1);
        assert_eq!(handle.view().count("report_action"), 1);

        let handle = controller.submit_query("second", WorkflowConfig::default()).await;
        let roots = handle.view().roots();
        assert!(matches!(
            &roots[0].entry,
            marketlens_transcript::Entry::RunStarted { query } if query == "second"
        ));
        assert_eq!(handle.view().count("processing"), 0);
        assert_eq!(handle.view().count("report_action"), 0);
        assert!(handle.run().is_none());
    }

    #[test]
    fn terminal_frame_closes_the_handle() {
        let mut controller = unreachable_controller();
        let handle = controller.handle_mut();
        handle.reducer.begin_run("q");
        handle.reducer.stream_opened("s-1");
        let outcome = handle.on_frame(&testing::stream_complete("s-1", ReportSaveStatus::Saved));
        assert_eq!(outcome, FrameOutcome::Finished);
        assert!(!handle.is_open());
        assert_eq!(handle.status(), RunStatus::ReportReady);
    }
}
