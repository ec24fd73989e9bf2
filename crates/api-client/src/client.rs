use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_LOCATION};
use tracing::{debug, info};

use crate::sse::{FrameStream, frame_stream};
use marketlens_api::*;

/// Typed HTTP client for the research service.
///
/// REST calls share one `reqwest::Client` with a total timeout. The event
/// stream uses a second client with only a connect timeout, since a run can
/// legitimately stream for many minutes.
pub struct ApiClient {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    base_url: String,
}

/// An accepted submission and where to read its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRun {
    pub run_id: String,
    pub session_id: String,
    pub status: String,
    pub stream_url: String,
}

impl ApiClient {
    /// Create a new client with the given base URL and REST timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            stream_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Resolve a `Content-Location` value against the base URL.
    fn resolve(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if location.starts_with('/') {
            format!("{}{}", self.base_url, location)
        } else {
            format!("{}/{}", self.base_url, location)
        }
    }

    // ── Health ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.client.get(self.url("/health")).send().await?;
        parse_response(resp).await
    }

    // ── Workflow ──────────────────────────────────────────────────────────

    /// Submit a research query. The stream URL comes from the
    /// `Content-Location` header, falling back to the run-id route.
    pub async fn submit_query(&self, req: &RunWorkflowRequest) -> Result<SubmittedRun> {
        let resp = self
            .client
            .post(self.url("/run-workflow"))
            .json(req)
            .send()
            .await
            .context("failed to submit query")?;

        let location = resp
            .headers()
            .get(CONTENT_LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body: RunWorkflowResponse = parse_response(resp).await?;

        let stream_url = match location {
            Some(location) => self.resolve(&location),
            None => {
                debug!("submission response had no Content-Location header");
                self.url(&format!(
                    "/run-workflow/stream/{}",
                    urlencoding::encode(&body.run_id)
                ))
            }
        };
        info!(
            run_id = body.run_id.as_str(),
            session_id = body.session_id.as_str(),
            "query accepted"
        );
        Ok(SubmittedRun {
            run_id: body.run_id,
            session_id: body.session_id,
            status: body.status,
            stream_url,
        })
    }

    /// Open the event stream for a submitted run. Dropping the returned
    /// stream closes the connection.
    pub async fn open_stream(&self, stream_url: &str) -> Result<FrameStream> {
        let resp = self
            .stream_client
            .get(stream_url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .with_context(|| format!("failed to open event stream {stream_url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{status}: {body}");
        }
        Ok(frame_stream(resp.bytes_stream()))
    }

    // ── Reports ───────────────────────────────────────────────────────────

    /// Fetch the saved report of a session. `Ok(None)` when none exists.
    pub async fn get_report(&self, session_id: &str) -> Result<Option<Report>> {
        let url = self.url(&format!(
            "/history/report/{}",
            urlencoding::encode(session_id)
        ));
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response(resp).await.map(Some)
    }

    pub async fn recent_reports(&self, limit: usize) -> Result<Vec<Report>> {
        let url = self.url(&format!("/recent-reports?limit={limit}"));
        let resp = self.client.get(&url).send().await?;
        let body: RecentReportsResponse = parse_response(resp).await?;
        Ok(body.reports)
    }

    pub async fn session_reports(&self, session_id: &str) -> Result<Vec<Report>> {
        let url = self.url(&format!(
            "/history/reports/{}",
            urlencoding::encode(session_id)
        ));
        let resp = self.client.get(&url).send().await?;
        let body: SessionReportsResponse = parse_response(resp).await?;
        Ok(body.reports)
    }

    // ── History ───────────────────────────────────────────────────────────

    pub async fn history_sessions(&self) -> Result<Vec<HistorySession>> {
        let resp = self.client.get(self.url("/history/sessions")).send().await?;
        let body: HistorySessionsResponse = parse_response(resp).await?;
        Ok(body.sessions)
    }

    pub async fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let url = self.url(&format!(
            "/history/messages/{}",
            urlencoding::encode(session_id)
        ));
        let resp = self.client.get(&url).send().await?;
        let body: SessionMessagesResponse = parse_response(resp).await?;
        Ok(body.messages)
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{status}: {body}");
    }
    Ok(resp.json().await?)
}
