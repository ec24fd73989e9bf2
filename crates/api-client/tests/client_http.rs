use std::time::Duration;

use futures_util::StreamExt;
use marketlens_api::{RunWorkflowRequest, WorkflowConfig};
use marketlens_api_client::{ApiClient, StreamError};
use marketlens_core::{ReportSaveStatus, StreamFrame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct Canned {
    status: &'static str,
    headers: Vec<(&'static str, String)>,
    body: String,
}

fn json(status: &'static str, body: serde_json::Value) -> Canned {
    Canned {
        status,
        headers: vec![("Content-Type", "application/json".to_string())],
        body: body.to_string(),
    }
}

/// Serve canned responses keyed by request path, one connection at a time.
async fn serve(routes: Vec<(&'static str, Canned)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let request = String::from_utf8_lossy(&buf).to_string();
            let path = request
                .split_whitespace()
                .nth(1)
                .unwrap_or("/")
                .to_string();

            let canned = routes
                .iter()
                .find(|(route, _)| *route == path)
                .map(|(_, canned)| canned);
            let response = match canned {
                Some(canned) => {
                    let mut head = format!(
                        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                        canned.status,
                        canned.body.len()
                    );
                    for (name, value) in &canned.headers {
                        head.push_str(&format!("{name}: {value}\r\n"));
                    }
                    format!("{head}\r\n{}", canned.body)
                }
                None => "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found"
                    .to_string(),
            };
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}")
}

fn client(base: &str) -> ApiClient {
    ApiClient::new(base, Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn submit_then_stream_frames() {
    let stream_body = [
        r#"data: {"type":"connection_established","message":"Connected","session_id":"s-1"}"#,
        r#"data: {"logs":[{"type":"status","agent":"planner","content":"Planner is thinking"}],"next":"planner"}"#,
        "data: {broken",
        r#"data: {"type":"stream_complete","message":"done","session_id":"s-1","report_status":"saved"}"#,
    ]
    .iter()
    .map(|event| format!("{event}\n\n"))
    .collect::<String>();

    let mut submit = json(
        "200 OK",
        serde_json::json!({"run_id": "r-1", "session_id": "s-1", "status": "initiated"}),
    );
    submit
        .headers
        .push(("Content-Location", "/api/run-workflow/stream/r-1".to_string()));

    let base = serve(vec![
        ("/api/run-workflow", submit),
        (
            "/api/run-workflow/stream/r-1",
            Canned {
                status: "200 OK",
                headers: vec![("Content-Type", "text/event-stream".to_string())],
                body: stream_body,
            },
        ),
    ])
    .await;

    let api = client(&base);
    let run = api
        .submit_query(&RunWorkflowRequest::new("NVDA", WorkflowConfig::default()))
        .await
        .expect("submit");
    assert_eq!(run.session_id, "s-1");
    assert_eq!(run.stream_url, format!("{base}/api/run-workflow/stream/r-1"));

    let items: Vec<_> = api
        .open_stream(&run.stream_url)
        .await
        .expect("stream")
        .collect()
        .await;
    assert_eq!(items.len(), 4);
    assert!(matches!(
        items[0],
        Ok(StreamFrame::ConnectionEstablished { .. })
    ));
    assert!(matches!(items[1], Ok(StreamFrame::Batch(_))));
    match &items[2] {
        Err(err @ StreamError::Malformed { payload, .. }) => {
            assert_eq!(payload, "{broken");
            assert!(!err.is_fatal());
        }
        other => panic!("expected malformed frame, got {other:?}"),
    }
    assert!(matches!(
        items[3],
        Ok(StreamFrame::StreamComplete {
            report_status: ReportSaveStatus::Saved,
            ..
        })
    ));
}

#[tokio::test]
async fn missing_content_location_falls_back_to_run_route() {
    let base = serve(vec![(
        "/api/run-workflow",
        json(
            "200 OK",
            serde_json::json!({"run_id": "r-9", "session_id": "s-9", "status": "initiated"}),
        ),
    )])
    .await;

    let run = client(&base)
        .submit_query(&RunWorkflowRequest::new("oil", WorkflowConfig::default()))
        .await
        .expect("submit");
    assert_eq!(run.stream_url, format!("{base}/api/run-workflow/stream/r-9"));
}

#[tokio::test]
async fn rejected_submission_surfaces_status_and_body() {
    let base = serve(vec![(
        "/api/run-workflow",
        json(
            "422 Unprocessable Entity",
            serde_json::json!({"detail": "Query field is required and cannot be empty"}),
        ),
    )])
    .await;

    let err = client(&base)
        .submit_query(&RunWorkflowRequest::new(" ", WorkflowConfig::default()))
        .await
        .expect_err("should fail");
    let message = format!("{err:#}");
    assert!(message.contains("422"), "{message}");
    assert!(message.contains("cannot be empty"), "{message}");
}

#[tokio::test]
async fn missing_report_is_none() {
    let base = serve(vec![(
        "/api/history/report/s-2",
        json(
            "200 OK",
            serde_json::json!({
                "title": "Oil majors",
                "content": "# Oil",
                "timestamp": "2025-05-01T10:00:00",
                "metadata": {"query": "oil", "tickers": [{"ticker": "XOM"}], "ticker_type": "company"},
                "session_id": "s-2"
            }),
        ),
    )])
    .await;

    let api = client(&base);
    assert!(api.get_report("s-1").await.expect("fetch").is_none());
    let report = api.get_report("s-2").await.expect("fetch").expect("report");
    assert_eq!(report.ticker_badge(), "XOM");
}

#[tokio::test]
async fn listings_decode() {
    let base = serve(vec![
        (
            "/api/recent-reports?limit=2",
            json(
                "200 OK",
                serde_json::json!({"reports": [
                    {"title": "a", "content": "", "timestamp": "2025-01-01T00:00:00", "metadata": {}, "session_id": "s-a"},
                    {"title": "b", "content": "", "timestamp": "2025-01-02T00:00:00", "metadata": {}, "session_id": "s-b"}
                ]}),
            ),
        ),
        (
            "/api/history/sessions",
            json(
                "200 OK",
                serde_json::json!({"sessions": [{"session_id": "s-a", "last_updated": "2025-01-01T00:00:00", "title": "a"}]}),
            ),
        ),
        (
            "/api/health",
            json(
                "200 OK",
                serde_json::json!({"status": "ok", "timestamp": "2025-01-01T00:00:00"}),
            ),
        ),
    ])
    .await;

    let api = client(&base);
    assert_eq!(api.recent_reports(2).await.expect("recent").len(), 2);
    let sessions = api.history_sessions().await.expect("sessions");
    assert_eq!(sessions[0].session_id, "s-a");
    assert_eq!(api.health().await.expect("health").status, "ok");
    assert!(api.session_messages("s-a").await.is_err());
}
