use anyhow::Result;
use marketlens_api::reports::parse_timestamp;
use marketlens_api::{HistorySession, StoredMessage};
use serde_json::Value;

use crate::config::{api_client, load_config};
use crate::reports::report_line;

const CONTENT_PREVIEW_CHARS: usize = 160;

fn short_timestamp(raw: Option<&str>) -> String {
    match raw {
        Some(raw) => parse_timestamp(raw)
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| raw.to_string()),
        None => "-".to_string(),
    }
}

pub fn session_line(session: &HistorySession) -> String {
    let title = session
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("(untitled)");
    format!(
        "{}  {}  {}",
        short_timestamp(session.last_updated.as_deref()),
        session.session_id,
        title
    )
}

/// Stored content is either plain text or a JSON document.
fn content_preview(content: &Value) -> String {
    let text = match content {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > CONTENT_PREVIEW_CHARS {
        let cut: String = flat.chars().take(CONTENT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

pub fn message_line(message: &StoredMessage) -> String {
    let role = message
        .role
        .as_deref()
        .or(message.message_type.as_deref())
        .unwrap_or("message");
    format!(
        "{}  {:<10} {}",
        short_timestamp(message.timestamp.as_deref()),
        role,
        content_preview(&message.content)
    )
}

pub async fn run_history(session_id: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let api = api_client(&config)?;

    let Some(session_id) = session_id else {
        let sessions = api.history_sessions().await?;
        if sessions.is_empty() {
            println!("No sessions found.");
        }
        for session in &sessions {
            println!("{}", session_line(session));
        }
        return Ok(());
    };

    let messages = api.session_messages(session_id).await?;
    println!("Session {session_id}: {} message(s)", messages.len());
    for message in &messages {
        println!("  {}", message_line(message));
    }

    let reports = api.session_reports(session_id).await?;
    if !reports.is_empty() {
        println!();
        println!("Reports:");
        for report in &reports {
            println!("  {}", report_line(report));
        }
    }
    Ok(())
}

pub async fn run_health() -> Result<()> {
    let config = load_config()?;
    let api = api_client(&config)?;
    let health = api.health().await?;
    println!("{}: {}", api.base_url(), health.status);
    if let Some(message) = health.message {
        println!("{message}");
    }
    Ok(())
}
