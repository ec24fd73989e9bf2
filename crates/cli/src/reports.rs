use anyhow::{Result, bail};
use marketlens_api::Report;
use marketlens_api::reports::{ReportSort, filter_reports, sort_reports};
use std::fmt::Write as _;

use crate::config::{api_client, load_config};

/// One listing line: badge, title, time, session.
pub fn report_line(report: &Report) -> String {
    format!(
        "[{}] {}  {}  ({})",
        report.ticker_badge(),
        report.display_title(),
        report.friendly_timestamp(),
        report.session_id
    )
}

/// Full report view: header block followed by the markdown body.
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.display_title());
    if let Some(query) = report.metadata.query.as_deref().filter(|q| !q.is_empty()) {
        let _ = writeln!(out, "Query:   {query}");
    }
    let _ = writeln!(out, "Ticker:  {}", report.ticker_badge());
    let _ = writeln!(out, "Date:    {}", report.friendly_timestamp());
    let _ = writeln!(out, "Session: {}", report.session_id);
    out.push('\n');
    out.push_str(report.content.trim_end());
    out.push('\n');
    out
}

/// Filter and order a listing the way the reports command prints it.
pub fn select_reports(reports: Vec<Report>, search: Option<&str>, sort: ReportSort) -> Vec<Report> {
    let mut reports = match search {
        Some(search) => filter_reports(reports, search),
        None => reports,
    };
    sort_reports(&mut reports, sort);
    reports
}

pub async fn run_report(session_id: &str, raw: bool) -> Result<()> {
    let config = load_config()?;
    let api = api_client(&config)?;
    let Some(report) = api.get_report(session_id).await? else {
        bail!("no report saved for session {session_id}");
    };
    if raw {
        println!("{}", report.content);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

pub async fn run_reports(limit: Option<usize>, search: Option<String>, sort: ReportSort) -> Result<()> {
    let config = load_config()?;
    let api = api_client(&config)?;
    let limit = limit.unwrap_or(config.display.recent_limit);
    let reports = api.recent_reports(limit).await?;
    let reports = select_reports(reports, search.as_deref(), sort);
    if reports.is_empty() {
        println!("No reports found.");
        return Ok(());
    }
    for report in &reports {
        println!("{}", report_line(report));
    }
    Ok(())
}
