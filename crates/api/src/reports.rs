//! Report listing helpers: search, sort, titles and ticker badges.

use crate::Report;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const FALLBACK_TITLE: &str = "Investment Analysis";
const MARKET_BADGE: &str = "Market";

/// Sort order for report listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportSort {
    #[default]
    DateDesc,
    DateAsc,
    TitleAsc,
    TitleDesc,
}

impl ReportSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateDesc => "date-desc",
            Self::DateAsc => "date-asc",
            Self::TitleAsc => "title-asc",
            Self::TitleDesc => "title-desc",
        }
    }
}

impl fmt::Display for ReportSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportSort {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "date-desc" => Ok(Self::DateDesc),
            "date-asc" => Ok(Self::DateAsc),
            "title-asc" => Ok(Self::TitleAsc),
            "title-desc" => Ok(Self::TitleDesc),
            other => Err(format!(
                "unknown sort '{other}' (expected date-desc, date-asc, title-asc or title-desc)"
            )),
        }
    }
}

impl Report {
    /// Title, falling back to the originating query.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.metadata
                    .query
                    .as_deref()
                    .filter(|q| !q.trim().is_empty())
            })
            .unwrap_or(FALLBACK_TITLE)
    }

    /// Badge text: `Market` for market-wide reports or when no ticker is
    /// attached, otherwise the first ticker symbol.
    pub fn ticker_badge(&self) -> &str {
        let Some(first) = self
            .metadata
            .tickers
            .as_ref()
            .and_then(|tickers| tickers.first())
        else {
            return MARKET_BADGE;
        };
        let ticker_type = self
            .metadata
            .ticker_type
            .as_deref()
            .unwrap_or("market")
            .to_ascii_lowercase();
        if ticker_type == "market" || first.ticker.trim().is_empty() {
            MARKET_BADGE
        } else {
            &first.ticker
        }
    }

    /// Server timestamps are RFC 3339 or naive ISO 8601 (treated as UTC).
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(self.timestamp.as_deref()?)
    }

    /// e.g. `May 01, 2025 · 10:00 AM`; the raw string when it does not parse.
    pub fn friendly_timestamp(&self) -> String {
        match self.parsed_timestamp() {
            Some(ts) => ts.format("%b %d, %Y · %I:%M %p").to_string(),
            None => self.timestamp.clone().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Keep reports whose title or query contains `search` (case-insensitive).
/// A blank search keeps everything.
pub fn filter_reports(reports: Vec<Report>, search: &str) -> Vec<Report> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return reports;
    }
    reports
        .into_iter()
        .filter(|report| {
            let title = report.title.as_deref().unwrap_or_default().to_lowercase();
            let query = report
                .metadata
                .query
                .as_deref()
                .unwrap_or_default()
                .to_lowercase();
            title.contains(&needle) || query.contains(&needle)
        })
        .collect()
}

/// Stable sort. Reports with unparseable timestamps sort as oldest.
pub fn sort_reports(reports: &mut [Report], sort: ReportSort) {
    match sort {
        ReportSort::DateDesc => reports.sort_by(|a, b| cmp_date(b, a)),
        ReportSort::DateAsc => reports.sort_by(cmp_date),
        ReportSort::TitleAsc => reports.sort_by(cmp_title),
        ReportSort::TitleDesc => reports.sort_by(|a, b| cmp_title(b, a)),
    }
}

fn cmp_date(a: &Report, b: &Report) -> Ordering {
    a.parsed_timestamp().cmp(&b.parsed_timestamp())
}

fn cmp_title(a: &Report, b: &Report) -> Ordering {
    let a = a.title.as_deref().unwrap_or_default().to_lowercase();
    let b = b.title.as_deref().unwrap_or_default().to_lowercase();
    a.cmp(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReportMetadata, TickerRef};

    fn report(title: Option<&str>, query: &str, ts: &str) -> Report {
        Report {
            title: title.map(str::to_string),
            content: String::new(),
            timestamp: Some(ts.to_string()),
            last_updated: None,
            metadata: ReportMetadata {
                query: Some(query.to_string()),
                tickers: None,
                ticker_type: None,
            },
            session_id: format!("s-{ts}"),
        }
    }

    fn ticker(symbol: &str) -> TickerRef {
        TickerRef {
            ticker: symbol.to_string(),
            extra: Default::default(),
        }
    }

    #[test]
    fn sort_parses_cli_spelling() {
        assert_eq!("Title-Asc".parse::<ReportSort>(), Ok(ReportSort::TitleAsc));
        assert!("newest".parse::<ReportSort>().is_err());
        assert_eq!(ReportSort::default().to_string(), "date-desc");
    }

    #[test]
    fn search_matches_title_or_query() {
        let reports = vec![
            report(Some("Nvidia outlook"), "chips", "2025-01-01T00:00:00"),
            report(Some("Macro"), "what about NVDA margins", "2025-01-02T00:00:00"),
            report(Some("Oil"), "brent", "2025-01-03T00:00:00"),
        ];
        let hits = filter_reports(reports.clone(), "nv");
        assert_eq!(hits.len(), 2);
        assert_eq!(filter_reports(reports, "  ").len(), 3);
    }

    #[test]
    fn date_sort_handles_mixed_timestamp_formats() {
        let mut reports = vec![
            report(Some("b"), "", "2025-03-01T09:00:00.123456"),
            report(Some("a"), "", "2025-04-01T09:00:00+00:00"),
            report(Some("c"), "", "garbage"),
        ];
        sort_reports(&mut reports, ReportSort::DateDesc);
        let titles: Vec<_> = reports.iter().map(|r| r.display_title()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);

        sort_reports(&mut reports, ReportSort::TitleDesc);
        let titles: Vec<_> = reports.iter().map(|r| r.display_title()).collect();
        assert_eq!(titles, vec!["c", "b", "a"]);
    }

    #[test]
    fn badge_follows_ticker_type() {
        let mut r = report(None, "apple", "2025-01-01T00:00:00");
        assert_eq!(r.ticker_badge(), "Market");

        r.metadata.tickers = Some(vec![ticker("AAPL"), ticker("MSFT")]);
        assert_eq!(r.ticker_badge(), "Market");

        r.metadata.ticker_type = Some("company".to_string());
        assert_eq!(r.ticker_badge(), "AAPL");

        r.metadata.ticker_type = Some("MARKET".to_string());
        assert_eq!(r.ticker_badge(), "Market");

        r.metadata.ticker_type = Some("sector".to_string());
        assert_eq!(r.ticker_badge(), "AAPL");
    }

    #[test]
    fn title_falls_back_to_query() {
        assert_eq!(report(None, "apple", "x").display_title(), "apple");
        assert_eq!(report(None, "", "x").display_title(), "Investment Analysis");
    }

    #[test]
    fn friendly_timestamp_formats_or_echoes() {
        let r = report(None, "", "2025-05-01T14:05:00");
        assert_eq!(r.friendly_timestamp(), "May 01, 2025 · 02:05 PM");
        assert_eq!(report(None, "", "soon").friendly_timestamp(), "soon");
    }
}
