//! Text heuristics for servers that do not send structured hints.

use marketlens_core::AgentName;
use regex::Regex;
use std::sync::LazyLock;

/// Substrings that mark a status as "agent is working".
pub const PROCESSING_KEYWORDS: [&str; 8] = [
    "waiting",
    "thinking",
    "gathering",
    "coding",
    "retrieving",
    "browsing",
    "analyzing",
    "preparing",
];

pub const REPORT_SAVED_PHRASE: &str = "report has been saved";
pub const REPORTER_PREPARING: &str = "preparing";

static EVALUATING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)supervisor is evaluating response from\s+([A-Za-z][\w-]*)")
        .expect("evaluating regex should compile")
});

static ASSIGNED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)supervisor assigned the following task to\s+([A-Za-z][\w/-]*)")
        .expect("assigned regex should compile")
});

static PLAN_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*plan title:\s*(.+?)\s*$").expect("plan title regex should compile")
});

pub fn is_processing_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    PROCESSING_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn is_report_saved_text(text: &str) -> bool {
    text.to_lowercase().contains(REPORT_SAVED_PHRASE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorSignal {
    /// The supervisor is reviewing the named agent's result
    Evaluating(AgentName),
    /// The supervisor routed work; `None` when the server wrote `N/A`
    Assigned(Option<AgentName>),
}

pub fn supervisor_signal(text: &str) -> Option<SupervisorSignal> {
    if let Some(caps) = ASSIGNED_RE.captures(text) {
        let target = caps.get(1)?.as_str();
        let target = (!target.eq_ignore_ascii_case("n/a")).then(|| AgentName::parse(target));
        return Some(SupervisorSignal::Assigned(target));
    }
    let caps = EVALUATING_RE.captures(text)?;
    Some(SupervisorSignal::Evaluating(AgentName::parse(
        caps.get(1)?.as_str(),
    )))
}

/// Plan title from a planner output: a `Plan Title:` line, or a JSON object
/// with a `title` field.
pub fn plan_title(text: &str) -> Option<String> {
    if let Some(caps) = PLAN_TITLE_RE.captures(text) {
        let title = caps.get(1)?.as_str().trim();
        if !title.is_empty() && !title.eq_ignore_ascii_case("n/a") {
            return Some(title.to_string());
        }
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    value
        .get("title")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_is_case_insensitive() {
        assert!(is_processing_text("Waiting for market..."));
        assert!(is_processing_text("Researcher is GATHERING information"));
        assert!(!is_processing_text("Coordinator is processing the query"));
        assert!(!is_processing_text("Received empty message from coder."));
    }

    #[test]
    fn supervisor_signals_are_recognized() {
        assert_eq!(
            supervisor_signal("Supervisor is evaluating response from researcher..."),
            Some(SupervisorSignal::Evaluating(AgentName::Researcher))
        );
        assert_eq!(
            supervisor_signal("Supervisor assigned the following task to market: \nPull quotes"),
            Some(SupervisorSignal::Assigned(Some(AgentName::Market)))
        );
        assert_eq!(
            supervisor_signal("Supervisor assigned the following task to N/A: \nN/A"),
            Some(SupervisorSignal::Assigned(None))
        );
        assert_eq!(supervisor_signal("Planner is thinking"), None);
    }

    #[test]
    fn plan_title_from_text_or_json() {
        assert_eq!(
            plan_title("Plan Title: Semiconductor margins"),
            Some("Semiconductor margins".to_string())
        );
        assert_eq!(plan_title("Plan Title: N/A"), None);
        assert_eq!(
            plan_title(r#"{"title":"Oil majors","steps":[]}"#),
            Some("Oil majors".to_string())
        );
        assert_eq!(plan_title("Thought: compare peers"), None);
    }

    #[test]
    fn report_saved_phrase_matches_server_wording() {
        assert!(is_report_saved_text(
            "Reporter agent has finished and the report has been saved."
        ));
        assert!(!is_report_saved_text("Reporter agent is processing"));
    }
}
