use std::fmt;

/// Lifecycle of one run.
///
/// `Idle -> Submitting -> Streaming -> {ReportReady | ReportFailed |
/// CompletedNoReport | ConnectionError}`, plus `Submitting -> ConnectionError`
/// when the submission itself fails. Terminal states are sticky; only a new
/// submission leaves them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunStatus {
    #[default]
    Idle,
    Submitting,
    Streaming,
    ReportReady,
    ReportFailed,
    CompletedNoReport,
    ConnectionError,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Streaming => "streaming",
            Self::ReportReady => "report_ready",
            Self::ReportFailed => "report_failed",
            Self::CompletedNoReport => "completed_no_report",
            Self::ConnectionError => "connection_error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ReportReady | Self::ReportFailed | Self::CompletedNoReport | Self::ConnectionError
        )
    }

    /// Terminal states that should make the CLI exit non-zero.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ReportFailed | Self::ConnectionError)
    }

    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Submitting, Streaming)
                | (Submitting, ConnectionError)
                | (Streaming, ReportReady)
                | (Streaming, ReportFailed)
                | (Streaming, CompletedNoReport)
                | (Streaming, ConnectionError)
        )
    }

    /// Human label for the final status line.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Submitting => "Submitting query...",
            Self::Streaming => "Analysis in progress...",
            Self::ReportReady => "Analysis complete. Report is ready.",
            Self::ReportFailed => "Analysis finished, but the report could not be saved.",
            Self::CompletedNoReport => "Analysis finished without generating a report.",
            Self::ConnectionError => "Connection to the analysis stream failed.",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::RunStatus::{self, *};

    const ALL: [RunStatus; 7] = [
        Idle,
        Submitting,
        Streaming,
        ReportReady,
        ReportFailed,
        CompletedNoReport,
        ConnectionError,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn submission_may_fail_before_streaming() {
        assert!(Submitting.can_transition_to(ConnectionError));
        assert!(!Submitting.can_transition_to(ReportReady));
        assert!(!Idle.can_transition_to(Streaming));
    }

    #[test]
    fn failures_are_a_subset_of_terminal() {
        for status in ALL {
            if status.is_failure() {
                assert!(status.is_terminal());
            }
        }
        assert!(!CompletedNoReport.is_failure());
    }
}
