use serde::{Deserialize, Serialize};

/// Per-target lifecycle. States only move forward; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetState {
    Pending,
    ProxyChecked,
    LogsScanned,
    Classified,
    Unverified,
    Errored,
    Done,
}

impl TargetState {
    pub fn can_transition(self, next: TargetState) -> bool {
        use TargetState::*;
        matches!(
            (self, next),
            (Pending, ProxyChecked)
                | (Pending, Errored)
                | (ProxyChecked, LogsScanned)
                | (ProxyChecked, Classified | Unverified | Errored)
                | (LogsScanned, Classified | Unverified | Errored)
                | (Classified | Unverified | Errored, Done)
        )
    }

    /// One of the three outcomes a target settles on before `Done`.
    pub fn is_outcome(self) -> bool {
        matches!(self, TargetState::Classified | TargetState::Unverified | TargetState::Errored)
    }

    pub fn is_terminal(self) -> bool {
        self == TargetState::Done
    }
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TargetState::Pending => "PENDING",
            TargetState::ProxyChecked => "PROXY_CHECKED",
            TargetState::LogsScanned => "LOGS_SCANNED",
            TargetState::Classified => "CLASSIFIED",
            TargetState::Unverified => "UNVERIFIED",
            TargetState::Errored => "ERRORED",
            TargetState::Done => "DONE",
        };
        f.write_str(label)
    }
}
