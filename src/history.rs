use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// What became of the command issued in one cycle.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    /// The venue answered (this includes business-level rejections in a 2xx body).
    Success { result: Value },
    /// Out-of-grammar command or a failed exchange call.
    ExecutionError { error: String },
    /// Empty, failed, or unparsable decision response.
    ParseError { error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            Outcome::Success { result } => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoryEntry {
    pub cycle: u64,
    pub recorded_at: DateTime<Utc>,
    /// The parsed command, or the raw response text when it could not be parsed.
    pub command: Value,
    pub outcome: Outcome,
}

/// Append-only record of every completed cycle in this process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per entry, oldest first, for the decision prompt.
    pub fn transcript(&self) -> String {
        if self.entries.is_empty() {
            return "No previous actions.".to_string();
        }
        self.entries
            .iter()
            .map(|e| {
                let outcome = serde_json::to_string(&e.outcome).unwrap_or_else(|_| "{}".into());
                format!(
                    "[cycle {} @ {}] command: {} -> outcome: {}",
                    e.cycle,
                    e.recorded_at.to_rfc3339(),
                    e.command,
                    outcome
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
