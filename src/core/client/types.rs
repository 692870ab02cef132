use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle state reported by the backend. Both the English and the
/// backend's localized spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[serde(alias = "programado")]
    Scheduled,
    #[serde(alias = "en_progreso")]
    InProgress,
    #[serde(alias = "completado")]
    Completed,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::InProgress => "in_progress",
            EventStatus::Completed => "completed",
            EventStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Transient copy of a backend event, valid for a single poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// Anything else the backend sent along.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            status: None,
            start_date: None,
            end_date: None,
            extra: Map::new(),
        }
    }

    pub fn with_start_date(mut self, start_date: &str) -> Self {
        self.start_date = Some(start_date.to_string());
        self
    }

    pub fn with_end_date(mut self, end_date: &str) -> Self {
        self.end_date = Some(end_date.to_string());
        self
    }

    pub(crate) fn start_label(&self) -> &str {
        self.start_date.as_deref().unwrap_or("n/a")
    }

    pub(crate) fn end_label(&self) -> &str {
        self.end_date.as_deref().unwrap_or("n/a")
    }

    pub(crate) fn status_label(&self) -> String {
        self.status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    }
}

#[derive(Serialize)]
pub(crate) struct CompletionRequest {
    pub event_id: i64,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub token: &'a str,
}

/// Summary the analysis endpoint returns when it kicks off completion work.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompletionSummary {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub total_participants: Option<u64>,
    #[serde(default)]
    pub successful: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub results: Vec<ParticipantOutcome>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ParticipantOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub participant_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reads the `results` array of a listing response, skipping entries that
/// do not carry an integer id.
pub(crate) fn events_from_listing(body: &Value) -> Option<Vec<Event>> {
    let results = body.get("results")?.as_array()?;
    let mut events = Vec::with_capacity(results.len());
    for raw in results {
        match serde_json::from_value::<Event>(raw.clone()) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!("Skipping malformed event entry {}: {}", raw, e),
        }
    }
    Some(events)
}
