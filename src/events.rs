use crate::orchestrator::Mode;
use crate::registry::JoinStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topic {
    ModuleJoined,
    ModuleQuarantined,
    ModuleRemoved,
    ModeChanged,
    SpaceWeather,
    NextPass,
    Anomaly,
    Log,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::ModuleJoined,
        Topic::ModuleQuarantined,
        Topic::ModuleRemoved,
        Topic::ModeChanged,
        Topic::SpaceWeather,
        Topic::NextPass,
        Topic::Anomaly,
        Topic::Log,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::ModuleJoined => "MODULE_JOINED",
            Topic::ModuleQuarantined => "MODULE_QUARANTINED",
            Topic::ModuleRemoved => "MODULE_REMOVED",
            Topic::ModeChanged => "MODE_CHANGED",
            Topic::SpaceWeather => "SPACE_WEATHER",
            Topic::NextPass => "NEXT_PASS",
            Topic::Anomaly => "ANOMALY",
            Topic::Log => "LOG",
        }
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Topic {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| EventError::UnknownTopic(s.to_string()))
    }
}

fn unknown_signature() -> String {
    "unknown".to_string()
}

/// A domain event. On the wire: `{"topic": "NEXT_PASS", "payload": {"minutes": 7}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    ModuleJoined {
        module_id: String,
    },
    ModuleQuarantined {
        module_id: String,
        status: JoinStatus,
        reasons: Vec<String>,
    },
    ModuleRemoved {
        module_id: String,
    },
    ModeChanged {
        mode: Mode,
        why: String,
    },
    SpaceWeather {
        kp: f64,
    },
    NextPass {
        minutes: i64,
    },
    Anomaly {
        #[serde(default = "unknown_signature")]
        signature: String,
    },
    Log {
        msg: String,
    },
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("malformed {topic} payload: {source}")]
    MalformedPayload {
        topic: Topic,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed event line: {0}")]
    MalformedLine(#[source] serde_json::Error),
}

#[derive(Deserialize)]
struct RawEvent {
    topic: String,
    #[serde(default)]
    payload: Value,
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::ModuleJoined { .. } => Topic::ModuleJoined,
            Event::ModuleQuarantined { .. } => Topic::ModuleQuarantined,
            Event::ModuleRemoved { .. } => Topic::ModuleRemoved,
            Event::ModeChanged { .. } => Topic::ModeChanged,
            Event::SpaceWeather { .. } => Topic::SpaceWeather,
            Event::NextPass { .. } => Topic::NextPass,
            Event::Anomaly { .. } => Topic::Anomaly,
            Event::Log { .. } => Topic::Log,
        }
    }

    pub fn log(msg: impl Into<String>) -> Self {
        Event::Log { msg: msg.into() }
    }

    /// Decode an event from a topic name and an untyped payload.
    ///
    /// # Errors
    ///
    /// [`EventError::UnknownTopic`] for unrecognised topics and
    /// [`EventError::MalformedPayload`] when the payload does not fit the
    /// topic (for example a non-numeric `kp`).
    pub fn from_payload(topic: &str, payload: Value) -> Result<Self, EventError> {
        let parsed: Topic = topic.parse()?;
        let tagged = serde_json::json!({ "topic": parsed.as_str(), "payload": payload });
        serde_json::from_value(tagged)
            .map_err(|source| EventError::MalformedPayload { topic: parsed, source })
    }

    /// Decode one line of an event script.
    ///
    /// # Errors
    ///
    /// Fails if the line is not a `{"topic", "payload"}` object or the payload
    /// does not decode for its topic.
    pub fn from_line(line: &str) -> Result<Self, EventError> {
        let raw: RawEvent = serde_json::from_str(line).map_err(EventError::MalformedLine)?;
        Self::from_payload(&raw.topic, raw.payload)
    }
}

impl core::fmt::Display for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Event::ModuleJoined { module_id } => write!(f, "[JOINED] {module_id}"),
            Event::ModuleQuarantined { module_id, status, reasons } => {
                write!(f, "[QUARANTINE] {module_id} | {status} | {reasons:?}")
            }
            Event::ModuleRemoved { module_id } => write!(f, "[REMOVED] {module_id}"),
            Event::ModeChanged { mode, why } => write!(f, "[MODE] -> {mode} (why: {why})"),
            Event::SpaceWeather { kp } => write!(f, "[SPACE_WEATHER] kp={kp:?}"),
            Event::NextPass { minutes } => write!(f, "[NEXT_PASS] {minutes} min"),
            Event::Anomaly { signature } => write!(f, "[ANOMALY] {signature}"),
            Event::Log { msg } => write!(f, "[LOG] {msg}"),
        }
    }
}
