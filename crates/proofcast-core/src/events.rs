//! Workflow events and the push wire envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::SessionId;

/// Progress of one workflow step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// The step has started.
    InProgress,
    /// The step finished successfully.
    Done,
    /// The step failed.
    Error,
}

impl EventStatus {
    /// Wire spelling, also used as a log field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        }
    }
}

/// One status notification for a workflow step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Logical operation name, e.g. `getLoginQr`.
    #[serde(rename = "fn")]
    pub function: String,
    /// Step status.
    pub status: EventStatus,
    /// Opaque payload.
    pub data: Value,
}

impl Event {
    /// Build an event.
    pub fn new(function: impl Into<String>, status: EventStatus, data: Value) -> Self {
        Self {
            function: function.into(),
            status,
            data,
        }
    }

    /// `IN_PROGRESS` event.
    pub fn in_progress(function: impl Into<String>, data: Value) -> Self {
        Self::new(function, EventStatus::InProgress, data)
    }

    /// `DONE` event.
    pub fn done(function: impl Into<String>, data: Value) -> Self {
        Self::new(function, EventStatus::Done, data)
    }

    /// `ERROR` event.
    pub fn error(function: impl Into<String>, data: Value) -> Self {
        Self::new(function, EventStatus::Error, data)
    }
}

/// A frame written to a push connection.
///
/// ```json
/// {"type":"id","id":"<session>"}
/// {"type":"event","id":"<session>","event":{"fn":"getAuthQr","status":"DONE","data":{}}}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Tells a freshly connected client which session id it was given.
    Id {
        /// The assigned session.
        id: SessionId,
    },
    /// A workflow event for the session.
    Event {
        /// Target session.
        id: SessionId,
        /// The event itself.
        event: Event,
    },
}

impl Envelope {
    /// Identity-assignment frame.
    pub fn identity(id: SessionId) -> Self {
        Self::Id { id }
    }

    /// Event frame.
    pub fn event(id: SessionId, event: Event) -> Self {
        Self::Event { id, event }
    }

    /// Session this frame is addressed to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Id { id } | Self::Event { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sid() -> SessionId {
        SessionId::parse("0b3c1c5e-3f59-4b8e-9a51-2f6f6f0c7d11").unwrap()
    }

    #[test]
    fn identity_frame_shape() {
        let json = serde_json::to_value(Envelope::identity(sid())).unwrap();
        assert_eq!(
            json,
            json!({"type": "id", "id": "0b3c1c5e-3f59-4b8e-9a51-2f6f6f0c7d11"})
        );
    }

    #[test]
    fn event_frame_shape() {
        let env = Envelope::event(sid(), Event::in_progress("getLoginQr", json!("abc")));
        let json = serde_json::to_value(env).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["id"], "0b3c1c5e-3f59-4b8e-9a51-2f6f6f0c7d11");
        assert_eq!(json["event"]["fn"], "getLoginQr");
        assert_eq!(json["event"]["status"], "IN_PROGRESS");
        assert_eq!(json["event"]["data"], "abc");
    }

    #[test]
    fn status_spellings() {
        for (status, text) in [
            (EventStatus::InProgress, "IN_PROGRESS"),
            (EventStatus::Done, "DONE"),
            (EventStatus::Error, "ERROR"),
        ] {
            assert_eq!(serde_json::to_value(status).unwrap(), json!(text));
            assert_eq!(status.as_str(), text);
        }
    }

    #[test]
    fn constructors_set_status() {
        assert_eq!(Event::done("f", json!(null)).status, EventStatus::Done);
        assert_eq!(Event::error("f", json!(null)).status, EventStatus::Error);
        assert_eq!(
            Event::in_progress("f", json!(null)).status,
            EventStatus::InProgress
        );
    }

    #[test]
    fn parses_client_side_frame() {
        let raw = r#"{"type":"event","id":"0b3c1c5e-3f59-4b8e-9a51-2f6f6f0c7d11","event":{"fn":"handleLogin","status":"ERROR","data":{"error":"bad proof"}}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        match env {
            Envelope::Event { id, event } => {
                assert_eq!(id, sid());
                assert_eq!(event.function, "handleLogin");
                assert_eq!(event.status, EventStatus::Error);
                assert_eq!(event.data["error"], "bad proof");
            }
            Envelope::Id { .. } => panic!("expected event frame"),
        }
    }

    #[test]
    fn session_id_accessor() {
        let id = sid();
        assert_eq!(Envelope::identity(id.clone()).session_id(), &id);
        let env = Envelope::event(id.clone(), Event::done("f", json!(1)));
        assert_eq!(env.session_id(), &id);
    }
}
