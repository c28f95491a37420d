//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the client and the API
//! server for the guided devotion session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// The Guided Session Phases
//=========================================================================================

/// The five phases of a guided session, in order. `Prayer` is the opening
/// silent-prayer countdown; `PrayerWrite` is the closing written prayer.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Prayer,
    Scripture,
    Observation,
    Application,
    PrayerWrite,
}

impl SessionPhase {
    /// Stepping back never re-enters the opening prayer; its countdown has
    /// already run.
    pub fn previous(self) -> Option<SessionPhase> {
        match self {
            SessionPhase::Prayer | SessionPhase::Scripture => None,
            SessionPhase::Observation => Some(SessionPhase::Scripture),
            SessionPhase::Application => Some(SessionPhase::Observation),
            SessionPhase::PrayerWrite => Some(SessionPhase::Application),
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// The scripture a session is started with, as the client selected it.
#[derive(Deserialize, Debug, Clone)]
pub struct PassageInput {
    pub reference: String,
    pub text: String,
}

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begins a session. This must be the first message sent on the connection.
    Start { scripture: Vec<PassageInput> },

    /// Ends the silent-prayer countdown early and moves on to the scripture.
    SkipPrayer,

    /// Advances from the scripture phase to the observation phase.
    Continue,

    /// Steps back to the previous writing phase without losing entered text.
    Back,

    /// Submits the observation text and advances.
    Observation { text: String },

    /// Submits the application text and advances.
    Application { text: String },

    /// Submits the written prayer. This completes the session: the server
    /// assembles the devotion record and persists it.
    Prayer { text: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Announces that the session has entered `phase`. Sent on session start
    /// and on every transition, including the timer-driven one.
    Phase { phase: SessionPhase },

    /// The completed devotion record was persisted. `warning` is set when the
    /// record reached the local store but not the cloud.
    RecordSaved {
        id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_messages_serialize_with_snake_case_tags() {
        let msg = ServerMessage::Phase {
            phase: SessionPhase::PrayerWrite,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"phase","phase":"prayer_write"}"#);
    }

    #[test]
    fn record_saved_omits_an_absent_warning() {
        let msg = ServerMessage::RecordSaved {
            id: Uuid::nil(),
            warning: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("warning"));
    }

    #[test]
    fn start_message_deserializes_with_passages() {
        let json = r#"{"type":"start","scripture":[{"reference":"Psalm 23","text":"The Lord is my shepherd."}]}"#;
        match serde_json::from_str::<ClientMessage>(json).unwrap() {
            ClientMessage::Start { scripture } => {
                assert_eq!(scripture.len(), 1);
                assert_eq!(scripture[0].reference, "Psalm 23");
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn back_stops_at_the_scripture_phase() {
        assert_eq!(
            SessionPhase::Observation.previous(),
            Some(SessionPhase::Scripture)
        );
        assert_eq!(SessionPhase::Scripture.previous(), None);
        assert_eq!(SessionPhase::Prayer.previous(), None);
    }
}
