//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::adapters::review_llm::ReviewDispatcher;
use crate::config::Config;
use crate::sync::RecordSyncService;
use crate::web::protocol::{PassageInput, SessionPhase};
use devotion_core::domain::ScripturePassage;
use devotion_core::ports::{CloudStore, ScriptureService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<RecordSyncService>,
    pub cloud: Arc<dyn CloudStore>,
    /// `None` when no scripture provider key is configured; lookups then
    /// return an instructional placeholder instead of failing.
    pub scripture: Option<Arc<dyn ScriptureService>>,
    pub review: Arc<ReviewDispatcher>,
    pub config: Arc<Config>,
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active guided-session connection.
pub struct SessionState {
    /// `None` for an anonymous session; records then stay local-only.
    pub user_id: Option<Uuid>,
    pub scripture: Vec<ScripturePassage>,
    pub phase: SessionPhase,
    pub observation: String,
    pub application: String,
    pub prayer_text: String,
    /// A token to end the silent-prayer countdown early.
    pub cancellation_token: CancellationToken,
}

impl SessionState {
    /// Creates the state for a freshly started session. Every session opens
    /// in the silent-prayer phase.
    pub fn new(user_id: Option<Uuid>, scripture: Vec<PassageInput>) -> Self {
        Self {
            user_id,
            scripture: scripture
                .into_iter()
                .map(|p| ScripturePassage {
                    reference: p.reference,
                    text: p.text,
                })
                .collect(),
            phase: SessionPhase::Prayer,
            observation: String::new(),
            application: String::new(),
            prayer_text: String::new(),
            cancellation_token: CancellationToken::new(),
        }
    }
}
