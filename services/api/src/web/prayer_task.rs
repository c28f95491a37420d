//! services/api/src/web/prayer_task.rs
//!
//! This module contains the asynchronous "worker" function for the silent
//! prayer countdown that opens every guided session.

use crate::web::{
    protocol::{ServerMessage, SessionPhase},
    state::SessionState,
    ws_handler::send_server_message,
};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Counts down the silent-prayer phase and advances the session to the
/// scripture phase when the time is up.
///
/// The task is cancelled through the token when the user skips the prayer;
/// the skip path performs the transition itself in that case.
pub async fn prayer_countdown(
    session_state_lock: Arc<Mutex<SessionState>>,
    ws_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    cancellation_token: CancellationToken,
    duration: Duration,
) {
    info!("Prayer countdown started for {:?}.", duration);

    tokio::select! {
        _ = cancellation_token.cancelled() => {
            info!("Prayer countdown cancelled.");
            return;
        }
        _ = tokio::time::sleep(duration) => {}
    }

    // The user may have skipped in the instant between the sleep elapsing
    // and this lock; only transition if the session is still praying.
    let mut session = session_state_lock.lock().await;
    if session.phase != SessionPhase::Prayer {
        return;
    }
    session.phase = SessionPhase::Scripture;
    drop(session);

    info!("Prayer countdown elapsed. Advancing to scripture.");
    send_server_message(
        &ws_sender,
        &ServerMessage::Phase {
            phase: SessionPhase::Scripture,
        },
    )
    .await;
}
