//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a guided-session
//! WebSocket connection. It manages the session's phase machine and
//! delegates the prayer countdown to its own task.

use crate::web::{
    middleware::AuthUser,
    prayer_task::prayer_countdown,
    protocol::{ClientMessage, ServerMessage, SessionPhase},
    state::{AppState, SessionState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::Utc;
use devotion_core::domain::DevotionRecord;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

/// Serializes and sends one server message, returning whether the send
/// succeeded.
pub async fn send_server_message(
    ws_sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
    msg: &ServerMessage,
) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {e}");
            return false;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Option<Uuid>) {
    info!(signed_in = user_id.is_some(), "New guided session connection");

    // The sender is wrapped in an Arc<Mutex<>> so the prayer countdown task
    // can share it with this loop.
    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // --- 1. Start Phase ---
    let session_state_lock = if let Some(Ok(Message::Text(start_json))) = receiver.next().await {
        match serde_json::from_str::<ClientMessage>(&start_json) {
            Ok(ClientMessage::Start { scripture }) => {
                if scripture.is_empty() {
                    send_server_message(
                        &ws_sender,
                        &ServerMessage::Error {
                            message: "A session needs at least one scripture passage."
                                .to_string(),
                        },
                    )
                    .await;
                    return;
                }
                Arc::new(Mutex::new(SessionState::new(user_id, scripture)))
            }
            _ => {
                error!("First message was not a valid Start message.");
                send_server_message(
                    &ws_sender,
                    &ServerMessage::Error {
                        message: "The first message must start a session.".to_string(),
                    },
                )
                .await;
                return;
            }
        }
    } else {
        error!("Client disconnected before sending Start message.");
        return;
    };

    if !send_server_message(
        &ws_sender,
        &ServerMessage::Phase {
            phase: SessionPhase::Prayer,
        },
    )
    .await
    {
        error!("Failed to send opening phase message.");
        return;
    }

    // --- 2. Spawn the Prayer Countdown ---
    let prayer_task_handle: Option<JoinHandle<()>> = {
        let session = session_state_lock.lock().await;
        let duration = Duration::from_secs(app_state.config.prayer_minutes * 60);
        let token = session.cancellation_token.clone();
        let session_state_lock = session_state_lock.clone();
        let ws_sender = ws_sender.clone();
        Some(tokio::spawn(async move {
            prayer_countdown(session_state_lock, ws_sender, token, duration).await;
        }))
    };

    // --- 3. Main Message Loop ---
    loop {
        if let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_message(
                        text.to_string(),
                        &app_state,
                        &session_state_lock,
                        &ws_sender,
                    )
                    .await;
                }
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        } else {
            info!("Client disconnected.");
            break;
        }
    }

    // --- 4. Cleanup ---
    if let Some(handle) = prayer_task_handle {
        handle.abort();
    }
    info!("Guided session connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    match client_msg {
        ClientMessage::SkipPrayer => {
            let advanced = {
                let mut session = session_state_lock.lock().await;
                if session.phase == SessionPhase::Prayer {
                    session.cancellation_token.cancel();
                    session.phase = SessionPhase::Scripture;
                    true
                } else {
                    warn!("SkipPrayer received outside the prayer phase; ignored.");
                    false
                }
            };
            if advanced {
                info!("Prayer skipped. Advancing to scripture.");
                send_server_message(
                    ws_sender,
                    &ServerMessage::Phase {
                        phase: SessionPhase::Scripture,
                    },
                )
                .await;
            }
        }
        ClientMessage::Continue => {
            let advanced = {
                let mut session = session_state_lock.lock().await;
                if session.phase == SessionPhase::Scripture {
                    session.phase = SessionPhase::Observation;
                    true
                } else {
                    warn!("Continue received outside the scripture phase; ignored.");
                    false
                }
            };
            if advanced {
                send_server_message(
                    ws_sender,
                    &ServerMessage::Phase {
                        phase: SessionPhase::Observation,
                    },
                )
                .await;
            }
        }
        ClientMessage::Back => {
            let previous = {
                let mut session = session_state_lock.lock().await;
                match session.phase.previous() {
                    Some(previous) => {
                        session.phase = previous;
                        Some(previous)
                    }
                    None => {
                        warn!("Back received with no previous phase; ignored.");
                        None
                    }
                }
            };
            if let Some(phase) = previous {
                send_server_message(ws_sender, &ServerMessage::Phase { phase }).await;
            }
        }
        ClientMessage::Observation { text } => {
            let advanced = {
                let mut session = session_state_lock.lock().await;
                if session.phase == SessionPhase::Observation {
                    session.observation = text;
                    session.phase = SessionPhase::Application;
                    true
                } else {
                    warn!("Observation received outside the observation phase; ignored.");
                    false
                }
            };
            if advanced {
                send_server_message(
                    ws_sender,
                    &ServerMessage::Phase {
                        phase: SessionPhase::Application,
                    },
                )
                .await;
            }
        }
        ClientMessage::Application { text } => {
            let advanced = {
                let mut session = session_state_lock.lock().await;
                if session.phase == SessionPhase::Application {
                    session.application = text;
                    session.phase = SessionPhase::PrayerWrite;
                    true
                } else {
                    warn!("Application received outside the application phase; ignored.");
                    false
                }
            };
            if advanced {
                send_server_message(
                    ws_sender,
                    &ServerMessage::Phase {
                        phase: SessionPhase::PrayerWrite,
                    },
                )
                .await;
            }
        }
        ClientMessage::Prayer { text } => {
            let (record, user_id) = {
                let mut session = session_state_lock.lock().await;
                if session.phase != SessionPhase::PrayerWrite {
                    warn!("Prayer received outside the prayer-write phase; ignored.");
                    return;
                }
                session.prayer_text = text;
                let record = DevotionRecord {
                    id: Uuid::new_v4(),
                    date: Utc::now(),
                    scripture: session.scripture.clone(),
                    observation: session.observation.clone(),
                    application: session.application.clone(),
                    prayer_text: session.prayer_text.clone(),
                };
                (record, session.user_id)
            };

            info!("Session complete. Persisting devotion record {}.", record.id);
            let save_result = async {
                let mut records = app_state.sync.load_devotion_records(user_id).await?;
                records.insert(0, record.clone());
                app_state.sync.save_devotion_records(&records, user_id).await
            }
            .await;

            match save_result {
                Ok(outcome) => {
                    send_server_message(
                        ws_sender,
                        &ServerMessage::RecordSaved {
                            id: record.id,
                            warning: outcome.cloud_warning,
                        },
                    )
                    .await;
                }
                Err(e) => {
                    error!("Failed to persist devotion record: {e}");
                    send_server_message(
                        ws_sender,
                        &ServerMessage::Error {
                            message: "Failed to save the devotion record.".to_string(),
                        },
                    )
                    .await;
                }
            }
        }
        ClientMessage::Start { .. } => {
            warn!("Received subsequent Start message, which is ignored.");
        }
    }
}
