use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{Json, Response},
    routing::get,
    Router,
};
use futures_util::{stream::SplitStream, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use agentdeck_agents::{kickoff_prompt, model_env};

use crate::config::Settings;
use crate::web::protocol::{ClientMessage, ModelReport, ServerMessage, SessionStatus};
use crate::web::session_manager::{session_key, ClientSender, SessionManager, TerminalSession};

/// How long the message loop waits for the next inbound frame before
/// re-checking whether the session is still running.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Settle delay before sending the kickoff prompt, giving the agent time
/// to finish its own startup. Heuristic - there is no readiness signal to
/// wait on.
const AGENT_SETTLE_DELAY: Duration = Duration::from_secs(2);
const KICKOFF_PAUSE: Duration = Duration::from_secs(1);

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub settings: Arc<Settings>,
    pub projects_dir: PathBuf,
}

/// Create router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/terminals", get(list_terminals))
        .route("/ws/terminal/:project_id/:agent", get(terminal_websocket))
        .with_state(state)
}

/// GET /health - liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "terminal": "available",
    }))
}

/// GET /api/terminals - list active terminal sessions.
async fn list_terminals(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.session_manager.list().await;
    Json(serde_json::json!({ "sessions": sessions }))
}

/// GET /ws/terminal/:project_id/:agent - WebSocket endpoint.
async fn terminal_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((project_id, agent)): Path<(String, String)>,
) -> Response {
    ws.on_upgrade(move |socket| handle_terminal_socket(socket, state, project_id, agent))
}

/// Bridge one WebSocket client to one terminal session for its lifetime.
///
/// Every exit path - kill message, disconnect, the child exiting, or an
/// unexpected error - converges on one teardown call at the end.
async fn handle_terminal_socket(
    socket: WebSocket,
    state: AppState,
    project_id: String,
    agent: String,
) {
    let session_id = session_key(&project_id, &agent);

    // Each project gets a working directory at a predictable path,
    // created on demand.
    let working_dir = state.projects_dir.join(&project_id);
    if let Err(e) = tokio::fs::create_dir_all(&working_dir).await {
        // The spawn falls back to the server's current directory
        warn!(%session_id, "could not create working directory: {}", e);
    }

    let model_config = state.settings.model_config();
    let extra_env = model_env(&agent, &model_config);

    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Drain outbound messages to the socket until either side goes away
    let send_task = tokio::spawn(async move {
        while let Some(message) = client_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if ws_sink.send(WsMessage::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let _ = client_tx.send(ServerMessage::Status {
        status: SessionStatus::Connecting,
        session_id: Some(session_id.clone()),
        agent: Some(agent.clone()),
        running: None,
        message: None,
        model_config: None,
    });

    let session = match state
        .session_manager
        .create(&project_id, &agent, client_tx.clone(), &working_dir, extra_env)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            error!(%session_id, "failed to create terminal session: {:#}", e);
            let _ = client_tx.send(ServerMessage::Error {
                message: format!("failed to start terminal: {e}"),
            });
            send_task.abort();
            return;
        }
    };

    let _ = client_tx.send(ServerMessage::Status {
        status: SessionStatus::Connected,
        session_id: Some(session_id.clone()),
        agent: Some(agent.clone()),
        running: Some(true),
        message: None,
        model_config: Some(ModelReport {
            model: model_config.model_name().map(str::to_string),
            has_api_key: model_config.has_api_key(),
        }),
    });

    maybe_kickoff(&session, &agent, &client_tx).await;

    run_message_loop(&state, &session, &mut ws_stream, &client_tx).await;

    // Single guaranteed teardown, idempotent against a kill that already
    // ran inside the loop
    state.session_manager.destroy(&session.session_id).await;
    send_task.abort();
}

/// Send the autonomous kickoff prompt to agents that have one registered.
///
/// The delays are a heuristic: the agent gets a settle window after spawn
/// and another short pause before the prompt, with no acknowledgment that
/// it actually finished initializing.
async fn maybe_kickoff(session: &Arc<TerminalSession>, agent: &str, client: &ClientSender) {
    let Some(prompt) = kickoff_prompt(agent) else {
        return;
    };

    tokio::time::sleep(AGENT_SETTLE_DELAY).await;
    if !session.is_running() {
        return;
    }
    tokio::time::sleep(KICKOFF_PAUSE).await;

    session.send_command(prompt);
    let _ = client.send(ServerMessage::Status {
        status: SessionStatus::Autonomous,
        session_id: None,
        agent: None,
        running: None,
        message: Some(format!("{agent} started in autonomous mode")),
        model_config: None,
    });
}

/// Whether the message loop should keep going after a dispatch.
#[derive(Debug, PartialEq)]
enum LoopControl {
    Continue,
    Exit,
}

/// Receive loop: dispatch inbound frames until disconnect, kill, or the
/// session stopping on its own.
async fn run_message_loop(
    state: &AppState,
    session: &Arc<TerminalSession>,
    ws_stream: &mut SplitStream<WebSocket>,
    client: &ClientSender,
) {
    while session.is_running() {
        let frame = match timeout(RECEIVE_TIMEOUT, ws_stream.next()).await {
            // Timeout: loop around and re-check the running flag
            Err(_) => continue,
            // Socket closed or errored: treat both as disconnect
            Ok(None) | Ok(Some(Err(_))) => break,
            Ok(Some(Ok(frame))) => frame,
        };

        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            // Binary and control frames are not part of the protocol
            _ => continue,
        };

        let message = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => message,
            Err(e) => {
                // Never terminate the connection over a parse error
                debug!(session_id = %session.session_id, "ignoring malformed frame: {}", e);
                continue;
            }
        };

        if dispatch_client_message(state, session, client, message).await == LoopControl::Exit {
            break;
        }
    }
}

/// Translate one client message into a session operation.
async fn dispatch_client_message(
    state: &AppState,
    session: &Arc<TerminalSession>,
    client: &ClientSender,
    message: ClientMessage,
) -> LoopControl {
    match message {
        ClientMessage::Input { data } => session.write_input(data.as_bytes()),
        ClientMessage::Command { command } => session.send_command(&command),
        ClientMessage::Resize { cols, rows } => session.resize(cols, rows),
        ClientMessage::Stop => session.interrupt(),
        ClientMessage::Signal { signal } => session.signal(signal),
        ClientMessage::Kill => {
            state.session_manager.destroy(&session.session_id).await;
            return LoopControl::Exit;
        }
        ClientMessage::Ping => {
            let _ = client.send(ServerMessage::Pong);
        }
    }
    LoopControl::Continue
}
