use serde::{Deserialize, Serialize};

use agentdeck_terminal::{DEFAULT_COLS, DEFAULT_ROWS};

/// Interrupt-equivalent signal number, the default for `signal` frames.
pub const DEFAULT_SIGNAL: i32 = 2; // SIGINT

/// Messages sent from client to server.
///
/// The discriminator is the `type` field; remaining fields sit flat beside
/// it, matching what xterm.js-style frontends send. Unknown or malformed
/// frames are dropped by the handler, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Raw keystroke bytes for the child.
    Input { data: String },
    /// Full command, newline appended by the server.
    Command { command: String },
    /// Terminal geometry update.
    Resize {
        #[serde(default = "default_cols")]
        cols: u16,
        #[serde(default = "default_rows")]
        rows: u16,
    },
    /// Send the interrupt byte (Ctrl-C) through the pty.
    Stop,
    /// Deliver an OS signal to the child process.
    Signal {
        #[serde(default = "default_signal")]
        signal: i32,
    },
    /// Terminate the session and close.
    Kill,
    /// Liveness probe; must not touch the process.
    Ping,
}

fn default_cols() -> u16 {
    DEFAULT_COLS
}

fn default_rows() -> u16 {
    DEFAULT_ROWS
}

fn default_signal() -> i32 {
    DEFAULT_SIGNAL
}

/// Session lifecycle states announced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Connecting,
    Connected,
    Autonomous,
    Ended,
}

/// What the server knows about the configured model, reported on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: Option<String>,
    pub has_api_key: bool,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Lifecycle transition announcement.
    Status {
        status: SessionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        running: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        model_config: Option<ModelReport>,
    },
    /// Chunk of terminal output, lossily decoded as UTF-8.
    Output { data: String },
    /// Unexpected failure surfaced to the client.
    Error { message: String },
    /// Reply to a ping.
    Pong,
}

impl ServerMessage {
    /// A bare status announcement with no extra fields.
    pub fn status(status: SessionStatus) -> Self {
        ServerMessage::Status {
            status,
            session_id: None,
            agent: None,
            running: None,
            message: None,
            model_config: None,
        }
    }
}

/// Snapshot of one live session, for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub project_id: String,
    pub agent: String,
    pub running: bool,
    pub cols: u16,
    pub rows: u16,
    pub created_at: String,
}
