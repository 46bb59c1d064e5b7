use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

use agentdeck_agents::{resolve_command, static_env};
use agentdeck_terminal::{
    PtyProcess, DEFAULT_COLS, DEFAULT_ROWS, IDLE_SLEEP, POLL_TIMEOUT, READ_CHUNK_SIZE,
};

use crate::web::protocol::{ServerMessage, SessionStatus, SessionSummary};

/// Outbound half of the client connection. The session borrows it for its
/// lifetime; sends are best-effort and a gone client never raises.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// Deterministic session identity: one live session per (project, agent).
pub fn session_key(project_id: &str, agent: &str) -> String {
    format!("{}_{}", project_id, agent)
}

/// One pseudo-terminal-backed agent process bound to one client connection.
pub struct TerminalSession {
    pub session_id: String,
    pub project_id: String,
    pub agent: String,
    process: PtyProcess,
    client: ClientSender,
    running: AtomicBool,
    ended_notified: AtomicBool,
    size: Mutex<(u16, u16)>,
    created_at: DateTime<Utc>,
}

impl TerminalSession {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// OS process id of the child, if known.
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Best-effort send to the bound client. Returns false once the client
    /// is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.client.send(message).is_ok()
    }

    /// Write raw bytes to the terminal input. No-op once the session is no
    /// longer running.
    pub fn write_input(&self, data: &[u8]) {
        if !self.is_running() {
            return;
        }
        if let Err(e) = self.process.write_bytes(data) {
            debug!(session_id = %self.session_id, "input write failed: {}", e);
        }
    }

    /// Write `text` plus a newline, as if the user pressed enter.
    pub fn send_command(&self, text: &str) {
        let mut line = text.to_string();
        line.push('\n');
        self.write_input(line.as_bytes());
    }

    /// Update terminal geometry. Cosmetic - failures are logged and
    /// swallowed, never fatal to the session.
    pub fn resize(&self, cols: u16, rows: u16) {
        if let Err(e) = self.process.resize(cols, rows) {
            debug!(session_id = %self.session_id, cols, rows, "resize failed: {}", e);
            return;
        }
        *self.size.lock().unwrap() = (cols, rows);
    }

    /// Deliver an OS signal to the child. Swallowed if it already exited.
    pub fn signal(&self, signo: i32) {
        if self.is_running() {
            self.process.signal(signo);
        }
    }

    /// Send Ctrl-C through the pty, the way a real terminal interrupts.
    pub fn interrupt(&self) {
        if !self.is_running() {
            return;
        }
        if let Err(e) = self.process.interrupt() {
            debug!(session_id = %self.session_id, "interrupt failed: {}", e);
        }
    }

    fn process_exited(&self) -> bool {
        self.process.try_wait().is_some()
    }

    /// Announce the ended state to the client exactly once, whether the
    /// reader exited on its own or teardown cancelled it. Best-effort -
    /// the client may already be gone.
    fn notify_ended(&self) {
        if self.ended_notified.swap(true, Ordering::SeqCst) {
            return;
        }
        let sent = self.send(ServerMessage::Status {
            status: SessionStatus::Ended,
            session_id: Some(self.session_id.clone()),
            agent: None,
            running: Some(false),
            message: Some("Session ended".to_string()),
            model_config: None,
        });
        if !sent {
            debug!(session_id = %self.session_id, "session ended after client disconnect");
        }
    }

    fn summary(&self) -> SessionSummary {
        let (cols, rows) = *self.size.lock().unwrap();
        SessionSummary {
            session_id: self.session_id.clone(),
            project_id: self.project_id.clone(),
            agent: self.agent.clone(),
            running: self.is_running(),
            cols,
            rows,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// Registry of live terminal sessions.
///
/// Owned by the composition root and shared behind an `Arc`; the handler
/// that creates and destroys entries and the status endpoint that lists
/// them go through here. At most one live session exists per identity.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<TerminalSession>>>,
    reader_tasks: tokio::sync::Mutex<HashMap<String, JoinHandle<()>>>,
    /// Serializes create/destroy so a replacement never overlaps the
    /// teardown of its predecessor.
    lifecycle: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            reader_tasks: tokio::sync::Mutex::new(HashMap::new()),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a session for `(project_id, agent)`, fully tearing down any
    /// existing session with the same identity first - the old process is
    /// confirmed gone before the new one is spawned.
    ///
    /// Spawns the agent command (or its fallback shell), registers the
    /// session, and starts its output reader task.
    pub async fn create(
        &self,
        project_id: &str,
        agent: &str,
        client: ClientSender,
        working_dir: &Path,
        extra_env: Vec<(String, String)>,
    ) -> Result<Arc<TerminalSession>> {
        let _guard = self.lifecycle.lock().await;
        let session_id = session_key(project_id, agent);

        self.destroy_inner(&session_id).await;

        let command = resolve_command(agent);
        let mut env: Vec<(String, String)> = static_env(agent)
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env.extend(extra_env);

        let (process, reader) = PtyProcess::spawn(
            &command.program,
            &command.args,
            &env,
            working_dir,
            DEFAULT_COLS,
            DEFAULT_ROWS,
        )?;

        let session = Arc::new(TerminalSession {
            session_id: session_id.clone(),
            project_id: project_id.to_string(),
            agent: agent.to_string(),
            process,
            client,
            running: AtomicBool::new(true),
            ended_notified: AtomicBool::new(false),
            size: Mutex::new((DEFAULT_COLS, DEFAULT_ROWS)),
            created_at: Utc::now(),
        });

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::clone(&session));

        let reader_task = tokio::spawn(read_output(Arc::clone(&session), reader));
        self.reader_tasks
            .lock()
            .await
            .insert(session_id.clone(), reader_task);

        info!(
            %session_id,
            agent,
            pid = session.pid(),
            fallback = command.fallback,
            "terminal session started"
        );

        Ok(session)
    }

    /// Look up a live session. Pure read, no side effects.
    pub async fn get(&self, session_id: &str) -> Option<Arc<TerminalSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Snapshot of all live sessions. May be slightly stale relative to
    /// concurrent create/destroy - that is fine for a status surface.
    pub async fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| s.summary())
            .collect()
    }

    /// Idempotent teardown. No-op when the identity is absent; safe to call
    /// from every exit path.
    pub async fn destroy(&self, session_id: &str) {
        let _guard = self.lifecycle.lock().await;
        self.destroy_inner(session_id).await;
    }

    async fn destroy_inner(&self, session_id: &str) {
        let session = self.sessions.write().await.remove(session_id);
        let reader_task = self.reader_tasks.lock().await.remove(session_id);

        let Some(session) = session else {
            if let Some(task) = reader_task {
                task.abort();
            }
            return;
        };

        session.set_running(false);

        // Cancel the reader before closing the descriptor so it can never
        // observe a read-after-close.
        if let Some(task) = reader_task {
            task.abort();
        }

        session.process.terminate().await;
        session.notify_ended();

        info!(session_id, "terminal session destroyed");
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Output reader task: one per session.
///
/// Blocking pty reads happen on a bridge thread feeding a channel; this
/// task forwards chunks to the client and watches for the child exiting
/// with no further output. It only flips the running flag on exit - full
/// teardown stays with the connection handler, so the two never race over
/// the registry.
async fn read_output(session: Arc<TerminalSession>, mut reader: Box<dyn Read + Send>) {
    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    std::thread::spawn(move || {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                // EOF, or the master side was closed under us
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if chunk_tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        if !session.is_running() {
            break;
        }

        match timeout(POLL_TIMEOUT, chunk_rx.recv()).await {
            Ok(Some(chunk)) => {
                let data = String::from_utf8_lossy(&chunk).to_string();
                if !session.send(ServerMessage::Output { data }) {
                    debug!(session_id = %session.session_id, "client gone, reader stopping");
                    break;
                }
            }
            // Bridge thread hit EOF
            Ok(None) => break,
            Err(_) => {
                // No data inside the poll window: a silent child may still
                // have exited, which must be detected and collected.
                if session.process_exited() {
                    break;
                }
            }
        }

        tokio::time::sleep(IDLE_SLEEP).await;
    }

    session.set_running(false);
    session.notify_ended();
}
