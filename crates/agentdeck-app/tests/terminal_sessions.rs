//! Session lifecycle tests driving the registry the way the WebSocket
//! handler does, with a channel standing in for the client connection.

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use agentdeck::web::protocol::{ServerMessage, SessionStatus};
use agentdeck::web::session_manager::{session_key, SessionManager};

/// Accumulate output messages until `needle` shows up or the deadline
/// passes. Returns everything collected either way.
async fn output_until(
    rx: &mut UnboundedReceiver<ServerMessage>,
    needle: &str,
    deadline: Duration,
) -> String {
    let end = tokio::time::Instant::now() + deadline;
    let mut collected = String::new();
    while tokio::time::Instant::now() < end {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(ServerMessage::Output { data })) => {
                collected.push_str(&data);
                if collected.contains(needle) {
                    break;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {}
        }
    }
    collected
}

async fn saw_ended_status(rx: &mut UnboundedReceiver<ServerMessage>, deadline: Duration) -> bool {
    let end = tokio::time::Instant::now() + deadline;
    while tokio::time::Instant::now() < end {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(ServerMessage::Status { status, running, .. })) => {
                if status == SessionStatus::Ended && running == Some(false) {
                    return true;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(_) => {}
        }
    }
    false
}

#[tokio::test]
async fn echo_command_round_trips() {
    let manager = SessionManager::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let session = manager
        .create("p1", "bash", tx, Path::new("."), Vec::new())
        .await
        .unwrap();

    session.send_command("echo hello");
    let output = output_until(&mut rx, "hello", Duration::from_secs(10)).await;
    assert!(output.contains("hello"), "got: {output:?}");

    manager.destroy(&session.session_id).await;
}

#[tokio::test]
async fn output_arrives_in_order() {
    let manager = SessionManager::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let session = manager
        .create("p-order", "bash", tx, Path::new("."), Vec::new())
        .await
        .unwrap();

    session.send_command("for i in 1 2 3 4 5; do echo marker-$i; done");
    let output = output_until(&mut rx, "marker-5", Duration::from_secs(10)).await;

    let positions: Vec<usize> = (1..=5)
        .map(|i| {
            output
                .find(&format!("marker-{i}"))
                .unwrap_or_else(|| panic!("marker-{i} missing from {output:?}"))
        })
        .collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "reordered output: {output:?}"
    );

    manager.destroy(&session.session_id).await;
}

#[tokio::test]
async fn same_identity_replacement_leaves_one_live_session() {
    let manager = SessionManager::new();
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, _rx2) = mpsc::unbounded_channel();

    let first = manager
        .create("p2", "bash", tx1, Path::new("."), Vec::new())
        .await
        .unwrap();
    let first_pid = first.pid();
    assert!(first.is_running());

    let second = manager
        .create("p2", "bash", tx2, Path::new("."), Vec::new())
        .await
        .unwrap();

    // The old session was fully torn down before the new spawn
    assert!(!first.is_running());
    assert!(saw_ended_status(&mut rx1, Duration::from_secs(2)).await);
    assert!(first_pid.is_some());
    assert_ne!(first_pid, second.pid());

    let sessions = manager.list().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, session_key("p2", "bash"));
    assert!(sessions[0].running);

    manager.destroy(&second.session_id).await;
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let manager = SessionManager::new();
    let (tx, _rx) = mpsc::unbounded_channel();

    let session = manager
        .create("p3", "bash", tx, Path::new("."), Vec::new())
        .await
        .unwrap();
    let id = session.session_id.clone();

    manager.destroy(&id).await;
    // Second call must be a clean no-op
    manager.destroy(&id).await;

    assert!(manager.get(&id).await.is_none());
    assert!(manager.list().await.is_empty());
    // And destroying an identity that never existed is fine too
    manager.destroy("ghost-project_bash").await;
}

#[tokio::test]
async fn killed_identity_is_immediately_recreatable() {
    let manager = SessionManager::new();
    let (tx1, _rx1) = mpsc::unbounded_channel();

    let session = manager
        .create("p4", "bash", tx1, Path::new("."), Vec::new())
        .await
        .unwrap();
    let id = session.session_id.clone();

    manager.destroy(&id).await;
    assert!(manager.list().await.iter().all(|s| s.session_id != id));

    let (tx2, _rx2) = mpsc::unbounded_channel();
    let replacement = manager
        .create("p4", "bash", tx2, Path::new("."), Vec::new())
        .await
        .unwrap();
    assert!(replacement.is_running());
    assert_eq!(replacement.session_id, id);

    manager.destroy(&id).await;
}

#[tokio::test]
async fn unknown_agent_starts_fallback_shell_with_hint() {
    let manager = SessionManager::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // The session must still start rather than failing the connection
    let session = manager
        .create("p5", "ghost", tx, Path::new("."), Vec::new())
        .await
        .unwrap();

    let output = output_until(&mut rx, "not installed", Duration::from_secs(10)).await;
    assert!(output.contains("Agent 'ghost' is not installed"), "got: {output:?}");
    assert!(output.contains("Install the ghost CLI"), "got: {output:?}");

    manager.destroy(&session.session_id).await;
}

#[tokio::test]
async fn exiting_process_flips_running_and_announces_ended() {
    let manager = SessionManager::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let session = manager
        .create("p6", "bash", tx, Path::new("."), Vec::new())
        .await
        .unwrap();

    session.send_command("exit 0");
    assert!(saw_ended_status(&mut rx, Duration::from_secs(10)).await);
    assert!(!session.is_running());

    // Input after the session ended is a silent no-op
    session.write_input(b"echo ignored\n");

    manager.destroy(&session.session_id).await;
}

#[tokio::test]
async fn resize_never_raises() {
    let manager = SessionManager::new();
    let (tx, _rx) = mpsc::unbounded_channel();

    let session = manager
        .create("p7", "bash", tx, Path::new("."), Vec::new())
        .await
        .unwrap();

    session.resize(120, 40);
    session.resize(0, 0);
    session.resize(1, 1);
    assert!(session.is_running());

    // The session is still listed and usable after degenerate geometry
    assert!(manager
        .list()
        .await
        .iter()
        .any(|s| s.session_id == session.session_id && s.running));

    manager.destroy(&session.session_id).await;
}

#[tokio::test]
async fn extra_env_reaches_the_agent_process() {
    let manager = SessionManager::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let session = manager
        .create(
            "p8",
            "bash",
            tx,
            Path::new("."),
            vec![("AGENTDECK_TEST_VAR".to_string(), "via-registry".to_string())],
        )
        .await
        .unwrap();

    session.send_command("printf '%s\\n' \"probe=$AGENTDECK_TEST_VAR\"");
    let output = output_until(&mut rx, "probe=via-registry", Duration::from_secs(10)).await;
    assert!(output.contains("probe=via-registry"), "got: {output:?}");

    manager.destroy(&session.session_id).await;
}
