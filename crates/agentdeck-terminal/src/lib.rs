// Pseudo-terminal process layer
//
// This crate owns the child-process-plus-pty capability: spawning a command
// attached to a pseudo-terminal, writing input, resizing, delivering signals,
// and graceful-then-forceful termination. Streaming and session bookkeeping
// live above it in the application.

mod pty;

// Re-export public API
pub use pty::PtyProcess;

use std::time::Duration;

// Constants
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Upper bound on a single read from the pty master.
pub const READ_CHUNK_SIZE: usize = 4096;

/// How long the output reader waits for data before checking whether the
/// child has exited.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Idle sleep between reader iterations, bounding CPU when nothing happens.
pub const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Grace window between SIGTERM and SIGKILL during termination.
pub const KILL_GRACE: Duration = Duration::from_millis(100);
