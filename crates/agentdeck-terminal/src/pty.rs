use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize, PtySystem, SlavePty};
use tracing::{debug, warn};

use super::KILL_GRACE;

/// A child process attached to a pseudo-terminal.
///
/// Owns the process handle and the master side of the pty. The reader
/// handle returned from [`PtyProcess::spawn`] is the only way output leaves
/// the terminal; everything else goes through this struct.
pub struct PtyProcess {
    child: Mutex<Box<dyn Child + Send + Sync>>,
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    pid: Option<u32>,
}

impl PtyProcess {
    /// Spawn `program` with `args` attached to a fresh pseudo-terminal.
    ///
    /// The caller-supplied environment is layered over the inherited one,
    /// after the terminal capability variables, so callers can override
    /// them. A working directory that does not exist is logged and skipped
    /// rather than failing the spawn - the process still starts in the
    /// server's current directory and the user sees a live shell instead of
    /// an opaque connection error.
    pub fn spawn(
        program: &str,
        args: &[String],
        env: &[(String, String)],
        working_dir: &Path,
        cols: u16,
        rows: u16,
    ) -> Result<(Self, Box<dyn Read + Send>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("failed to allocate pseudo-terminal")?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        cmd.env("FORCE_COLOR", "1");
        for (key, value) in env {
            cmd.env(key, value);
        }

        if working_dir.is_dir() {
            cmd.cwd(working_dir);
        } else {
            warn!(
                working_dir = %working_dir.display(),
                "working directory unusable, starting in current directory"
            );
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("failed to spawn '{}'", program))?;
        let pid = child.process_id();

        let reader = pair
            .master
            .try_clone_reader()
            .context("failed to clone pty reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("failed to take pty writer")?;

        // The slave side belongs to the child now; dropping our copy makes
        // EOF on the master observable once the child exits.
        drop(pair.slave);

        Ok((
            Self {
                child: Mutex::new(child),
                master: Mutex::new(Some(pair.master)),
                writer: Mutex::new(Some(writer)),
                pid,
            },
            reader,
        ))
    }

    /// OS process id of the child, if the platform reports one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Write raw bytes to the terminal's input side.
    ///
    /// No-op once the writer has been closed by termination. The pty input
    /// buffer provides the only backpressure.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        if let Some(writer) = writer.as_mut() {
            writer.write_all(bytes)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Change the terminal geometry.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let master = self.master.lock().unwrap();
        if let Some(master) = master.as_ref() {
            master.resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })?;
        }
        Ok(())
    }

    /// Deliver an OS signal to the child. Swallowed if the process has
    /// already exited.
    #[cfg(unix)]
    pub fn signal(&self, signo: i32) {
        if let Some(pid) = self.pid {
            let rc = unsafe { libc::kill(pid as libc::pid_t, signo) };
            if rc != 0 {
                debug!(pid, signo, "signal not delivered (process gone)");
            }
        }
    }

    #[cfg(not(unix))]
    pub fn signal(&self, _signo: i32) {
        use portable_pty::ChildKiller;
        let mut child = self.child.lock().unwrap();
        if let Err(e) = child.kill() {
            debug!("kill failed: {}", e);
        }
    }

    /// Write the interrupt control byte (ETX, Ctrl-C) through the pty.
    ///
    /// The line discipline delivers SIGINT to the foreground process
    /// group, the way a real terminal does - not a direct `kill(2)` on the
    /// child pid.
    pub fn interrupt(&self) -> Result<()> {
        self.write_bytes(b"\x03")
    }

    /// Non-blocking exit check. Returns the exit code once the child has
    /// exited, tolerating an already-reaped process.
    pub fn try_wait(&self) -> Option<u32> {
        let mut child = self.child.lock().unwrap();
        match child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            Ok(None) => None,
            // wait failed - the process is already gone
            Err(e) => {
                debug!("try_wait failed: {}", e);
                Some(0)
            }
        }
    }

    /// Graceful-then-forceful termination.
    ///
    /// SIGTERM, a fixed grace window, SIGKILL, close the master side, then
    /// a non-blocking reap. Every step tolerates an already-dead process,
    /// so calling this twice is harmless.
    pub async fn terminate(&self) {
        #[cfg(unix)]
        {
            self.signal(libc::SIGTERM);
            tokio::time::sleep(KILL_GRACE).await;
            self.signal(libc::SIGKILL);
        }
        #[cfg(not(unix))]
        {
            self.signal(0);
            tokio::time::sleep(KILL_GRACE).await;
        }

        // Closing the writer and master unblocks any reader still parked
        // on the old descriptor.
        self.writer.lock().unwrap().take();
        self.master.lock().unwrap().take();

        let _ = self.try_wait();
    }
}
