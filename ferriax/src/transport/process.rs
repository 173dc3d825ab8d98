//! Child process on a pseudo-terminal, using portable-pty.

use std::io::{ErrorKind, Read, Write};
use std::sync::Mutex;
use std::thread;

use log::{debug, trace, warn};
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};

use super::config::SpawnOptions;
use crate::error::{ChannelError, SpawnError};

const READ_CHUNK: usize = 4096;

/// Result of waiting for the next chunk of child output.
#[derive(Debug)]
pub(crate) enum Chunk {
    /// Raw bytes read from the PTY.
    Data(Vec<u8>),
    /// The child closed its side of the terminal.
    Eof,
    /// The deadline elapsed before any byte arrived.
    Deadline,
}

/// A child process attached to a pseudo-terminal.
///
/// PTY reads are blocking, so a dedicated thread pumps raw chunks into an
/// unbounded channel. Everything else (buffering, matching, deadlines) is
/// done by the caller.
pub struct PtyProcess {
    /// The spawned child. Behind a mutex so liveness can be queried through `&self`.
    child: Mutex<Box<dyn Child + Send + Sync>>,

    /// Master side of the PTY, kept open for the lifetime of the process.
    _master: Box<dyn MasterPty + Send>,

    /// Writer to the child's terminal (`None` once closed).
    writer: Option<Box<dyn Write + Send>>,

    /// Raw output chunks from the pump thread.
    output_rx: mpsc::UnboundedReceiver<Vec<u8>>,

    /// Set once the pump thread reported end-of-stream.
    eof: bool,

    /// Program name, for log messages.
    program: String,
}

impl PtyProcess {
    /// Launch the child described by `options` on a fresh PTY.
    pub fn spawn(options: &SpawnOptions) -> Result<Self, SpawnError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: options.terminal_height,
                cols: options.terminal_width,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SpawnError::PtyOpenFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&options.program);
        cmd.args(&options.args);
        if let Some(ref cwd) = options.cwd {
            cmd.cwd(cwd);
        }
        cmd.env("TERM", "dumb");
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SpawnError::LaunchFailed {
                program: options.program.clone(),
                message: e.to_string(),
            })?;

        // Only the child may hold the slave, otherwise EOF is never observed.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SpawnError::AttachFailed(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SpawnError::AttachFailed(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name(format!("ferriax-pty-{}", options.program))
            .spawn(move || pump(reader, tx))
            .map_err(|e| SpawnError::AttachFailed(e.to_string()))?;

        debug!(
            "spawned '{}' (pid {:?})",
            options.command_line(),
            child.process_id()
        );

        Ok(Self {
            child: Mutex::new(child),
            _master: pair.master,
            writer: Some(writer),
            output_rx: rx,
            eof: false,
            program: options.program.clone(),
        })
    }

    /// Write raw bytes to the child's terminal and flush.
    pub fn write(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        let writer = self.writer.as_mut().ok_or(ChannelError::Closed)?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }

    /// Wait for the next output chunk until `deadline`.
    pub(crate) async fn next_chunk(&mut self, deadline: Instant) -> Chunk {
        if self.eof {
            return Chunk::Eof;
        }

        match timeout_at(deadline, self.output_rx.recv()).await {
            Ok(Some(data)) => Chunk::Data(data),
            Ok(None) => {
                debug!("'{}' closed its terminal", self.program);
                self.eof = true;
                Chunk::Eof
            }
            Err(_) => Chunk::Deadline,
        }
    }

    /// Process id of the child, if known.
    pub fn process_id(&self) -> Option<u32> {
        self.child.lock().ok().and_then(|child| child.process_id())
    }

    /// Returns `true` while the child runs and its terminal stream is open.
    pub fn is_alive(&self) -> bool {
        if self.eof || self.writer.is_none() {
            return false;
        }
        match self.child.lock() {
            Ok(mut child) => matches!(child.try_wait(), Ok(None)),
            Err(_) => false,
        }
    }

    /// Terminate the child if it is still running. Idempotent.
    pub fn kill(&mut self) {
        if self.writer.take().is_none() {
            return;
        }

        let Ok(mut child) = self.child.lock() else {
            return;
        };
        if let Ok(None) = child.try_wait() {
            debug!("killing '{}'", self.program);
            if let Err(e) = child.kill() {
                warn!("failed to kill '{}': {}", self.program, e);
            }
        }
        if let Err(e) = child.wait() {
            trace!("wait on '{}' failed: {}", self.program, e);
        }
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Forward PTY output to the channel until the terminal closes.
fn pump(mut reader: Box<dyn Read + Send>, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // Linux reports EIO once the slave side is gone.
            Err(e) => {
                trace!("pty read ended: {}", e);
                break;
            }
        }
    }
}
