//! Process transport layer wrapping portable-pty.
//!
//! This module provides the low-level child process management,
//! handling PTY allocation, spawning, byte pumping and termination.

pub mod config;
mod process;

pub use config::SpawnOptions;
pub use process::PtyProcess;
pub(crate) use process::Chunk;
