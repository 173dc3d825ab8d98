//! Child process launch configuration.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Options used to launch the child process on a pseudo-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnOptions {
    /// Executable name or path (resolved through `PATH` when relative).
    pub program: String,

    /// Initial arguments.
    pub args: Vec<String>,

    /// Working directory (inherits the parent's when `None`).
    pub cwd: Option<PathBuf>,

    /// Extra environment variables, applied in order on top of the
    /// inherited environment.
    pub env: IndexMap<String, String>,

    /// Terminal width for PTY.
    pub terminal_width: u16,

    /// Terminal height for PTY.
    pub terminal_height: u16,

    /// Appended to every line written to the child.
    pub line_terminator: String,

    /// Strip ANSI escape sequences from the child's output.
    pub strip_ansi: bool,

    /// How many bytes from the end of the buffer are searched for patterns.
    /// Zero searches the whole buffer.
    pub search_depth: usize,
}

impl SpawnOptions {
    /// Create options for the given executable with default settings.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Human readable command line, used in log messages.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            cwd: None,
            env: IndexMap::new(),
            terminal_width: 511,
            terminal_height: 24,
            line_terminator: "\n".to_string(),
            strip_ansi: true,
            search_depth: 4096,
        }
    }
}
