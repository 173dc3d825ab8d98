//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::channel::{DEFAULT_PROMPT_PATTERN, compile_prompt_pattern};
use crate::error::ConfigError;
use crate::parser::RewriteOptions;
use crate::transport::SpawnOptions;

/// Placeholder replaced by the file path in read command templates.
pub const PATH_PLACEHOLDER: &str = "{}";

/// How `Session::send` delivers text to the child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Typed at the prompt; multi-line text falls back to block mode.
    #[default]
    Line,
    /// Always staged through a temporary file.
    Block,
}

/// Which read command template `Session::send_file` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// The child echoes each line it reads.
    Verbose,
    /// The child only prints results.
    Quiet,
}

/// Immutable configuration of one session.
///
/// Passed by value into [`Session::new`](super::Session::new); nothing reads
/// process-wide defaults after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How to launch the child.
    pub spawn: SpawnOptions,

    /// Regular expression matching the child's prompt.
    pub prompt_pattern: String,

    /// Command that makes the child read a file, `{}` is the path.
    pub read_command: String,

    /// Quiet variant of `read_command`, used for block input.
    pub read_quiet_command: String,

    /// Prefix of block-mode temp files.
    pub temp_prefix: String,

    /// Suffix of block-mode temp files.
    pub temp_suffix: String,

    /// Directory for block-mode temp files (system temp dir when `None`).
    pub temp_dir: Option<PathBuf>,

    /// Deadline for each exchange.
    pub timeout: Duration,

    /// Commands sent in line mode right after the first prompt.
    pub init_commands: Vec<String>,

    /// Initial input mode.
    pub mode: InputMode,

    /// Math rewrite settings used by `Session::processed_output`.
    pub rewrite: RewriteOptions,
}

impl SessionConfig {
    /// Create a configuration for the given executable with default settings.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            spawn: SpawnOptions::new(program),
            ..Default::default()
        }
    }

    /// Check the configuration and compile the prompt pattern.
    pub fn validate(&self) -> Result<Regex, ConfigError> {
        if self.spawn.program.trim().is_empty() {
            return Err(ConfigError::MissingExecutable);
        }
        for template in [&self.read_command, &self.read_quiet_command] {
            if !template.contains(PATH_PLACEHOLDER) {
                return Err(ConfigError::InvalidTemplate(template.clone()));
            }
        }
        compile_prompt_pattern(&self.prompt_pattern)
    }

    /// Render the read command for `path`.
    pub fn read_command_for(&self, path: &std::path::Path, mode: ReadMode) -> String {
        let template = match mode {
            ReadMode::Verbose => &self.read_command,
            ReadMode::Quiet => &self.read_quiet_command,
        };
        template.replace(PATH_PLACEHOLDER, &path.to_string_lossy())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            spawn: SpawnOptions::new("axiom"),
            prompt_pattern: DEFAULT_PROMPT_PATTERN.to_string(),
            read_command: r#")read "{}""#.to_string(),
            read_quiet_command: r#")read "{}" )quiet"#.to_string(),
            temp_prefix: "ax_".to_string(),
            temp_suffix: ".input".to_string(),
            temp_dir: None,
            timeout: Duration::from_secs(30),
            init_commands: Vec::new(),
            mode: InputMode::Line,
            rewrite: RewriteOptions::default(),
        }
    }
}
