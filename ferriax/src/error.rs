//! Error types for ferriax.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ferriax operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Child process could not be launched
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session start errors
    #[error("Start error: {0}")]
    Start(#[from] StartError),

    /// Output parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Front-end framing errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Typesetting toolchain errors
    #[error("Typeset error: {0}")]
    Typeset(#[from] TypesetError),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while launching the child process.
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The pseudo-terminal could not be allocated
    #[error("Failed to open PTY: {0}")]
    PtyOpenFailed(String),

    /// The executable is missing or could not be started
    #[error("Failed to launch '{program}': {message}")]
    LaunchFailed { program: String, message: String },

    /// Reader or writer handle could not be obtained from the PTY
    #[error("Failed to attach to PTY: {0}")]
    AttachFailed(String),
}

/// Channel layer errors (writes to the child).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Channel closed, either by `close()` or because the child went away
    #[error("Channel closed")]
    Closed,

    /// I/O error while writing to the PTY
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors returned by `Session::start`.
#[derive(Error, Debug)]
pub enum StartError {
    /// The child could not be spawned
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The session was stopped and cannot be restarted
    #[error("Session already stopped")]
    Stopped,
}

/// Output parser errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The leading `(N)` echo or prompt index could not be located
    #[error("Malformed echo: {0}")]
    MalformedEcho(String),

    /// The child printed output without a `Type:` marker
    #[error("No typed result in output")]
    NoTypedResult,

    /// The echoed index does not belong to the prompt the command was issued at
    #[error("Echo index {found} does not match prompt index {expected}")]
    IndexMismatch { expected: u64, found: u64 },

    /// No output was captured for the last exchange
    #[error("No output captured")]
    NoOutput,
}

/// Message framer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Tag name outside both the format and the channel enumerations
    #[error("Unknown frame tag '{0}'")]
    UnknownTag(String),
}

/// Typesetting toolchain errors.
#[derive(Error, Debug)]
pub enum TypesetError {
    /// A tool exited with a non-zero status
    #[error("{tool} exited with status {exit_code}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    /// A tool could not be started at all
    #[error("Failed to run {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool did not produce the expected artifact
    #[error("Missing artifact {0}")]
    MissingArtifact(PathBuf),

    /// The toolchain did not finish in time
    #[error("Typesetting timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error while staging the source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid prompt pattern
    #[error("Invalid prompt pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Empty prompt pattern
    #[error("Prompt pattern must not be empty")]
    EmptyPattern,

    /// No executable configured
    #[error("Executable must be specified")]
    MissingExecutable,

    /// A read command template lacks the `{}` path placeholder
    #[error("Read command template '{0}' has no '{{}}' placeholder")]
    InvalidTemplate(String),
}

/// Result type alias using ferriax's Error.
pub type Result<T> = std::result::Result<T, Error>;
