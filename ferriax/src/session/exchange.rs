//! Result and error records of a single exchange.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::channel::MatchOutcome;

/// A completed exchange: one command written, one prompt matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// The line that was written (empty for `wait_for_prompt`).
    pub command: String,

    /// Output with the command echo removed.
    pub output: String,

    /// Output exactly as captured, echo included.
    pub raw_output: String,

    /// The prompt that ended the exchange.
    pub prompt: String,

    /// The prompt current when the command was written.
    pub issued_at: Option<String>,

    /// Time between writing the command and matching the prompt.
    pub elapsed: Duration,
}

impl Exchange {
    /// Get the output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Check if the output contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.output.contains(pattern)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.output)
    }
}

/// Why an exchange failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The child closed its terminal before printing a prompt
    #[error("EOF encountered.")]
    EndOfStream,

    /// No prompt within the deadline
    #[error("Timeout.")]
    Timeout,

    /// Writing to the child failed
    #[error("Write failed: {0}")]
    Write(String),

    /// The session is not in the running state
    #[error("Session not running.")]
    NotRunning,

    /// Staging input on disk failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Which operation an error was recorded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    Start,
    LineInput,
    BlockInput,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorContext::Start => "Start",
            ErrorContext::LineInput => "Line input",
            ErrorContext::BlockInput => "Block input",
        };
        f.write_str(label)
    }
}

/// Error recorded on a session by a failed operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error: {context}: {kind}")]
pub struct SessionError {
    pub kind: ErrorKind,
    pub context: ErrorContext,

    /// Output received before the failure, if any.
    pub partial_output: Option<String>,
}

impl SessionError {
    /// Create an error without partial output.
    pub fn new(kind: ErrorKind, context: ErrorContext) -> Self {
        Self {
            kind,
            context,
            partial_output: None,
        }
    }

    /// Map a failed match outcome to an error. Returns `None` for a match.
    pub(crate) fn from_outcome(outcome: MatchOutcome, context: ErrorContext) -> Option<Self> {
        let (kind, partial) = match outcome {
            MatchOutcome::Matched { .. } => return None,
            MatchOutcome::EndOfStream { before } => (ErrorKind::EndOfStream, before),
            MatchOutcome::TimedOut { partial } => (ErrorKind::Timeout, partial),
        };
        Some(Self {
            kind,
            context,
            partial_output: Some(partial).filter(|p| !p.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let cases = [
            (
                ErrorKind::EndOfStream,
                ErrorContext::LineInput,
                "Error: Line input: EOF encountered.",
            ),
            (
                ErrorKind::Timeout,
                ErrorContext::BlockInput,
                "Error: Block input: Timeout.",
            ),
            (
                ErrorKind::EndOfStream,
                ErrorContext::Start,
                "Error: Start: EOF encountered.",
            ),
            (
                ErrorKind::NotRunning,
                ErrorContext::LineInput,
                "Error: Line input: Session not running.",
            ),
        ];
        for (kind, context, message) in cases {
            assert_eq!(SessionError::new(kind, context).to_string(), message);
        }
    }

    #[test]
    fn test_from_outcome() {
        let matched = MatchOutcome::Matched {
            index: 0,
            before: String::new(),
            matched: "(1) -> ".to_string(),
        };
        assert_eq!(SessionError::from_outcome(matched, ErrorContext::Start), None);

        let timed_out = MatchOutcome::TimedOut {
            partial: "half".to_string(),
        };
        let error = SessionError::from_outcome(timed_out, ErrorContext::LineInput).unwrap();
        assert_eq!(error.kind, ErrorKind::Timeout);
        assert_eq!(error.partial_output.as_deref(), Some("half"));

        let eof = MatchOutcome::EndOfStream {
            before: String::new(),
        };
        let error = SessionError::from_outcome(eof, ErrorContext::BlockInput).unwrap();
        assert_eq!(error.kind, ErrorKind::EndOfStream);
        assert_eq!(error.partial_output, None);
    }

    #[test]
    fn test_exchange_display() {
        let exchange = Exchange {
            command: "1+1".to_string(),
            output: "   (1)  2\n".to_string(),
            raw_output: "1+1\n   (1)  2\n".to_string(),
            prompt: "(2) -> ".to_string(),
            issued_at: Some("(1) -> ".to_string()),
            elapsed: Duration::from_millis(3),
        };
        assert_eq!(exchange.to_string(), "   (1)  2\n");
        assert!(exchange.contains("(1)"));
        assert_eq!(exchange.lines().count(), 1);
    }
}
