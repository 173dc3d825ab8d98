//! PTY channel abstraction for interactive REPL sessions.

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::patterns::first_match;
use crate::error::{ChannelError, SpawnError};
use crate::transport::{Chunk, PtyProcess, SpawnOptions};

/// Outcome of [`PtyChannel::await_match`]. Exactly one per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A pattern matched.
    Matched {
        /// Index of the pattern in the slice passed to `await_match`.
        index: usize,
        /// Output preceding the match.
        before: String,
        /// The matched text itself.
        matched: String,
    },

    /// The child closed its terminal before any pattern matched.
    EndOfStream {
        /// Everything that was buffered.
        before: String,
    },

    /// The deadline elapsed. The buffer is left untouched.
    TimedOut {
        /// Snapshot of the output received so far.
        partial: String,
    },
}

/// High-level PTY channel to a child process.
///
/// Wraps the process transport and provides pattern-based reads with a
/// deadline. Only one `await_match` can be in flight at a time; `&mut self`
/// enforces that.
pub struct PtyChannel {
    /// The child process (`None` once closed).
    process: Option<PtyProcess>,

    /// Pattern buffer for accumulating output.
    buffer: PatternBuffer,

    /// Appended to every line written.
    line_terminator: String,
}

impl PtyChannel {
    /// Spawn the child described by `options` and attach a channel to it.
    pub fn spawn(options: &SpawnOptions) -> Result<Self, SpawnError> {
        let process = PtyProcess::spawn(options)?;
        Ok(Self {
            process: Some(process),
            buffer: PatternBuffer::new(options.search_depth, options.strip_ansi),
            line_terminator: options.line_terminator.clone(),
        })
    }

    /// Write `text` followed by the line terminator.
    pub fn send_line(&mut self, text: &str) -> Result<(), ChannelError> {
        let process = self.process.as_mut().ok_or(ChannelError::Closed)?;
        trace!("send_line: {:?}", text);

        let mut line = Vec::with_capacity(text.len() + self.line_terminator.len());
        line.extend_from_slice(text.as_bytes());
        line.extend_from_slice(self.line_terminator.as_bytes());
        process.write(&line)
    }

    /// Wait until one of `patterns` matches, the stream ends, or `timeout`
    /// elapses, whichever comes first.
    ///
    /// Every pattern is re-tested against the buffer after each read. Bytes
    /// following a match stay buffered for the next call.
    pub async fn await_match(&mut self, patterns: &[Regex], timeout: Duration) -> MatchOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some((index, start, end)) = first_match(&self.buffer, patterns) {
                let (before, matched) = self.buffer.split_match(start, end);
                trace!("pattern {} matched at {}..{}", index, start, end);
                return MatchOutcome::Matched {
                    index,
                    before: String::from_utf8_lossy(&before).into_owned(),
                    matched: String::from_utf8_lossy(&matched).into_owned(),
                };
            }

            let Some(process) = self.process.as_mut() else {
                return self.end_of_stream();
            };

            match process.next_chunk(deadline).await {
                Chunk::Data(data) => {
                    trace!("read {} bytes", data.len());
                    self.buffer.extend(&data);
                }
                Chunk::Eof => return self.end_of_stream(),
                Chunk::Deadline => {
                    debug!("no match within {:?}", timeout);
                    return MatchOutcome::TimedOut {
                        partial: self.buffer.as_str_lossy().into_owned(),
                    };
                }
            }
        }
    }

    fn end_of_stream(&mut self) -> MatchOutcome {
        self.buffer.flush();
        MatchOutcome::EndOfStream {
            before: String::from_utf8_lossy(&self.buffer.take()).into_owned(),
        }
    }

    /// Returns `true` iff the child has not exited.
    pub fn is_alive(&self) -> bool {
        self.process.as_ref().is_some_and(PtyProcess::is_alive)
    }

    /// Process id of the child, if known.
    pub fn process_id(&self) -> Option<u32> {
        self.process.as_ref().and_then(PtyProcess::process_id)
    }

    /// Terminate the child if still alive. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::patterns::{DEFAULT_PROMPT_PATTERN, compile_prompt_pattern};

    fn sh(script: &str) -> SpawnOptions {
        let mut options = SpawnOptions::new("/bin/sh");
        options.args = vec!["-c".to_string(), script.to_string()];
        options
    }

    #[tokio::test]
    async fn test_matched_returns_before_and_prompt() {
        let mut channel = PtyChannel::spawn(&sh(r"printf 'Welcome\n(1) -> '; sleep 5")).unwrap();
        let prompt = compile_prompt_pattern(DEFAULT_PROMPT_PATTERN).unwrap();

        let outcome = channel.await_match(&[prompt], Duration::from_secs(10)).await;
        assert_eq!(
            outcome,
            MatchOutcome::Matched {
                index: 0,
                before: "Welcome\n".to_string(),
                matched: "(1) -> ".to_string(),
            }
        );
        assert!(channel.is_alive());
        channel.close();
        assert!(!channel.is_alive());
    }

    #[tokio::test]
    async fn test_end_of_stream() {
        let mut channel = PtyChannel::spawn(&sh("printf 'bye\n'")).unwrap();
        let prompt = compile_prompt_pattern(DEFAULT_PROMPT_PATTERN).unwrap();

        let outcome = channel.await_match(&[prompt], Duration::from_secs(10)).await;
        assert_eq!(
            outcome,
            MatchOutcome::EndOfStream {
                before: "bye\n".to_string()
            }
        );
        assert!(!channel.is_alive());
    }

    #[tokio::test]
    async fn test_timeout_respects_deadline() {
        let mut channel = PtyChannel::spawn(&sh("printf 'partial'; sleep 10")).unwrap();
        let prompt = compile_prompt_pattern(DEFAULT_PROMPT_PATTERN).unwrap();
        let timeout = Duration::from_millis(400);

        let start = std::time::Instant::now();
        let outcome = channel.await_match(&[prompt], timeout).await;
        let elapsed = start.elapsed();

        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(2));
        match outcome {
            MatchOutcome::TimedOut { partial } => assert_eq!(partial, "partial"),
            other => panic!("expected timeout, got {:?}", other),
        }
        // The child stays attached after a timeout.
        assert!(channel.is_alive());
        channel.close();
    }

    #[tokio::test]
    async fn test_send_line_after_close_fails() {
        let mut channel = PtyChannel::spawn(&sh("sleep 5")).unwrap();
        channel.close();
        channel.close();
        assert!(matches!(channel.send_line("x"), Err(ChannelError::Closed)));
    }

    #[test]
    fn test_spawn_missing_executable() {
        let result = PtyChannel::spawn(&SpawnOptions::new("/nonexistent/ferriax-repl"));
        assert!(matches!(result, Err(SpawnError::LaunchFailed { .. })));
    }
}
