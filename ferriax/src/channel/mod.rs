//! Channel layer for pattern matching over a PTY.
//!
//! This module handles the expect-style half of a session: writing lines to
//! the child and waiting for one of several patterns, end-of-stream, or a
//! deadline.

mod buffer;
mod patterns;
mod pty;

pub use buffer::PatternBuffer;
pub use patterns::{DEFAULT_PROMPT_PATTERN, compile_prompt_pattern};
pub use pty::{MatchOutcome, PtyChannel};
