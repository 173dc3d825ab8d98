//! Session controller for one interactive child.
//!
//! A [`Session`] owns one [`PtyChannel`] and walks it through
//! `Unstarted -> Running -> Stopped`. Send operations never return `Err`:
//! they return `false` and record a [`SessionError`] that stays readable
//! until the next operation overwrites it.

mod builder;
mod config;
mod exchange;

pub use builder::SessionBuilder;
pub use config::{InputMode, PATH_PLACEHOLDER, ReadMode, SessionConfig};
pub use exchange::{ErrorContext, ErrorKind, Exchange, SessionError};

use std::io::Write;
use std::path::Path;
use std::slice;
use std::time::Duration;

use log::{debug, info, warn};
use regex::bytes::Regex;
use tempfile::TempPath;
use tokio::time::Instant;

use crate::channel::{MatchOutcome, PtyChannel};
use crate::error::{ConfigError, ParseError, StartError};
use crate::parser::{
    ParsedValue, ProcessedOutput, extract_index_type_value, parse_prompt_index, process_output,
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Running,
    Stopped,
}

/// An interactive session with one child REPL.
///
/// # Example
///
/// ```rust,no_run
/// use ferriax::session::SessionBuilder;
///
/// # async fn example() -> Result<(), ferriax::Error> {
/// let mut session = SessionBuilder::new("fricas").arg("-nosman").build()?;
/// if session.start().await? && session.send_line("1+1").await {
///     let value = session.typed_result()?;
///     println!("{} : {}", value.value_text, value.type_tag);
/// }
/// session.stop();
/// # Ok(())
/// # }
/// ```
pub struct Session {
    config: SessionConfig,
    prompt_pattern: Regex,
    channel: Option<PtyChannel>,
    state: SessionState,
    mode: InputMode,
    timeout: Duration,
    banner: Option<String>,
    prompt: Option<String>,
    last: Option<Exchange>,
    error: Option<SessionError>,
    previous: Option<Exchange>,
    previous_error: Option<SessionError>,
}

impl Session {
    /// Create an unstarted session. Nothing is spawned until `start`.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        let prompt_pattern = config.validate()?;
        Ok(Self {
            prompt_pattern,
            channel: None,
            state: SessionState::Unstarted,
            mode: config.mode,
            timeout: config.timeout,
            banner: None,
            prompt: None,
            last: None,
            error: None,
            previous: None,
            previous_error: None,
            config,
        })
    }

    /// Spawn the child and wait for its first prompt.
    ///
    /// Returns `Ok(false)` if the child exits or stays silent past the
    /// timeout; the error is recorded and the session stays unstarted.
    pub async fn start(&mut self) -> Result<bool, StartError> {
        match self.state {
            SessionState::Running => return Ok(true),
            SessionState::Stopped => return Err(StartError::Stopped),
            SessionState::Unstarted => {}
        }

        info!("starting {}", self.config.spawn.command_line());
        let mut channel = PtyChannel::spawn(&self.config.spawn)?;
        let outcome = channel
            .await_match(slice::from_ref(&self.prompt_pattern), self.timeout)
            .await;

        match outcome {
            MatchOutcome::Matched {
                before, matched, ..
            } => {
                debug!("first prompt {:?}", matched);
                self.banner = Some(before);
                self.prompt = Some(matched);
                self.channel = Some(channel);
                self.state = SessionState::Running;
                self.error = None;
            }
            failed => {
                channel.close();
                if let Some(error) = SessionError::from_outcome(failed, ErrorContext::Start) {
                    warn!("{}", error);
                    self.error = Some(error);
                }
                return Ok(false);
            }
        }

        for command in self.config.init_commands.clone() {
            if !self.send_line(&command).await {
                warn!("init command {:?} failed", command);
            }
        }
        Ok(true)
    }

    /// Type one line at the prompt and wait for the next prompt.
    pub async fn send_line(&mut self, text: &str) -> bool {
        self.exchange(text, ErrorContext::LineInput).await
    }

    /// Stage `text` in a temp file and have the child read it quietly.
    ///
    /// The temp file is removed once the exchange finishes, whatever its
    /// outcome.
    pub async fn send_block(&mut self, text: &str) -> bool {
        let context = ErrorContext::BlockInput;
        if self.state != SessionState::Running {
            return self.fail(SessionError::new(ErrorKind::NotRunning, context));
        }

        let path = match self.stage_block(text) {
            Ok(path) => path,
            Err(e) => return self.fail(SessionError::new(ErrorKind::Io(e.to_string()), context)),
        };
        debug!("staged block input in {}", path.display());

        let command = self.config.read_command_for(&path, ReadMode::Quiet);
        let ok = self.exchange(&command, context).await;

        if let Err(e) = path.close() {
            warn!("failed to remove block input file: {}", e);
        }
        ok
    }

    /// Send `text` according to the current input mode.
    ///
    /// In line mode, text spanning several lines goes through block mode.
    /// Trailing line breaks are dropped so one line gets exactly one reply.
    pub async fn send(&mut self, text: &str) -> bool {
        let line = text.trim_end_matches(['\n', '\r']);
        match self.mode {
            InputMode::Block => self.send_block(text).await,
            InputMode::Line if line.contains('\n') => self.send_block(text).await,
            InputMode::Line => self.send_line(line).await,
        }
    }

    /// Have the child read an existing file.
    pub async fn send_file(&mut self, path: impl AsRef<Path>, mode: ReadMode) -> bool {
        let path = path.as_ref();
        if !path.is_file() {
            let message = format!("{} is not a file", path.display());
            return self.fail(SessionError::new(
                ErrorKind::Io(message),
                ErrorContext::BlockInput,
            ));
        }
        let command = self.config.read_command_for(path, mode);
        self.exchange(&command, ErrorContext::BlockInput).await
    }

    /// Wait for a prompt without writing anything.
    ///
    /// Lets a caller resume after a timed-out exchange.
    pub async fn wait_for_prompt(&mut self, timeout: Duration) -> bool {
        let context = ErrorContext::LineInput;
        if self.state != SessionState::Running {
            return self.fail(SessionError::new(ErrorKind::NotRunning, context));
        }
        let Some(channel) = self.channel.as_mut() else {
            return self.fail(SessionError::new(ErrorKind::NotRunning, context));
        };

        let started = Instant::now();
        let outcome = channel
            .await_match(slice::from_ref(&self.prompt_pattern), timeout)
            .await;
        self.record(String::new(), outcome, started, context)
    }

    /// Turn TeX output of results on or off.
    pub async fn set_tex_output(&mut self, on: bool) -> bool {
        self.send_line(&format!(")set output tex {}", on_off(on)))
            .await
    }

    /// Turn plain-text output of results on or off.
    pub async fn set_algebra_output(&mut self, on: bool) -> bool {
        self.send_line(&format!(")set output algebra {}", on_off(on)))
            .await
    }

    /// Start copying the child's output to `path`.
    pub async fn spool_on(&mut self, path: impl AsRef<Path>) -> bool {
        let command = format!(")spool \"{}\"", path.as_ref().display());
        self.send_line(&command).await
    }

    /// Stop copying output.
    pub async fn spool_off(&mut self) -> bool {
        self.send_line(")spool").await
    }

    /// Terminate the child. Idempotent; a stopped session cannot restart.
    pub fn stop(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            info!("stopping {}", self.config.spawn.program);
            channel.close();
        }
        self.state = SessionState::Stopped;
    }

    /// Returns `true` iff the child is running and has not closed its terminal.
    pub fn is_alive(&self) -> bool {
        self.channel.as_ref().is_some_and(PtyChannel::is_alive)
    }

    /// Check if the last operation recorded an error.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check if the last exchange captured output (empty output counts).
    pub fn has_output(&self) -> bool {
        self.last.is_some()
    }

    /// Get the lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the input mode used by `send`.
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Set the input mode used by `send`.
    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    /// Get the per-exchange timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the per-exchange timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Get the configuration the session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Text printed before the first prompt.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// The most recently matched prompt.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Output of the last exchange with the command echo removed.
    pub fn output(&self) -> Option<&str> {
        self.last.as_ref().map(|e| e.output.as_str())
    }

    /// Output of the last exchange exactly as captured.
    pub fn raw_output(&self) -> Option<&str> {
        self.last.as_ref().map(|e| e.raw_output.as_str())
    }

    /// The last successful exchange, if the last operation succeeded.
    pub fn last_exchange(&self) -> Option<&Exchange> {
        self.last.as_ref()
    }

    /// The error recorded by the last operation.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Output saved by the last `reset_output`.
    pub fn previous_output(&self) -> Option<&str> {
        self.previous.as_ref().map(|e| e.output.as_str())
    }

    /// Error saved by the last `reset_output`.
    pub fn previous_error(&self) -> Option<&SessionError> {
        self.previous_error.as_ref()
    }

    /// Move the current output and error aside.
    pub fn reset_output(&mut self) {
        self.previous = self.last.take();
        self.previous_error = self.error.take();
    }

    /// Process id of the child, while running.
    pub fn process_id(&self) -> Option<u32> {
        self.channel.as_ref().and_then(PtyChannel::process_id)
    }

    /// Number of the current prompt.
    pub fn current_index(&self) -> Result<u64, ParseError> {
        let prompt = self
            .prompt
            .as_deref()
            .ok_or_else(|| ParseError::MalformedEcho("no prompt seen yet".to_string()))?;
        parse_prompt_index(prompt)
    }

    /// Parse the typed result of the last exchange.
    ///
    /// The `(N)` echo must equal the number of the prompt the command was
    /// written at.
    pub fn typed_result(&self) -> Result<ParsedValue, ParseError> {
        let exchange = self.last.as_ref().ok_or(ParseError::NoOutput)?;
        let parsed = extract_index_type_value(&exchange.output)?;

        if let Some(issued_at) = exchange.issued_at.as_deref() {
            let expected = parse_prompt_index(issued_at)?;
            if parsed.index != expected {
                return Err(ParseError::IndexMismatch {
                    expected,
                    found: parsed.index,
                });
            }
        }
        Ok(parsed)
    }

    /// Run the output pipeline over the last exchange.
    pub fn processed_output(&self) -> Option<ProcessedOutput> {
        self.last
            .as_ref()
            .map(|e| process_output(&e.output, &self.config.rewrite))
    }

    async fn exchange(&mut self, command: &str, context: ErrorContext) -> bool {
        if self.state != SessionState::Running {
            return self.fail(SessionError::new(ErrorKind::NotRunning, context));
        }
        let Some(channel) = self.channel.as_mut() else {
            return self.fail(SessionError::new(ErrorKind::NotRunning, context));
        };

        debug!("exchange: {:?}", command);
        let started = Instant::now();
        if let Err(e) = channel.send_line(command) {
            return self.fail(SessionError::new(ErrorKind::Write(e.to_string()), context));
        }

        let outcome = channel
            .await_match(slice::from_ref(&self.prompt_pattern), self.timeout)
            .await;
        self.record(command.to_string(), outcome, started, context)
    }

    fn record(
        &mut self,
        command: String,
        outcome: MatchOutcome,
        started: Instant,
        context: ErrorContext,
    ) -> bool {
        match outcome {
            MatchOutcome::Matched {
                before, matched, ..
            } => {
                let elapsed = started.elapsed();
                debug!("prompt {:?} after {:?}", matched, elapsed);
                let issued_at = self.prompt.replace(matched.clone());
                self.last = Some(Exchange {
                    output: strip_echo(&before, &command).to_string(),
                    raw_output: before,
                    prompt: matched,
                    issued_at,
                    command,
                    elapsed,
                });
                self.error = None;
                true
            }
            failed => match SessionError::from_outcome(failed, context) {
                Some(error) => self.fail(error),
                None => false,
            },
        }
    }

    fn fail(&mut self, error: SessionError) -> bool {
        warn!("{}", error);
        self.last = None;
        self.error = Some(error);
        false
    }

    fn stage_block(&self, text: &str) -> std::io::Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder
            .prefix(&self.config.temp_prefix)
            .suffix(&self.config.temp_suffix);

        let mut file = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()?;
        Ok(file.into_temp_path())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// Remove the terminal's echo of `command` from the start of `raw`.
fn strip_echo<'a>(raw: &'a str, command: &str) -> &'a str {
    if command.is_empty() {
        return raw;
    }
    match raw.strip_prefix(command) {
        Some(rest) => rest.strip_prefix('\n').unwrap_or(rest),
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Session {
        SessionBuilder::new("/bin/sh")
            .args(["-c", script])
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    #[test]
    fn test_strip_echo() {
        assert_eq!(strip_echo("1+1\n   (1)  2\n", "1+1"), "   (1)  2\n");
        assert_eq!(strip_echo("   (1)  2\n", "1+1"), "   (1)  2\n");
        assert_eq!(strip_echo("x\n", ""), "x\n");
        assert_eq!(strip_echo("1+1", "1+1"), "");
    }

    #[tokio::test]
    async fn test_new_session_is_unstarted() {
        let mut session = sh("true");
        assert_eq!(session.state(), SessionState::Unstarted);
        assert!(!session.is_alive());
        assert!(!session.has_output());
        assert!(!session.has_error());

        assert!(!session.send_line("1+1").await);
        assert_eq!(
            session.last_error().map(|e| &e.kind),
            Some(&ErrorKind::NotRunning)
        );
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut session = sh(r"printf 'Welcome\n(1) -> '; sleep 10");
        assert!(session.start().await.unwrap());
        assert_eq!(session.banner(), Some("Welcome\n"));
        assert_eq!(session.prompt(), Some("(1) -> "));
        assert_eq!(session.current_index(), Ok(1));
        assert!(session.is_alive());

        // second start is a no-op
        assert!(session.start().await.unwrap());

        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.is_alive());
        assert!(matches!(session.start().await, Err(StartError::Stopped)));
    }

    #[tokio::test]
    async fn test_start_without_prompt() {
        let mut session = sh("printf 'no prompt here\n'");
        assert!(!session.start().await.unwrap());
        assert_eq!(session.state(), SessionState::Unstarted);

        let error = session.last_error().unwrap();
        assert_eq!(error.kind, ErrorKind::EndOfStream);
        assert_eq!(error.context, ErrorContext::Start);
        assert_eq!(error.to_string(), "Error: Start: EOF encountered.");
    }

    #[tokio::test]
    async fn test_reset_output() {
        let mut session = sh(r"printf '(1) -> '; read l; printf '(1) 7\n Type: PositiveInteger\n(2) -> '; sleep 10");
        assert!(session.start().await.unwrap());
        assert!(session.send_line("7").await);
        assert!(session.has_output());

        session.reset_output();
        assert!(!session.has_output());
        assert!(!session.has_error());
        assert_eq!(
            session.previous_output(),
            Some("(1) 7\n Type: PositiveInteger\n")
        );
        assert!(session.previous_error().is_none());
    }
}
