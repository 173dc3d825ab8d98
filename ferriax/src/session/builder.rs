//! Builder for creating sessions.

use std::path::PathBuf;
use std::time::Duration;

use super::Session;
use super::config::{InputMode, SessionConfig};
use crate::error::ConfigError;

/// Builder for constructing sessions.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use ferriax::session::SessionBuilder;
///
/// # fn example() -> Result<(), ferriax::Error> {
/// let session = SessionBuilder::new("fricas")
///     .arg("-nosman")
///     .timeout(Duration::from_secs(60))
///     .init_command(")set output tex on")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a new session builder for the given executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            config: SessionConfig::new(program),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.spawn.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.spawn.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory of the child.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.config.spawn.cwd = Some(cwd.into());
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.spawn.env.insert(key.into(), value.into());
        self
    }

    /// Set the prompt pattern (default: `\([0-9]+\) ->`).
    pub fn prompt_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.prompt_pattern = pattern.into();
        self
    }

    /// Set the per-exchange timeout (default: 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the verbose read command template.
    pub fn read_command(mut self, template: impl Into<String>) -> Self {
        self.config.read_command = template.into();
        self
    }

    /// Set the quiet read command template used for block input.
    pub fn read_quiet_command(mut self, template: impl Into<String>) -> Self {
        self.config.read_quiet_command = template.into();
        self
    }

    /// Set the prefix and suffix of block-mode temp files.
    pub fn temp_names(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.config.temp_prefix = prefix.into();
        self.config.temp_suffix = suffix.into();
        self
    }

    /// Set the directory for block-mode temp files.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Add a command to send after the first prompt.
    pub fn init_command(mut self, command: impl Into<String>) -> Self {
        self.config.init_commands.push(command.into());
        self
    }

    /// Set the initial input mode.
    pub fn mode(mut self, mode: InputMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Wrap rewritten math in breakable equations (default: true).
    pub fn breakable_math(mut self, breakable: bool) -> Self {
        self.config.rewrite.breakable = breakable;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u16, height: u16) -> Self {
        self.config.spawn.terminal_width = width;
        self.config.spawn.terminal_height = height;
        self
    }

    /// Set how many trailing bytes the prompt search looks at (0 = all).
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.config.spawn.search_depth = depth;
        self
    }

    /// Enable or disable ANSI escape stripping.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.config.spawn.strip_ansi = strip;
        self
    }

    /// Get the configuration built so far.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Build the session.
    ///
    /// This validates the configuration but does not spawn anything. Call
    /// `start()` on the returned session to launch the child.
    pub fn build(self) -> Result<Session, ConfigError> {
        Session::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_config() {
        let builder = SessionBuilder::new("fricas")
            .arg("-nosman")
            .args(["-eval", ")quit"])
            .env("LANG", "C")
            .timeout(Duration::from_secs(5))
            .temp_names("tm_", ".input")
            .init_command(")set output tex on")
            .mode(InputMode::Block)
            .breakable_math(false)
            .terminal_size(200, 50);

        let config = builder.config();
        assert_eq!(config.spawn.args, vec!["-nosman", "-eval", ")quit"]);
        assert_eq!(config.spawn.env.get("LANG").map(String::as_str), Some("C"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.temp_prefix, "tm_");
        assert_eq!(config.init_commands, vec![")set output tex on"]);
        assert_eq!(config.mode, InputMode::Block);
        assert!(!config.rewrite.breakable);
        assert_eq!(config.spawn.terminal_width, 200);

        let session = builder.build().unwrap();
        assert_eq!(session.mode(), InputMode::Block);
        assert_eq!(session.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_build_rejects_invalid_prompt() {
        let result = SessionBuilder::new("fricas").prompt_pattern("").build();
        assert!(matches!(result, Err(ConfigError::EmptyPattern)));

        let result = SessionBuilder::new("fricas").prompt_pattern("(").build();
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }

    #[test]
    fn test_build_rejects_missing_executable() {
        let result = SessionBuilder::new("  ").build();
        assert!(matches!(result, Err(ConfigError::MissingExecutable)));
    }
}
