//! # Ferriax
//!
//! Async driver for numbered-prompt computer algebra REPLs.
//!
//! Ferriax runs an interactive system such as FriCAS or OpenAxiom on a
//! pseudo-terminal, types commands at its `(N) ->` prompt and turns the replies
//! into structured data, in the spirit of classic expect scripts.
//!
//! ## Features
//!
//! - PTY child processes via portable-pty, driven from tokio
//! - Expect-style matching with tail search over a normalized buffer
//! - Line input and block input staged through temporary files
//! - Parsing of result index, type tag and value text
//! - Rewriting of embedded `$$ ... $$` math into LaTeX/breqn
//! - Front-end framing and an optional `latex` + `dvipng` renderer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferriax::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferriax::Error> {
//!     let mut session = SessionBuilder::new("fricas").arg("-nosman").build()?;
//!
//!     if session.start().await? && session.send_line("integrate(x^2, x)").await {
//!         let value = session.typed_result()?;
//!         println!("{} : {}", value.value_text, value.type_tag);
//!     } else if let Some(error) = session.last_error() {
//!         eprintln!("{}", error);
//!     }
//!
//!     session.stop();
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod framer;
pub mod parser;
pub mod session;
pub mod transport;
pub mod typeset;

// Re-export main types for convenience
pub use channel::{MatchOutcome, PtyChannel};
pub use error::{Error, Result};
pub use framer::{ChannelTag, FormatTag, Frame, FrameEmitter, Tag};
pub use parser::{ParsedValue, ProcessedOutput, RewriteOptions};
pub use session::{
    ErrorContext, ErrorKind, Exchange, InputMode, ReadMode, Session, SessionBuilder,
    SessionConfig, SessionError, SessionState,
};
pub use transport::SpawnOptions;
pub use typeset::{Artifact, LatexToolchain, RenderOutcome, TypesetConfig, Typesetter};
