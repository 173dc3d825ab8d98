//! Typesetting of rewritten math into images.
//!
//! The toolchain is an external collaborator: the crate only writes the
//! source, runs the tools and reports what they did. A failing tool is a
//! [`TypesetError`], never a session error.

mod latex;

pub use latex::{LatexToolchain, TypesetConfig};

use std::future::Future;
use std::path::PathBuf;

use crate::error::TypesetError;

/// What one tool invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Program that was run.
    pub tool: String,

    /// Exit status (`-1` if killed by a signal).
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,

    /// File the step was expected to produce.
    pub artifact: Option<PathBuf>,
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A rendered image plus the steps that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The image file. Owned by the caller.
    pub path: PathBuf,

    pub steps: Vec<RenderOutcome>,
}

/// Turns math markup into an image file.
pub trait Typesetter {
    /// Render `source` (a math fragment in the target dialect).
    fn render(&self, source: &str) -> impl Future<Output = Result<Artifact, TypesetError>> + Send;
}
