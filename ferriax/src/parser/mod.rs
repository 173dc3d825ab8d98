//! Output parsing for numbered-prompt REPLs.
//!
//! Pure functions over a captured output string: the typed result
//! (`(N) value` + `Type: tag`), every declared type, and the embedded
//! `$$ ... $$` math fragments with their rewrite into LaTeX.

mod math;
mod value;

pub use math::{
    RewriteOptions, extract_math_fragments, rewrite_for_target_dialect, split_on_math_fragments,
    strip_math_fragments,
};
pub use value::{
    ParsedValue, TYPE_MARKER, extract_index_type_value, extract_type_tags, parse_prompt_index,
};

use serde::{Deserialize, Serialize};

/// Output decomposed into plain text, rewritten math and declared types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedOutput {
    /// Output with the math fragments removed.
    pub text: String,

    /// Math fragments rewritten for the target dialect, in order.
    pub math: Vec<String>,

    /// Declared types, in order.
    pub types: Vec<String>,
}

impl ProcessedOutput {
    /// Check if the output contained any math.
    pub fn has_math(&self) -> bool {
        !self.math.is_empty()
    }
}

/// The prompt as a front-end shows it: `(3) ->` becomes `(3) >> `.
pub fn frontend_prompt(prompt: &str) -> String {
    let mut shown = prompt.trim_end().replace('-', ">");
    shown.push(' ');
    shown
}

/// Run the whole pipeline over one output.
pub fn process_output(output: &str, options: &RewriteOptions) -> ProcessedOutput {
    ProcessedOutput {
        text: strip_math_fragments(output),
        math: extract_math_fragments(output)
            .into_iter()
            .map(|fragment| rewrite_for_target_dialect(fragment, options))
            .collect(),
        types: extract_type_tags(output),
    }
}
