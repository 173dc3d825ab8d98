//! Typeset-math fragments in child output.
//!
//! The child emits display math as `$$ ... $$` blocks in its own TeX dialect
//! (`\sp`, `\sb`, `\root{n}\of`, `\leqno(N)`). These helpers cut the blocks
//! out of the surrounding text and rewrite them into plain LaTeX/amsmath.
//! Rewriting is token-level substitution; the math itself is never parsed.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const DISPLAY_DELIMITER: &str = "$$";
const BREQN_BEGIN: &str = r"\begin{dmath*}";
const BREQN_END: &str = r"\end{dmath*}";

static MATH_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$[^$]*\$\$").expect("valid fragment regex"));

static EQUATION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\leqno\([0-9]*\)").expect("valid leqno regex"));

static SUPERSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sp(\s*)([^\s\\$]*)").expect("valid superscript regex"));

static SUBSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sb(\s*)([^\s\\$]*)").expect("valid subscript regex"));

static ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\root\s*(\{[0-9]*\})\s*\\of").expect("valid root regex"));

/// Options for [`rewrite_for_target_dialect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteOptions {
    /// Wrap fragments in a breakable `dmath*` environment (breqn package)
    /// instead of keeping the fixed-width `$$` display.
    pub breakable: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self { breakable: true }
    }
}

/// Every `$$ ... $$` fragment, left to right.
pub fn extract_math_fragments(output: &str) -> Vec<&str> {
    MATH_FRAGMENT.find_iter(output).map(|m| m.as_str()).collect()
}

/// The text around the fragments.
///
/// Always one more segment than there are fragments, so that
/// `segments[0] + fragments[0] + segments[1] + ...` is `output` again.
pub fn split_on_math_fragments(output: &str) -> Vec<&str> {
    MATH_FRAGMENT.split(output).collect()
}

/// `output` with every fragment removed.
pub fn strip_math_fragments(output: &str) -> String {
    split_on_math_fragments(output).concat()
}

/// Rewrite one fragment into the target LaTeX dialect.
///
/// Applying this to an already rewritten fragment changes nothing.
pub fn rewrite_for_target_dialect(fragment: &str, options: &RewriteOptions) -> String {
    let tex = EQUATION_NUMBER.replace_all(fragment, "");
    let tex = rewrite_script(&SUPERSCRIPT, &tex, '^');
    let tex = rewrite_script(&SUBSCRIPT, &tex, '_');
    let tex = ROOT.replace_all(&tex, r"\sqrt[${1}]");

    if !options.breakable || tex.trim_start().starts_with(BREQN_BEGIN) {
        return tex.into_owned();
    }

    let body = tex.trim();
    let body = body
        .strip_prefix(DISPLAY_DELIMITER)
        .and_then(|b| b.strip_suffix(DISPLAY_DELIMITER))
        .unwrap_or(body)
        .trim();
    format!("{}\n{}\n{}", BREQN_BEGIN, body, BREQN_END)
}

/// Replace `\sp`/`\sb` and their argument with `marker{arg}`.
///
/// A control word ends at the first non-letter, so `\sp2` is a superscript
/// while `\space` is a different macro and stays as it is.
fn rewrite_script<'a>(pattern: &Regex, tex: &'a str, marker: char) -> Cow<'a, str> {
    pattern.replace_all(tex, |caps: &Captures<'_>| {
        let argument = &caps[2];
        if caps[1].is_empty() && argument.starts_with(|c: char| c.is_ascii_alphabetic()) {
            caps[0].to_string()
        } else {
            format!("{}{{{}}}", marker, argument)
        }
    })
}
