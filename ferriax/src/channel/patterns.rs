//! Pattern matching utilities for prompt detection.

use regex::bytes::Regex;

use super::buffer::PatternBuffer;
use crate::error::ConfigError;

/// The numbered prompt printed by Axiom-family systems, e.g. `(42) ->`.
pub const DEFAULT_PROMPT_PATTERN: &str = r"\([0-9]+\) ->";

/// Compile a prompt pattern string into a regex.
///
/// Anchors to the end of the buffer (allowing trailing whitespace) unless the
/// pattern already ends with `$`, so numbered prompts quoted inside output are
/// not mistaken for the real one.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    if pattern.trim().is_empty() {
        return Err(ConfigError::EmptyPattern);
    }

    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("(?:{})\\s*$", pattern)
    };

    Ok(Regex::new(&pattern)?)
}

/// Find the earliest match of any pattern in the buffer tail.
///
/// Returns `(pattern_index, start, end)`. When two patterns match at the same
/// offset the one listed first wins.
pub(crate) fn first_match(
    buffer: &PatternBuffer,
    patterns: &[Regex],
) -> Option<(usize, usize, usize)> {
    patterns
        .iter()
        .enumerate()
        .filter_map(|(index, pattern)| {
            buffer
                .search_tail(pattern)
                .map(|(start, end)| (index, start, end))
        })
        .min_by_key(|&(index, start, _)| (start, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt_matches() {
        let pattern = compile_prompt_pattern(DEFAULT_PROMPT_PATTERN).unwrap();
        assert!(pattern.is_match(b"(1) -> "));
        assert!(pattern.is_match(b"some output\n(12) ->"));
        assert!(!pattern.is_match(b"(x) -> "));
    }

    #[test]
    fn test_prompt_must_be_at_end() {
        let pattern = compile_prompt_pattern(DEFAULT_PROMPT_PATTERN).unwrap();
        assert!(!pattern.is_match(b"(3) -> then more output"));

        let m = pattern.find(b"Welcome\n(1) -> ").unwrap();
        assert_eq!(m.as_bytes(), b"(1) -> ");
    }

    #[test]
    fn test_anchored_pattern_kept() {
        let pattern = compile_prompt_pattern(r"READY$").unwrap();
        assert!(pattern.is_match(b"READY"));
        assert!(!pattern.is_match(b"READY "));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            compile_prompt_pattern("  "),
            Err(ConfigError::EmptyPattern)
        ));
        assert!(matches!(
            compile_prompt_pattern("(unclosed"),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_first_match_prefers_earliest_then_lowest_index() {
        let mut buffer = PatternBuffer::new(0, false);
        buffer.extend(b"error: bad\n(4) -> ");

        let patterns = vec![
            compile_prompt_pattern(DEFAULT_PROMPT_PATTERN).unwrap(),
            Regex::new("error").unwrap(),
            Regex::new("err").unwrap(),
        ];
        let (index, start, end) = first_match(&buffer, &patterns).unwrap();
        assert_eq!((index, start, end), (1, 0, 5));
    }
}
