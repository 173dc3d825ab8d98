//! Index, type and value extraction.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Marker the child prints before the type of a result.
pub const TYPE_MARKER: &str = "Type:";

static LEADING_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([0-9]+)\)").expect("valid index regex"));

static TYPE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Type:[a-zA-Z0-9_. ]*").expect("valid type regex"));

/// A typed result printed by the child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedValue {
    /// The `(N)` the child labelled the result with.
    pub index: u64,

    /// Declared type, e.g. `PositiveInteger`.
    pub type_tag: String,

    /// Value text with line continuations removed.
    pub value_text: String,
}

/// Parse a leading `(N)` out of `text`.
fn leading_index(text: &str) -> Option<(u64, usize)> {
    let caps = LEADING_INDEX.captures(text)?;
    let index = caps[1].parse().ok()?;
    Some((index, caps.get(0)?.end()))
}

/// Return `N` from a prompt of the form `(N) ->`.
pub fn parse_prompt_index(prompt: &str) -> Result<u64, ParseError> {
    leading_index(prompt.trim_start())
        .map(|(index, _)| index)
        .ok_or_else(|| ParseError::MalformedEcho(format!("no index in prompt {:?}", prompt)))
}

/// Split a typed result into its index, type tag and value text.
///
/// The text before the first `Type:` marker must start with the `(N)` echo;
/// the rest of the marker's line is the type tag.
pub fn extract_index_type_value(output: &str) -> Result<ParsedValue, ParseError> {
    let trimmed = output.trim_matches([' ', '\n']);
    let (head, tail) = trimmed
        .split_once(TYPE_MARKER)
        .ok_or(ParseError::NoTypedResult)?;

    let head = head.trim_start_matches([' ', '\n']);
    let (index, end) = leading_index(head).ok_or_else(|| {
        ParseError::MalformedEcho(format!("no (N) echo before type marker in {:?}", head))
    })?;

    let value_text = head[end..]
        .replace("_\n", "")
        .trim_matches([' ', '\n'])
        .to_string();

    let type_tag = tail.lines().next().unwrap_or_default().trim().to_string();

    Ok(ParsedValue {
        index,
        type_tag,
        value_text,
    })
}

/// Every type tag in `output`, in order of appearance.
pub fn extract_type_tags(output: &str) -> Vec<String> {
    TYPE_TAG
        .find_iter(output)
        .map(|m| m.as_str()[TYPE_MARKER.len()..].trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt_index() {
        assert_eq!(parse_prompt_index("(1) -> "), Ok(1));
        assert_eq!(parse_prompt_index("(42) ->"), Ok(42));
        assert_eq!(parse_prompt_index("  (7) -> "), Ok(7));
    }

    #[test]
    fn test_parse_prompt_index_malformed() {
        for prompt in ["", "->", "(x) ->", "() ->", "1) ->", "(99999999999999999999999) ->"] {
            assert!(
                matches!(parse_prompt_index(prompt), Err(ParseError::MalformedEcho(_))),
                "prompt {:?} should not parse",
                prompt
            );
        }
    }

    #[test]
    fn test_extract_index_type_value() {
        let parsed =
            extract_index_type_value("   (2)  2\n\n   Type: PositiveInteger\n\n").unwrap();
        assert_eq!(
            parsed,
            ParsedValue {
                index: 2,
                type_tag: "PositiveInteger".to_string(),
                value_text: "2".to_string(),
            }
        );
    }

    #[test]
    fn test_line_continuation_removed() {
        let output = "\n   (5)  123456789_\n012345\n   Type: PositiveInteger\n";
        let parsed = extract_index_type_value(output).unwrap();
        assert_eq!(parsed.index, 5);
        assert_eq!(parsed.value_text, "123456789012345");
    }

    #[test]
    fn test_type_tag_is_first_marker_line() {
        let output = "(3) [1,2]\n Type: List(Integer)\n(4) 5\n Type: PositiveInteger";
        let parsed = extract_index_type_value(output).unwrap();
        assert_eq!(parsed.value_text, "[1,2]");
        assert_eq!(parsed.type_tag, "List(Integer)");
    }

    #[test]
    fn test_missing_type_marker() {
        assert_eq!(
            extract_index_type_value("   (1)  x\n"),
            Err(ParseError::NoTypedResult)
        );
        assert_eq!(extract_index_type_value(""), Err(ParseError::NoTypedResult));
    }

    #[test]
    fn test_missing_index_is_malformed() {
        assert!(matches!(
            extract_index_type_value("   2\n\n   Type: PositiveInteger\n"),
            Err(ParseError::MalformedEcho(_))
        ));
    }

    #[test]
    fn test_extract_type_tags() {
        let output = "(1) x\n Type: Symbol\n(2) 1.5\n Type: Float\n";
        assert_eq!(extract_type_tags(output), vec!["Symbol", "Float"]);
        assert!(extract_type_tags("no types here").is_empty());
    }

    #[test]
    fn test_extract_type_tags_dotted() {
        let output = "Type: Polynomial Integer.Something_else\n";
        assert_eq!(
            extract_type_tags(output),
            vec!["Polynomial Integer.Something_else"]
        );
    }
}
