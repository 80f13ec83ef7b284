//! Completion salvage parser
//!
//! Recovers one JSON object from text produced by a generation backend.
//! Backends wrap objects in code fences, prepend commentary, append
//! commentary, stop mid-object, or echo a schema example before the real
//! answer. Three phases run in order of cost and the first that yields an
//! object wins:
//!
//! 1. **Direct**: the trimmed text parses as a JSON object.
//! 2. **Repaired**: fences are stripped, preamble is dropped, then the text is
//!    either truncated at its last balanced point or closed by appending the
//!    missing brackets, and parsed again.
//! 3. **Scan**: every top-level `{...}` block of the original text is tried,
//!    last to first.
//!
//! All bracket scanning skips characters inside string literals, honoring
//! backslash escapes.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Default upper bound on closing characters appended during repair
pub const DEFAULT_MAX_APPEND: usize = 256;

/// Phase that produced a salvaged object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SalvagePhase {
    /// The text was already a JSON object
    Direct,

    /// The text parsed after fence stripping and bracket repair
    Repaired,

    /// A top-level `{...}` block found by scanning parsed
    Scan,
}

impl SalvagePhase {
    /// Get the phase name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SalvagePhase::Direct => "direct",
            SalvagePhase::Repaired => "repaired",
            SalvagePhase::Scan => "scan",
        }
    }
}

impl fmt::Display for SalvagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why salvage failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SalvageFailure {
    /// Nothing but whitespace
    EmptyInput,

    /// Valid JSON, but the top-level value is not an object
    NotAnObject,

    /// No `{...}` block anywhere in the text
    NoObjectFound,

    /// `{...}` blocks exist but none parsed as an object
    NoCandidateParsed,
}

impl SalvageFailure {
    /// Stable identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            SalvageFailure::EmptyInput => "empty_input",
            SalvageFailure::NotAnObject => "not_an_object",
            SalvageFailure::NoObjectFound => "no_object_found",
            SalvageFailure::NoCandidateParsed => "no_candidate_parsed",
        }
    }
}

impl fmt::Display for SalvageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Salvage failure with the text used on the final attempt
#[derive(Error, Debug, Clone, PartialEq)]
#[error("salvage failed ({reason})")]
pub struct SalvageError {
    /// Failure reason
    pub reason: SalvageFailure,

    /// Exact text handed to the JSON parser on the last try
    pub attempted: String,
}

/// A salvaged JSON object and the phase that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Salvaged {
    /// The recovered object, key order preserved
    pub object: Map<String, Value>,

    /// Phase that succeeded
    pub phase: SalvagePhase,
}

impl Salvaged {
    /// Whether the text needed any repair beyond a direct parse
    pub fn repaired(&self) -> bool {
        self.phase != SalvagePhase::Direct
    }
}

/// Salvage parser with a configurable repair bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalvageParser {
    max_append: usize,
}

impl Default for SalvageParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_APPEND)
    }
}

impl SalvageParser {
    /// Create a parser that appends at most `max_append` closers
    pub fn new(max_append: usize) -> Self {
        Self { max_append }
    }

    /// Recover one JSON object from `text`
    pub fn parse(&self, text: &str) -> Result<Salvaged, SalvageError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SalvageError {
                reason: SalvageFailure::EmptyInput,
                attempted: String::new(),
            });
        }

        let mut saw_non_object = false;

        // 1. Direct parse
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(object)) => {
                return Ok(Salvaged {
                    object,
                    phase: SalvagePhase::Direct,
                })
            }
            Ok(_) => saw_non_object = true,
            Err(_) => {}
        }

        // 2. Repair and reparse
        let repaired = repair(trimmed, self.max_append);
        match serde_json::from_str::<Value>(&repaired) {
            Ok(Value::Object(object)) => {
                debug!(chars = trimmed.len(), "Salvaged object after repair");
                return Ok(Salvaged {
                    object,
                    phase: SalvagePhase::Repaired,
                });
            }
            Ok(_) => saw_non_object = true,
            Err(_) => {}
        }

        // 3. Scan the original text, last candidate first
        let candidates = top_level_objects(text);
        if candidates.is_empty() {
            let reason = if saw_non_object {
                SalvageFailure::NotAnObject
            } else {
                SalvageFailure::NoObjectFound
            };
            return Err(SalvageError {
                reason,
                attempted: repaired,
            });
        }

        for candidate in candidates.iter().rev() {
            if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) {
                debug!(
                    candidates = candidates.len(),
                    "Salvaged object by block scan"
                );
                return Ok(Salvaged {
                    object,
                    phase: SalvagePhase::Scan,
                });
            }
        }

        Err(SalvageError {
            reason: SalvageFailure::NoCandidateParsed,
            attempted: candidates[0].to_string(),
        })
    }
}

/// Recover one JSON object from `text` with the default repair bound
pub fn salvage_object(text: &str) -> Result<Salvaged, SalvageError> {
    SalvageParser::default().parse(text)
}

/// Remove a surrounding fenced code block
///
/// The opening line (fence plus optional language tag) is dropped; the last
/// line is dropped only if it is a bare fence.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// Drop everything before the first `{` or `[`
pub fn json_tail(text: &str) -> &str {
    match text.find(['{', '[']) {
        Some(start) => text[start..].trim(),
        None => text.trim(),
    }
}

/// Truncate after the last point where the bracket stack returned to empty
///
/// Returns `None` if the text never opens a bracket or never closes the
/// first one. Mismatched closers are ignored.
pub fn truncate_to_last_balanced(text: &str) -> Option<&str> {
    let mut scanner = BracketScanner::default();
    let mut started = false;
    let mut last_balanced_end = None;

    for (offset, ch) in text.char_indices() {
        if !scanner.feed(ch) {
            continue;
        }
        if matches!(ch, '{' | '[') {
            started = true;
        }
        if started && scanner.stack.is_empty() {
            last_balanced_end = Some(offset + ch.len_utf8());
        }
    }

    last_balanced_end.map(|end| text[..end].trim())
}

/// Append closers for every bracket left open at end of text
///
/// At most `max_append` characters are appended.
pub fn append_missing_closers(text: &str, max_append: usize) -> String {
    let mut scanner = BracketScanner::default();
    for ch in text.chars() {
        scanner.feed(ch);
    }

    let closers: String = scanner
        .stack
        .iter()
        .rev()
        .map(|&open| if open == '{' { '}' } else { ']' })
        .take(max_append)
        .collect();

    let mut repaired = text.to_string();
    repaired.push_str(&closers);
    repaired.trim().to_string()
}

/// Fence strip, drop preamble, then truncate or close brackets
fn repair(text: &str, max_append: usize) -> String {
    let unfenced = strip_code_fences(text);
    let tail = json_tail(&unfenced);

    match truncate_to_last_balanced(tail) {
        Some(truncated) => truncated.to_string(),
        None => append_missing_closers(tail, max_append),
    }
}

/// Every maximal top-level `{...}` block, in order of appearance
fn top_level_objects(text: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut depth = 0usize;
    let mut start = None;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(offset);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        candidates.push(&text[begin..=offset]);
                    }
                }
            }
            _ => {}
        }
    }

    candidates
}

/// Quote-aware bracket stack
#[derive(Debug, Default)]
struct BracketScanner {
    stack: Vec<char>,
    in_string: bool,
    escaped: bool,
}

impl BracketScanner {
    /// Consume one character; returns false while inside a string literal
    /// (including its delimiting quotes)
    fn feed(&mut self, ch: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == '"' {
                self.in_string = false;
            }
            return false;
        }

        match ch {
            '"' => {
                self.in_string = true;
                return false;
            }
            '{' | '[' => self.stack.push(ch),
            '}' | ']' => {
                let expected = if ch == '}' { '{' } else { '[' };
                if self.stack.last() == Some(&expected) {
                    self.stack.pop();
                }
            }
            _ => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_direct_parse() {
        let salvaged = salvage_object(r#"  {"a": 1, "b": [true]}  "#).unwrap();
        assert_eq!(salvaged.phase, SalvagePhase::Direct);
        assert!(!salvaged.repaired());
        assert_eq!(salvaged.object, object(json!({"a": 1, "b": [true]})));
    }

    #[test]
    fn test_round_trip_is_stable() {
        let input = r#"{"role_title": "SWE", "skills": ["Rust", "SQL"], "years": 3}"#;
        let first = salvage_object(input).unwrap().object;
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = salvage_object(&reserialized).unwrap();
        assert_eq!(second.phase, SalvagePhase::Direct);
        assert_eq!(second.object, first);
    }

    #[test]
    fn test_key_order_preserved() {
        let salvaged = salvage_object(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = salvaged.object.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_trailing_commentary_truncated() {
        let salvaged = salvage_object("{\"a\": 1}\nExtra commentary here").unwrap();
        assert_eq!(salvaged.phase, SalvagePhase::Repaired);
        assert_eq!(salvaged.object, object(json!({"a": 1})));
    }

    #[test]
    fn test_fenced_block() {
        let fenced = "```json\n{\"a\": 1, \"b\": \"x\"}\n```";
        let plain = r#"{"a": 1, "b": "x"}"#;
        assert_eq!(
            salvage_object(fenced).unwrap().object,
            salvage_object(plain).unwrap().object
        );

        let bare = "```\n{\"a\": 1}\n```";
        assert_eq!(salvage_object(bare).unwrap().object, object(json!({"a": 1})));
    }

    #[test]
    fn test_braces_inside_strings() {
        let input = r#"{"a": "contains } and { chars"}"#;
        let salvaged = salvage_object(input).unwrap();
        assert_eq!(salvaged.object["a"], "contains } and { chars");

        // Same text with trailing noise exercises the repair scan
        let noisy = format!("{} trailing", input);
        let salvaged = salvage_object(&noisy).unwrap();
        assert_eq!(salvaged.phase, SalvagePhase::Repaired);
        assert_eq!(salvaged.object["a"], "contains } and { chars");
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let input = r#"Note: {"a": "say \"}\" loudly", "b": [1]} done"#;
        let salvaged = salvage_object(input).unwrap();
        assert_eq!(salvaged.object["a"], r#"say "}" loudly"#);
        assert_eq!(salvaged.object["b"], json!([1]));
    }

    #[test]
    fn test_missing_closers_appended() {
        let salvaged = salvage_object(r#"{"a": [1, 2"#).unwrap();
        assert_eq!(salvaged.phase, SalvagePhase::Repaired);
        assert_eq!(salvaged.object, object(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_preamble_dropped() {
        let salvaged = salvage_object("Sure! Here is the JSON:\n{\"company\": \"Acme\"}").unwrap();
        assert_eq!(salvaged.object["company"], "Acme");
    }

    #[test]
    fn test_scan_prefers_last_object() {
        let input = r#"Schema: {"role_title": "string"} Answer: {"role_title": "Data Engineer"}"#;
        let salvaged = salvage_object(input).unwrap();
        assert_eq!(salvaged.phase, SalvagePhase::Scan);
        assert_eq!(salvaged.object["role_title"], "Data Engineer");
    }

    #[test]
    fn test_scan_skips_unparseable_last_candidate() {
        let input = r#"{"a": 1} then {not json}"#;
        let salvaged = salvage_object(input).unwrap();
        assert_eq!(salvaged.phase, SalvagePhase::Scan);
        assert_eq!(salvaged.object, object(json!({"a": 1})));
    }

    #[test]
    fn test_array_inside_is_found_by_scan() {
        let salvaged = salvage_object(r#"[{"a": 1}]"#).unwrap();
        assert_eq!(salvaged.phase, SalvagePhase::Scan);
        assert_eq!(salvaged.object, object(json!({"a": 1})));
    }

    #[test]
    fn test_failure_reasons() {
        let err = salvage_object("   ").unwrap_err();
        assert_eq!(err.reason, SalvageFailure::EmptyInput);
        assert!(err.attempted.is_empty());

        let err = salvage_object("[1, 2, 3]").unwrap_err();
        assert_eq!(err.reason, SalvageFailure::NotAnObject);
        assert_eq!(err.attempted, "[1, 2, 3]");

        let err = salvage_object("no json here at all").unwrap_err();
        assert_eq!(err.reason, SalvageFailure::NoObjectFound);
        assert_eq!(err.attempted, "no json here at all");

        let err = salvage_object("{oops} and {nope}").unwrap_err();
        assert_eq!(err.reason, SalvageFailure::NoCandidateParsed);
        assert_eq!(err.attempted, "{oops}");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_json_tail() {
        assert_eq!(json_tail("abc {\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(json_tail("x [1] {2}"), "[1] {2}");
        assert_eq!(json_tail("  nothing  "), "nothing");
    }

    #[test]
    fn test_truncate_to_last_balanced() {
        assert_eq!(truncate_to_last_balanced("{\"a\": 1} tail"), Some("{\"a\": 1}"));
        assert_eq!(truncate_to_last_balanced("{\"a\": [1"), None);
        assert_eq!(truncate_to_last_balanced("no brackets"), None);
        // A stray closer does not count as balancing
        assert_eq!(truncate_to_last_balanced("{\"a\": 1]} x"), Some("{\"a\": 1]}"));
    }

    #[test]
    fn test_append_missing_closers() {
        assert_eq!(append_missing_closers("{\"a\": [1, 2", 256), "{\"a\": [1, 2]}");
        assert_eq!(append_missing_closers("{\"a\": [1, 2", 1), "{\"a\": [1, 2]");
        assert_eq!(append_missing_closers("{\"a\": \"[{\"", 256), "{\"a\": \"[{\"}");
    }

    #[test]
    fn test_unicode_text_does_not_panic() {
        let salvaged = salvage_object("Voilà → {\"ville\": \"Montréal\"} ✓").unwrap();
        assert_eq!(salvaged.object["ville"], "Montréal");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn flat_object() -> impl Strategy<Value = Map<String, Value>> {
        proptest::collection::btree_map(
            "[a-z_]{1,10}",
            prop_oneof![
                any::<i64>().prop_map(Value::from),
                ".{0,20}".prop_map(Value::from),
                proptest::collection::vec(".{0,10}", 0..4).prop_map(Value::from),
            ],
            0..8,
        )
        .prop_map(|entries| entries.into_iter().collect())
    }

    proptest! {
        /// Property: valid objects come back unchanged from the direct phase
        #[test]
        fn test_valid_object_is_identity(object in flat_object()) {
            let text = serde_json::to_string(&object).unwrap();
            let salvaged = salvage_object(&text).unwrap();
            prop_assert_eq!(salvaged.phase, SalvagePhase::Direct);
            prop_assert_eq!(salvaged.object, object);
        }

        /// Property: trailing commentary without brackets or quotes is discarded
        #[test]
        fn test_trailing_commentary_discarded(
            object in flat_object(),
            tail in "[a-zA-Z .,!?]{1,40}",
        ) {
            let text = format!("{}\n{}", serde_json::to_string(&object).unwrap(), tail);
            let salvaged = salvage_object(&text).unwrap();
            prop_assert_eq!(salvaged.object, object);
        }

        /// Property: arbitrary input never panics
        #[test]
        fn test_arbitrary_input_never_panics(text in ".{0,200}") {
            let _ = salvage_object(&text);
        }
    }
}
