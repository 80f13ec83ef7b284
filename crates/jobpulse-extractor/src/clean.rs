//! Posting text cleanup before prompting
//!
//! Scraped postings carry page chrome ("Apply", "Show more", "Posted 3 days
//! ago") and erratic whitespace. Removing it shortens the prompt and keeps
//! small local models from copying boilerplate into fields.

use regex::{Regex, RegexSet};
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid whitespace regex"));

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-run regex"));

/// Lines matching any of these (case-insensitive, after trimming) are dropped
pub const BOILERPLATE_PATTERNS: &[&str] = &[
    r"(?i)^Apply$",
    r"(?i)^Apply by\b.*$",
    r"(?i)^Posted\s+.*$",
    r"(?i)^At a glance$",
    r"(?i)^Show more$",
    r"(?i)^See more$",
    r"(?i)^More$",
    r"(?i)^Handshake$",
];

static BOILERPLATE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(BOILERPLATE_PATTERNS).expect("valid boilerplate patterns")
});

/// Normalize line endings, collapse spaces/tabs and runs of blank lines
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Remove boilerplate lines, keeping blank lines as paragraph breaks
pub fn drop_boilerplate_lines(text: &str) -> String {
    let kept: Vec<&str> = text
        .split('\n')
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.is_empty() || !BOILERPLATE.is_match(trimmed)
        })
        .map(|line| if line.trim().is_empty() { "" } else { line })
        .collect();

    let joined = kept.join("\n");
    BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

/// Full cleanup applied to a posting before it is put into a prompt
pub fn clean_posting(raw: &str) -> String {
    drop_boilerplate_lines(&normalize_whitespace(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let raw = "Data\t\tEngineer  at   Acme\r\n\r\n\r\n\r\nRemote\r";
        assert_eq!(normalize_whitespace(raw), "Data Engineer at Acme\n\nRemote");
    }

    #[test]
    fn test_drops_boilerplate_lines() {
        let raw = "Senior Analyst\nApply\nPosted 3 days ago\nShow more\n\nRequirements:\n- SQL\nAPPLY BY March 1\nhandshake";
        assert_eq!(
            clean_posting(raw),
            "Senior Analyst\n\nRequirements:\n- SQL"
        );
    }

    #[test]
    fn test_keeps_lines_that_only_mention_boilerplate() {
        let raw = "Apply your skills to real problems\nMore than 5 years of Rust";
        assert_eq!(clean_posting(raw), raw);
    }

    #[test]
    fn test_collapses_blank_runs_left_by_dropped_lines() {
        let raw = "Title\n\nSee more\n\nAt a glance\n\nBody";
        assert_eq!(clean_posting(raw), "Title\n\nBody");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(clean_posting("  \n\n  "), "");
    }
}
