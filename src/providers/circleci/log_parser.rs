use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::types::LogLine;

/// Terminal control sequences: ESC `[`, optional `n(;n)*` parameters, final byte.
static ANSI_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[(?:[0-9]+(?:;[0-9]+)*)?[mKHfJ]").unwrap());

const COLUMN_SEPARATOR: char = '│';
const FAILURE_GLYPH: char = '✖';

/// Joins the `message` field of every log line with newlines.
pub fn join_messages(lines: &[LogLine]) -> String {
    lines
        .iter()
        .map(|line| line.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes terminal escape sequences.
///
/// Runs until nothing is left to remove, so sequences that only appear once an
/// inner one is gone (`ESC ESC[m [m`) are stripped as well.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(text);
    while ANSI_SEQUENCE.is_match(&current) {
        current = Cow::Owned(ANSI_SEQUENCE.replace_all(&current, "").into_owned());
    }
    current
}

/// Finds failing tests in the box-drawn result tables printed by the test runner.
///
/// A row reads `... │ ✖  <test id> <anything> │ ...`:
///
/// ```text
/// line   := prefix " │ ✖" ws+ cell ( "│" line | EOL )
/// cell   := token ( ws rest )?
/// ```
///
/// The test id is the first whitespace-delimited token of `cell`. Ids that wrap
/// onto the next line leave an empty cell and are not reported.
#[derive(Debug, Clone)]
pub struct FailureLineMatcher {
    marker: String,
    separator: char,
}

impl Default for FailureLineMatcher {
    fn default() -> Self {
        Self::new(COLUMN_SEPARATOR, FAILURE_GLYPH)
    }
}

impl FailureLineMatcher {
    pub fn new(separator: char, glyph: char) -> Self {
        Self {
            marker: format!(" {separator} {glyph}"),
            separator,
        }
    }

    /// Test ids in order of appearance; repeats are kept.
    pub fn failed_tests<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut found = Vec::new();
        for line in text.lines() {
            self.scan_line(line, &mut found);
        }
        found
    }

    fn scan_line<'a>(&self, line: &'a str, found: &mut Vec<&'a str>) {
        let mut rest = line;
        while let Some(pos) = rest.find(&self.marker) {
            let after_marker = &rest[pos + self.marker.len()..];
            let cell_start = after_marker.trim_start();

            if cell_start.len() == after_marker.len() {
                // glyph not followed by whitespace
                rest = after_marker;
                continue;
            }

            let cell_end = cell_start.find(self.separator).unwrap_or(cell_start.len());
            if let Some(test_id) = cell_start[..cell_end].split_whitespace().next() {
                found.push(test_id);
            }
            rest = &cell_start[cell_end..];
        }
    }
}
