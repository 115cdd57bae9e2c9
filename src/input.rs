use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Where dialogues come from. Inline text takes precedence over a file.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(String),
    File(PathBuf),
}

impl Input {
    pub fn select(text: Option<String>, file: Option<PathBuf>) -> Option<Self> {
        match (text, file) {
            (Some(text), _) if !text.is_empty() => Some(Input::Text(text)),
            (_, Some(file)) => Some(Input::File(file)),
            _ => None,
        }
    }
}

/// Line boundaries recognized when splitting a dialogue file. Besides `\n`
/// and `\r`, this covers the vertical tab, form feed, the ASCII separator
/// controls, NEL and the Unicode line/paragraph separators.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Trimmed, non-empty lines of a dialogue file.
pub fn dialogues(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_wins_over_file() {
        let input = Input::select(Some("A: hi".into()), Some("dialogues.txt".into()));
        assert_eq!(input, Some(Input::Text("A: hi".into())));
    }

    #[test]
    fn file_when_no_text() {
        let input = Input::select(None, Some("dialogues.txt".into()));
        assert_eq!(input, Some(Input::File("dialogues.txt".into())));
    }

    #[test]
    fn only_empty_text_counts_as_missing() {
        assert_eq!(
            Input::select(Some("   ".into()), Some("d.txt".into())),
            Some(Input::Text("   ".into()))
        );
        assert_eq!(Input::select(Some(" ".into()), None), Some(Input::Text(" ".into())));
        assert_eq!(
            Input::select(Some(String::new()), Some("d.txt".into())),
            Some(Input::File("d.txt".into()))
        );
        assert_eq!(Input::select(Some(String::new()), None), None);
        assert_eq!(Input::select(None, None), None);
    }

    #[test]
    fn skips_blank_lines_and_trims() {
        let contents = "  A: hi B: yo  \n\n   \nA: bye\r\n";
        let lines: Vec<_> = dialogues(contents).collect();
        assert_eq!(lines, vec!["A: hi B: yo", "A: bye"]);
    }

    #[test]
    fn splits_on_every_line_boundary() {
        let lines: Vec<_> = dialogues("A: hi\rB: yo\rA: bye").collect();
        assert_eq!(lines, vec!["A: hi", "B: yo", "A: bye"]);

        let contents = "one\x0btwo\x0cthree\x1cfour\u{85}five\u{2028}six\u{2029}seven";
        assert_eq!(dialogues(contents).count(), 7);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }
}
