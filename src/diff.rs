//! Line-change accounting and diff previews.

use similar::{ChangeTag, TextDiff};
use std::fmt::Write;
use std::path::Path;

/// Counts lines that differ, pairing line `n` of one text with line `n` of
/// the other and stopping at the shorter text.
///
/// Exact as long as both texts have the same number of lines. Once a line is
/// inserted or deleted the pairs fall out of step and later changes are
/// miscounted.
pub fn positional_changed_lines(original: &str, modified: &str) -> usize {
    original
        .lines()
        .zip(modified.lines())
        .filter(|(a, b)| a != b)
        .count()
}

/// Counts changed lines after aligning the two texts on their longest common
/// subsequence of lines. A modified line counts once; pure insertions and
/// deletions count once per line.
pub fn aligned_changed_lines(original: &str, modified: &str) -> usize {
    let summary = DiffSummary::from_diff(original, modified);
    summary.insertions.max(summary.deletions)
}

/// Generates a unified diff between two strings.
pub fn unified_diff(original: &str, modified: &str, path: &Path) -> String {
    render(original, modified, path, false)
}

/// Colorized diff output for terminal display.
pub fn colorized_diff(original: &str, modified: &str, path: &Path) -> String {
    render(original, modified, path, true)
}

fn render(original: &str, modified: &str, path: &Path, color: bool) -> String {
    const RED: &str = "\x1b[31m";
    const GREEN: &str = "\x1b[32m";
    const CYAN: &str = "\x1b[36m";
    const RESET: &str = "\x1b[0m";

    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();
    let (header, reset) = if color { (CYAN, RESET) } else { ("", "") };

    writeln!(&mut output, "{header}--- a/{}{reset}", path.display()).unwrap();
    writeln!(&mut output, "{header}+++ b/{}{reset}", path.display()).unwrap();

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            writeln!(&mut output).unwrap();
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, tint) = match change.tag() {
                    ChangeTag::Delete => ("-", RED),
                    ChangeTag::Insert => ("+", GREEN),
                    ChangeTag::Equal => (" ", ""),
                };

                if color && !tint.is_empty() {
                    write!(&mut output, "{tint}{sign}{}{RESET}", change.value()).unwrap();
                } else {
                    write!(&mut output, "{sign}{}", change.value()).unwrap();
                }
                if change.missing_newline() {
                    writeln!(&mut output).unwrap();
                }
            }
        }
    }

    output
}

/// Insertion and deletion totals across one or more files.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffSummary {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    /// Creates a summary from original and modified content.
    pub fn from_diff(original: &str, modified: &str) -> Self {
        let diff = TextDiff::from_lines(original, modified);
        let mut insertions = 0;
        let mut deletions = 0;

        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => insertions += 1,
                ChangeTag::Delete => deletions += 1,
                ChangeTag::Equal => {}
            }
        }

        Self {
            files_changed: usize::from(insertions > 0 || deletions > 0),
            insertions,
            deletions,
        }
    }

    /// Combines two summaries.
    pub fn merge(&mut self, other: &DiffSummary) {
        self.files_changed += other.files_changed;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} file(s) changed, {} insertions(+), {} deletions(-)",
            self.files_changed, self.insertions, self.deletions
        )
    }
}
