//! Physical line classification.
//!
//! Classifies each line of a source range as code, comment, or blank.
//! The classifier is purely textual: block comments are tracked with a
//! single flag and the syntax tree is never consulted, so a range that
//! begins in the middle of a block comment is counted as code until the
//! next marker. Both supported languages share C-style markers.

use serde::{Deserialize, Serialize};

/// Comment markers for a language.
#[derive(Debug, Clone, Copy)]
pub struct CommentSyntax {
    pub line: &'static str,
    pub block_start: &'static str,
    pub block_end: &'static str,
}

/// Marker set shared by Java and Kotlin.
pub const C_LIKE: CommentSyntax = CommentSyntax {
    line: "//",
    block_start: "/*",
    block_end: "*/",
};

/// Line counts for a source range.
///
/// Invariants: `total == code_only + comments + blank_lines` and
/// `with_comments == code_only + comments`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlocMetrics {
    pub total: usize,
    pub code_only: usize,
    pub with_comments: usize,
    pub comments: usize,
    pub blank_lines: usize,
}

/// Count the lines of `source` in the inclusive 1-based range
/// `start_line..=end_line`.
///
/// An empty or inverted range yields all-zero metrics. Lines past the
/// end of the file are ignored.
pub fn classify(
    source: &str,
    start_line: usize,
    end_line: usize,
    syntax: &CommentSyntax,
) -> SlocMetrics {
    let mut metrics = SlocMetrics::default();
    if start_line == 0 || end_line < start_line {
        return metrics;
    }

    let mut in_block_comment = false;
    let lines = source
        .lines()
        .skip(start_line - 1)
        .take(end_line - start_line + 1);

    for line in lines {
        metrics.total += 1;
        let trimmed = line.trim();

        if in_block_comment {
            metrics.comments += 1;
            if trimmed.contains(syntax.block_end) {
                in_block_comment = false;
            }
            continue;
        }

        if trimmed.is_empty() {
            metrics.blank_lines += 1;
        } else if trimmed.starts_with(syntax.line) {
            metrics.comments += 1;
        } else if trimmed.starts_with(syntax.block_start) {
            let rest = &trimmed[syntax.block_start.len()..];
            match rest.find(syntax.block_end) {
                // closes on the same line with trailing code
                Some(pos) if !rest[pos + syntax.block_end.len()..].trim().is_empty() => {
                    metrics.code_only += 1;
                }
                Some(_) => metrics.comments += 1,
                None => {
                    metrics.comments += 1;
                    in_block_comment = true;
                }
            }
        } else {
            metrics.code_only += 1;
        }
    }

    metrics.with_comments = metrics.code_only + metrics.comments;
    metrics
}

/// Count the whole file.
pub fn classify_file(source: &str, syntax: &CommentSyntax) -> SlocMetrics {
    classify(source, 1, source.lines().count().max(1), syntax)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(source: &str) -> SlocMetrics {
        classify(source, 1, source.lines().count(), &C_LIKE)
    }

    fn assert_invariants(m: &SlocMetrics) {
        assert_eq!(m.total, m.code_only + m.comments + m.blank_lines);
        assert_eq!(m.with_comments, m.code_only + m.comments);
    }

    #[test]
    fn test_code_comment_blank_mix() {
        let source = "int a = 1;\n\n// comment\nint b = 2;\n";
        let m = counts(source);
        assert_eq!(m.total, 4);
        assert_eq!(m.code_only, 2);
        assert_eq!(m.comments, 1);
        assert_eq!(m.blank_lines, 1);
        assert_invariants(&m);
    }

    #[test]
    fn test_block_comment_spanning_lines() {
        let source = "/*\n * docs\n */\nint a;\n";
        let m = counts(source);
        assert_eq!(m.comments, 3);
        assert_eq!(m.code_only, 1);
        assert_invariants(&m);
    }

    #[test]
    fn test_single_line_block_comment() {
        let source = "/* note */\nint a; /* trailing */\n";
        let m = counts(source);
        assert_eq!(m.comments, 1);
        assert_eq!(m.code_only, 1);
        assert_invariants(&m);
    }

    #[test]
    fn test_block_comment_with_trailing_code() {
        let source = "/* note */ int a;\n";
        let m = counts(source);
        assert_eq!(m.code_only, 1);
        assert_eq!(m.comments, 0);
    }

    #[test]
    fn test_empty_range_yields_zero() {
        let m = classify("int a;\n", 5, 2, &C_LIKE);
        assert_eq!(m, SlocMetrics::default());

        let m = classify("int a;\n", 0, 3, &C_LIKE);
        assert_eq!(m, SlocMetrics::default());
    }

    #[test]
    fn test_range_subset() {
        let source = "a\nb\nc\nd\n";
        let m = classify(source, 2, 3, &C_LIKE);
        assert_eq!(m.total, 2);
        assert_eq!(m.code_only, 2);
    }

    #[test]
    fn test_range_past_end_of_file() {
        let source = "a\nb\n";
        let m = classify(source, 1, 10, &C_LIKE);
        assert_eq!(m.total, 2);
        assert_invariants(&m);
    }

    #[test]
    fn test_whitespace_only_is_blank() {
        let m = counts("   \n\t\nint a;\n");
        assert_eq!(m.blank_lines, 2);
        assert_eq!(m.code_only, 1);
        assert_invariants(&m);
    }
}
