//! Positional character comparison of two feed bodies.
//!
//! Positions are compared pairwise up to the shorter body's length. This is not an
//! alignment diff: a single inserted character shifts every later position, and the
//! extra tail of the longer body is never counted as a difference.
//!
//! A second, line-level pass splits both bodies on `\n` and compares the first
//! lines pairwise, a missing line counting as empty.

use common::{DEFAULT_CONTEXT_RADIUS, DEFAULT_SAMPLE_DIFFS};

use crate::feed::{extract_pub_date, FeedSummary};

/// Lines examined by the line-level pass
pub const LINE_SCAN_LIMIT: usize = 50;
/// Differing lines kept in `line_diffs`
pub const LINE_SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    /// Maximum number of differing positions kept in `sample_diffs`
    pub sample_limit: usize,
    /// Characters of context kept on each side of a differing position
    pub context_radius: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_DIFFS,
            context_radius: DEFAULT_CONTEXT_RADIUS,
        }
    }
}

/// One differing position with the surrounding text of each body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDiff {
    pub position: usize,
    pub left: char,
    pub right: char,
    pub left_context: String,
    pub right_context: String,
}

/// A line that differs between the bodies. `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiff {
    pub line: usize,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonReport {
    pub left_len: usize,
    pub right_len: usize,
    pub identical: bool,
    pub left_pub_date: Option<String>,
    pub right_pub_date: Option<String>,
    /// True only when both pubDates were found and are equal
    pub pub_dates_match: bool,
    pub diff_count: usize,
    pub sample_diffs: Vec<SampleDiff>,
    /// Line count of the body with more lines
    pub total_lines: usize,
    /// Differing lines among the first `LINE_SCAN_LIMIT`
    pub line_diff_count: usize,
    pub line_diffs: Vec<LineDiff>,
    pub left_summary: FeedSummary,
    pub right_summary: FeedSummary,
}

impl ComparisonReport {
    pub fn length_delta(&self) -> usize {
        self.left_len.abs_diff(self.right_len)
    }
}

pub fn compare(left: &str, right: &str) -> ComparisonReport {
    compare_with(left, right, &CompareOptions::default())
}

pub fn compare_with(left: &str, right: &str, options: &CompareOptions) -> ComparisonReport {
    let left_chars: Vec<char> = left.chars().collect();
    let right_chars: Vec<char> = right.chars().collect();
    let identical = left == right;

    let left_pub_date = extract_pub_date(left);
    let right_pub_date = extract_pub_date(right);
    let pub_dates_match = matches!(
        (&left_pub_date, &right_pub_date),
        (Some(l), Some(r)) if l == r
    );

    let mut diff_count = 0;
    let mut sample_diffs = Vec::new();
    if !identical {
        for (position, (l, r)) in left_chars.iter().zip(right_chars.iter()).enumerate() {
            if l == r {
                continue;
            }
            diff_count += 1;
            if sample_diffs.len() < options.sample_limit {
                sample_diffs.push(SampleDiff {
                    position,
                    left: *l,
                    right: *r,
                    left_context: context(&left_chars, position, options.context_radius),
                    right_context: context(&right_chars, position, options.context_radius),
                });
            }
        }
    }

    let left_lines: Vec<&str> = left.split('\n').collect();
    let right_lines: Vec<&str> = right.split('\n').collect();
    let total_lines = left_lines.len().max(right_lines.len());
    let (line_diff_count, line_diffs) = if identical {
        (0, Vec::new())
    } else {
        diff_lines(&left_lines, &right_lines)
    };

    ComparisonReport {
        left_len: left_chars.len(),
        right_len: right_chars.len(),
        identical,
        left_pub_date,
        right_pub_date,
        pub_dates_match,
        diff_count,
        sample_diffs,
        total_lines,
        line_diff_count,
        line_diffs,
        left_summary: FeedSummary::of(left),
        right_summary: FeedSummary::of(right),
    }
}

fn diff_lines(left: &[&str], right: &[&str]) -> (usize, Vec<LineDiff>) {
    let scanned = left.len().max(right.len()).min(LINE_SCAN_LIMIT);
    let mut count = 0;
    let mut diffs = Vec::new();

    for index in 0..scanned {
        let l = left.get(index).copied().unwrap_or("");
        let r = right.get(index).copied().unwrap_or("");
        if l == r {
            continue;
        }
        count += 1;
        if diffs.len() < LINE_SAMPLE_LIMIT {
            diffs.push(LineDiff {
                line: index + 1,
                left: l.to_string(),
                right: r.to_string(),
            });
        }
    }

    (count, diffs)
}

/// Characters in `[position - radius, position + radius)`, clipped to the body.
fn context(chars: &[char], position: usize, radius: usize) -> String {
    let start = position.saturating_sub(radius);
    let end = position.saturating_add(radius).min(chars.len());
    chars[start..end].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_A: &str =
        "<rss><channel><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></channel></rss>";
    const FEED_B: &str =
        "<rss><channel><pubDate>Mon, 01 Jan 2024 00:05:00 GMT</pubDate></channel></rss>";

    #[test]
    fn equal_bodies_are_identical() {
        for body in ["", "a", "plain text", FEED_A, "中文 feed ✓"] {
            let report = compare(body, body);
            assert!(report.identical);
            assert_eq!(report.diff_count, 0);
            assert!(report.sample_diffs.is_empty());
            assert_eq!(report.length_delta(), 0);
        }
    }

    #[test]
    fn single_difference_is_reported_at_its_position() {
        let base = "abcdefghijklmnopqrstuvwxyz0123456789";
        for i in 0..base.chars().count() {
            let changed: String = base
                .chars()
                .enumerate()
                .map(|(j, c)| if j == i { '#' } else { c })
                .collect();

            let report = compare(base, &changed);
            assert!(!report.identical);
            assert_eq!(report.diff_count, 1);
            assert_eq!(report.sample_diffs.len(), 1);
            assert_eq!(report.sample_diffs[0].position, i);
            assert_eq!(report.sample_diffs[0].right, '#');
        }
    }

    #[test]
    fn diff_count_never_exceeds_overlap() {
        let pairs = [
            ("abc", "xyz"),
            ("abc", "xyzxyzxyz"),
            ("", "anything"),
            ("short", "longer text here"),
            ("héllo wörld", "hello world!"),
        ];
        for (left, right) in pairs {
            let report = compare(left, right);
            let overlap = left.chars().count().min(right.chars().count());
            assert!(report.diff_count <= overlap, "{left:?} vs {right:?}");
        }
    }

    #[test]
    fn trailing_characters_are_not_counted() {
        let report = compare("abc", "abcdef");
        assert!(!report.identical);
        assert_eq!(report.diff_count, 0);
        assert!(report.sample_diffs.is_empty());
        assert_eq!(report.length_delta(), 3);
    }

    #[test]
    fn insertion_shifts_later_positions() {
        let report = compare("abcdef", "aXbcdef");
        assert_eq!(report.diff_count, 5);
        assert_eq!(report.sample_diffs[0].position, 1);
        assert_eq!(report.sample_diffs[0].left, 'b');
        assert_eq!(report.sample_diffs[0].right, 'X');
    }

    #[test]
    fn samples_keep_first_five_in_order() {
        let report = compare("aaaaaaaaaa", "bbbbbbbbbb");
        assert_eq!(report.diff_count, 10);
        let positions: Vec<usize> = report.sample_diffs.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sample_limit_and_radius_are_configurable() {
        let options = CompareOptions {
            sample_limit: 2,
            context_radius: 1,
        };
        let report = compare_with("abcdef", "abXdYf", &options);
        assert_eq!(report.diff_count, 2);
        assert_eq!(report.sample_diffs[0].left_context, "bc");
        assert_eq!(report.sample_diffs[0].right_context, "bX");
        assert_eq!(report.sample_diffs[1].position, 4);
    }

    #[test]
    fn context_is_clipped_to_each_body() {
        let left = "Xbcdefghij";
        let right = "Ybcdefghijklmnopqrstuvwxyz0123456789";
        let report = compare(left, right);
        let diff = &report.sample_diffs[0];
        assert_eq!(diff.position, 0);
        assert_eq!(diff.left_context, left);
        assert_eq!(diff.right_context, "Ybcdefghijklmno");
    }

    #[test]
    fn context_window_is_centered_on_position() {
        let left: String = std::iter::repeat('a').take(40).collect();
        let mut right = left.clone();
        right.replace_range(20..21, "b");
        let report = compare(&left, &right);
        let diff = &report.sample_diffs[0];
        assert_eq!(diff.position, 20);
        assert_eq!(diff.right_context.chars().count(), 30);
        assert_eq!(diff.right_context.chars().nth(15), Some('b'));
    }

    #[test]
    fn positions_count_characters_not_bytes() {
        let report = compare("日本語テキスト", "日本語テキスド");
        assert_eq!(report.left_len, 7);
        assert_eq!(report.diff_count, 1);
        assert_eq!(report.sample_diffs[0].position, 6);
        assert_eq!(report.sample_diffs[0].left, 'ト');
    }

    #[test]
    fn pub_dates_compared() {
        let same = compare(FEED_A, &format!("{FEED_A}\n"));
        assert!(same.pub_dates_match);
        assert_eq!(
            same.left_pub_date.as_deref(),
            Some("Mon, 01 Jan 2024 00:00:00 GMT")
        );

        let different = compare(FEED_A, FEED_B);
        assert!(!different.pub_dates_match);
        assert_eq!(different.diff_count, 1);
    }

    #[test]
    fn absent_pub_dates_do_not_match() {
        let report = compare("not xml", "also not xml");
        assert_eq!(report.left_pub_date, None);
        assert_eq!(report.right_pub_date, None);
        assert!(!report.pub_dates_match);

        let one_sided = compare(FEED_A, "not xml");
        assert!(!one_sided.pub_dates_match);
    }

    #[test]
    fn line_pass_reports_changed_and_missing_lines() {
        let report = compare("a\nb\nc", "a\nB\nc\nd");
        assert_eq!(report.total_lines, 4);
        assert_eq!(report.line_diff_count, 2);
        assert_eq!(
            report.line_diffs,
            vec![
                LineDiff {
                    line: 2,
                    left: "b".to_string(),
                    right: "B".to_string(),
                },
                LineDiff {
                    line: 4,
                    left: String::new(),
                    right: "d".to_string(),
                },
            ]
        );
    }

    #[test]
    fn line_pass_scans_fifty_lines_and_keeps_ten() {
        let left = vec!["x"; 80].join("\n");
        let right = vec!["y"; 80].join("\n");
        let report = compare(&left, &right);
        assert_eq!(report.total_lines, 80);
        assert_eq!(report.line_diff_count, LINE_SCAN_LIMIT);
        assert_eq!(report.line_diffs.len(), LINE_SAMPLE_LIMIT);
        assert_eq!(report.line_diffs[9].line, 10);
    }

    #[test]
    fn identical_bodies_skip_line_pass() {
        let report = compare("a\nb", "a\nb");
        assert_eq!(report.total_lines, 2);
        assert_eq!(report.line_diff_count, 0);
        assert!(report.line_diffs.is_empty());
    }
}
