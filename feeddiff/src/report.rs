//! Console rendering of fetch progress, the comparison and the conclusion.
//! Everything writes to a caller-supplied sink so tests can capture it.

use std::io::{self, Write};

use crate::compare::{ComparisonReport, LINE_SCAN_LIMIT};
use crate::diagnose::Diagnosis;
use crate::feed::FeedSummary;
use crate::fetcher::FetchedFeed;

/// Header the proxy uses to report whether its own fetch succeeded.
pub const PROXY_STATUS_HEADER: &str = "X-RSSJumper-Status";

/// Characters of each body shown when the feeds differ.
const PREVIEW_CHARS: usize = 200;

/// Characters of each body's end shown when one body is a prefix of the other.
const TAIL_CHARS: usize = 100;

/// Characters of a differing line shown before it is cut off.
const LINE_PREVIEW_CHARS: usize = 100;

const NOT_FOUND: &str = "not found";

pub fn write_banner<W: Write + ?Sized>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "=".repeat(60))
}

fn write_section<W: Write + ?Sized>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    write_banner(out, title)
}

pub fn write_fetch_start<W: Write + ?Sized>(out: &mut W, url: &str) -> io::Result<()> {
    write_section(out, &format!("Fetching: {}", url))
}

/// Progress lines for a successful fetch of `requested_url`.
pub fn write_fetch_summary<W: Write + ?Sized>(
    out: &mut W,
    requested_url: &str,
    feed: &FetchedFeed,
    cache_header: &str,
) -> io::Result<()> {
    writeln!(out, "✓ Status: {}", feed.status)?;
    if feed.url != requested_url {
        writeln!(out, "✓ Redirected to: {}", feed.url)?;
    }
    writeln!(out, "✓ Content-Type: {}", feed.content_type().unwrap_or("N/A"))?;
    writeln!(out, "✓ Cache status: {}", feed.header(cache_header).unwrap_or("N/A"))?;
    if let Some(encoding) = feed.content_encoding() {
        writeln!(out, "✓ Content-Encoding: {}", encoding)?;
    }
    if let Some(status) = feed.header(PROXY_STATUS_HEADER) {
        writeln!(out, "✓ Proxy status: {}", status)?;
    }
    writeln!(out, "✓ Content length: {} characters", feed.char_len())
}

pub fn write_fetch_error<W: Write + ?Sized>(out: &mut W, err: &anyhow::Error) -> io::Result<()> {
    writeln!(out, "✗ Error: {:#}", err)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "✓ yes"
    } else {
        "✗ no"
    }
}

/// Full comparison section. Bodies are only needed for the previews shown
/// when the feeds differ.
pub fn write_comparison<W: Write + ?Sized>(
    out: &mut W,
    report: &ComparisonReport,
    original: &str,
    proxy: &str,
) -> io::Result<()> {
    write_section(out, "Content comparison")?;
    writeln!(out, "Original length: {} characters", report.left_len)?;
    writeln!(out, "Proxy length: {} characters", report.right_len)?;
    writeln!(out, "Length difference: {} characters", report.length_delta())?;
    writeln!(out, "Identical content: {}", yes_no(report.identical))?;

    write_pub_dates(out, report)?;

    if report.identical {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Feed details:")?;
    write_summary(out, "original", &report.left_summary)?;
    write_summary(out, "proxy", &report.right_summary)?;

    writeln!(out)?;
    writeln!(
        out,
        "Character differences: {} (positional, over the first {} characters)",
        report.diff_count,
        report.left_len.min(report.right_len)
    )?;
    if report.diff_count == 0 {
        writeln!(
            out,
            "  The shorter feed is a prefix of the longer one; only the trailing characters differ"
        )?;
        writeln!(out)?;
        writeln!(out, "Original, last {} characters:", TAIL_CHARS)?;
        writeln!(out, "{}", tail(original))?;
        writeln!(out)?;
        writeln!(out, "Proxy, last {} characters:", TAIL_CHARS)?;
        writeln!(out, "{}", tail(proxy))?;
    }

    if !report.sample_diffs.is_empty() {
        writeln!(out)?;
        writeln!(out, "First {} differences:", report.sample_diffs.len())?;
    }
    for diff in &report.sample_diffs {
        writeln!(out)?;
        writeln!(out, "  Position {}:", diff.position)?;
        writeln!(
            out,
            "    original: '{}' (U+{:04X}) in context: ...{}...",
            diff.left.escape_debug(),
            diff.left as u32,
            diff.left_context.escape_debug()
        )?;
        writeln!(
            out,
            "    proxy:    '{}' (U+{:04X}) in context: ...{}...",
            diff.right.escape_debug(),
            diff.right as u32,
            diff.right_context.escape_debug()
        )?;
    }

    write_line_diffs(out, report)?;

    writeln!(out)?;
    writeln!(out, "Original, first {} characters:", PREVIEW_CHARS)?;
    writeln!(out, "{}", preview(original))?;
    writeln!(out)?;
    writeln!(out, "Proxy, first {} characters:", PREVIEW_CHARS)?;
    writeln!(out, "{}", preview(proxy))
}

fn write_line_diffs<W: Write + ?Sized>(out: &mut W, report: &ComparisonReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Line comparison ({} lines in total, first {} checked):",
        report.total_lines,
        report.total_lines.min(LINE_SCAN_LIMIT)
    )?;
    for diff in &report.line_diffs {
        writeln!(out, "  Line {} differs:", diff.line)?;
        writeln!(out, "    original: {}", truncate_line(&diff.left))?;
        writeln!(out, "    proxy:    {}", truncate_line(&diff.right))?;
    }
    writeln!(out, "{} differing lines found", report.line_diff_count)
}

fn truncate_line(line: &str) -> String {
    let mut chars = line.chars();
    let shown: String = chars.by_ref().take(LINE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", shown)
    } else {
        shown
    }
}

fn write_pub_dates<W: Write + ?Sized>(out: &mut W, report: &ComparisonReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "pubDate comparison:")?;
    writeln!(
        out,
        "  original: {}",
        report.left_pub_date.as_deref().unwrap_or(NOT_FOUND)
    )?;
    writeln!(
        out,
        "  proxy:    {}",
        report.right_pub_date.as_deref().unwrap_or(NOT_FOUND)
    )?;

    match (&report.left_pub_date, &report.right_pub_date) {
        _ if report.pub_dates_match => writeln!(out, "  ✓ pubDate matches"),
        (Some(_), Some(_)) => writeln!(out, "  ⚠️  pubDate differs!"),
        (None, None) => writeln!(out, "  ? pubDate not found in either feed, cannot compare"),
        _ => writeln!(out, "  ⚠️  pubDate found in only one feed"),
    }
}

fn write_summary<W: Write + ?Sized>(out: &mut W, label: &str, summary: &FeedSummary) -> io::Result<()> {
    let items = summary
        .item_count
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unparsable".to_string());
    writeln!(
        out,
        "  {:<8} declared encoding: {}, items: {}",
        format!("{}:", label),
        summary.declared_encoding.as_deref().unwrap_or(NOT_FOUND),
        items
    )
}

fn preview(body: &str) -> String {
    body.chars().take(PREVIEW_CHARS).collect()
}

fn tail(body: &str) -> String {
    let len = body.chars().count();
    body.chars().skip(len.saturating_sub(TAIL_CHARS)).collect()
}

pub fn write_conclusion<W: Write + ?Sized>(out: &mut W, diagnosis: &Diagnosis) -> io::Result<()> {
    write_section(out, "Diagnosis")?;
    writeln!(out, "{}", diagnosis)
}
