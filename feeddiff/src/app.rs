//! Command-line entry logic: argument parsing, configuration and the linear
//! fetch → compare → diagnose run. Exit codes are decided here.

use anyhow::{anyhow, Result};
use clap::error::ErrorKind;
use clap::Parser;
use common::{Config, FetchConfig};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::compare::{compare_with, CompareOptions};
use crate::diagnose::diagnose;
use crate::fetcher::{Fetch, FetchedFeed};
use crate::report;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

const EXAMPLE_ORIGINAL_URL: &str = "https://rthk9.rthk.hk/rthk/news/rss/c_expressnews_clocal.xml";
const EXAMPLE_PROXY_URL: &str =
    "https://rssjumper.vercel.app/?url=https://rthk9.rthk.hk/rthk/news/rss/c_expressnews_clocal.xml";

#[derive(Parser, Debug)]
#[command(
    name = "feeddiff",
    version,
    about = "Compare an RSS feed with its proxied copy and explain why they differ"
)]
pub struct Cli {
    /// URL of the original RSS feed
    #[arg(value_name = "ORIGINAL_URL")]
    pub original_url: String,

    /// URL of the proxy (cache front) serving the same feed
    #[arg(value_name = "PROXY_URL")]
    pub proxy_url: String,

    /// Disable TLS certificate and hostname verification (diagnostics only)
    #[arg(long)]
    pub insecure: bool,

    /// Request timeout in seconds (default 15)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to a TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

/// Parses the command line. On failure the usage text (or help/version) has
/// already been written to `out` and the exit code to use is returned.
pub fn parse_args<I, T, W>(args: I, out: &mut W) -> Result<Cli, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write + ?Sized,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = write!(out, "{}", err);
                Err(EXIT_SUCCESS)
            }
            _ => {
                let rendered = err.to_string();
                let reason = rendered.lines().next().unwrap_or("invalid arguments");
                let _ = write_usage(out, reason);
                Err(EXIT_FAILURE)
            }
        },
    }
}

fn write_usage<W: Write + ?Sized>(out: &mut W, reason: &str) -> std::io::Result<()> {
    writeln!(out, "{}", reason)?;
    writeln!(out)?;
    writeln!(out, "Usage:")?;
    writeln!(out, "  feeddiff <original-rss-url> <proxy-rss-url>")?;
    writeln!(out)?;
    writeln!(out, "Example:")?;
    writeln!(out, "  feeddiff \\")?;
    writeln!(out, "    '{}' \\", EXAMPLE_ORIGINAL_URL)?;
    writeln!(out, "    '{}'", EXAMPLE_PROXY_URL)
}

/// Helper function to validate a URL
fn is_valid_url(url: &str) -> bool {
    if let Ok(parsed) = url::Url::parse(url) {
        parsed.scheme() == "http" || parsed.scheme() == "https"
    } else {
        false
    }
}

/// Parses `args` and runs the check. `connect` builds the fetcher from the
/// effective fetch settings and is only called once the arguments are valid.
pub async fn run<I, T, W, F>(args: I, out: &mut W, connect: F) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write + ?Sized,
    F: FnOnce(&FetchConfig) -> Result<Box<dyn Fetch>>,
{
    match parse_args(args, out) {
        Ok(cli) => execute(cli, out, connect).await,
        Err(code) => code,
    }
}

/// Runs the check for already parsed arguments and returns the exit code.
pub async fn execute<W, F>(cli: Cli, out: &mut W, connect: F) -> u8
where
    W: Write + ?Sized,
    F: FnOnce(&FetchConfig) -> Result<Box<dyn Fetch>>,
{
    for url in [&cli.original_url, &cli.proxy_url] {
        if !is_valid_url(url) {
            let _ = write_usage(out, &format!("error: not an http(s) URL: {}", url));
            return EXIT_FAILURE;
        }
    }

    match check_feeds(&cli, out, connect).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            debug!(error = %format!("{:#}", e), "feed check aborted");
            let _ = writeln!(out, "✗ {:#}", e);
            EXIT_FAILURE
        }
    }
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).await?;
    if let Some(timeout) = cli.timeout {
        config.fetch.timeout_seconds = Some(timeout);
    }
    if cli.insecure {
        config.fetch.insecure_tls = Some(true);
    }
    info!(config = ?cli.config, "configuration loaded");
    Ok(config)
}

async fn check_feeds<W, F>(cli: &Cli, out: &mut W, connect: F) -> Result<()>
where
    W: Write + ?Sized,
    F: FnOnce(&FetchConfig) -> Result<Box<dyn Fetch>>,
{
    let config = load_config(cli).await?;
    let cache_header = config.fetch.cache_header();
    let fetcher = connect(&config.fetch)?;

    report::write_banner(out, "RSS feed diff diagnostics")?;

    writeln!(out, "\n[1/2] Fetching original feed")?;
    let original = fetch_step(fetcher.as_ref(), &cli.original_url, cache_header, out)
        .await?
        .ok_or_else(|| anyhow!("could not fetch the original feed, exiting"))?;

    writeln!(out, "\n[2/2] Fetching proxy feed")?;
    let proxy = fetch_step(fetcher.as_ref(), &cli.proxy_url, cache_header, out)
        .await?
        .ok_or_else(|| anyhow!("could not fetch the proxy feed, exiting"))?;

    let options = CompareOptions {
        sample_limit: config.report.sample_diffs(),
        context_radius: config.report.context_radius(),
    };
    let comparison = compare_with(&original.body, &proxy.body, &options);
    report::write_comparison(out, &comparison, &original.body, &proxy.body)?;

    let diagnosis = diagnose(&comparison, proxy.header(cache_header));
    info!(identical = comparison.identical, diff_count = comparison.diff_count, ?diagnosis, "comparison done");
    report::write_conclusion(out, &diagnosis)?;

    writeln!(out)?;
    report::write_banner(out, "Check complete")?;
    Ok(())
}

/// Fetches one feed and writes its progress lines. A failed fetch is
/// reported on `out` here and comes back as `None`.
async fn fetch_step<W: Write + ?Sized>(
    fetcher: &dyn Fetch,
    url: &str,
    cache_header: &str,
    out: &mut W,
) -> Result<Option<FetchedFeed>> {
    report::write_fetch_start(out, url)?;
    match fetcher.fetch(url).await {
        Ok(feed) => {
            report::write_fetch_summary(out, url, &feed, cache_header)?;
            Ok(Some(feed))
        }
        Err(e) => {
            debug!(%url, error = %format!("{:#}", e), "fetch failed");
            report::write_fetch_error(out, &e)?;
            Ok(None)
        }
    }
}
