/*
feeddiff - main.rs
Fetches an original RSS feed and its proxied copy, compares them and prints a diagnosis.
*/

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use feeddiff::app;
use feeddiff::fetcher::{Fetch, HttpFetcher};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let mut stdout = std::io::stdout();

    // Parse CLI args; usage errors never reach the network
    let cli = match app::parse_args(std::env::args_os(), &mut stdout) {
        Ok(cli) => cli,
        Err(code) => return ExitCode::from(code),
    };

    // Initialize logging on stderr so stdout carries only the report
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let code = app::execute(cli, &mut stdout, |config| {
        let fetcher = HttpFetcher::new(config)?;
        Ok(Box::new(fetcher) as Box<dyn Fetch>)
    })
    .await;

    ExitCode::from(code)
}
