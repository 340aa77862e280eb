//! Binary entry point for the flowscan scanner.

use anyhow::Result;
use clap::Parser;
use flowscan::cli::Cli;
use flowscan::config::Config;
use flowscan::output;
use flowscan::scanner::{ScanOptions, Scanner};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.path)?;

    let options = ScanOptions {
        max_workers: cli.max_workers,
        exclude_folders: cli.exclude.clone(),
        patterns_file: cli.patterns.clone(),
        min_severity: cli
            .min_severity
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|err: String| anyhow::anyhow!(err))?,
    }
    .overlaid_on(&config);

    let spinner = (!cli.quiet && !cli.json).then(output::create_spinner);
    let scanner = Scanner::new(options);
    let outcome = scanner.scan(&cli.path);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let outcome = outcome?;

    let mut stdout = std::io::stdout();
    if cli.json {
        output::print_json(&mut stdout, &outcome.report, &outcome.stats)?;
    } else {
        output::print_report(&mut stdout, &outcome.report, &outcome.stats)?;
    }

    let fail = cli.fail_on_findings || config.flowscan.fail_on_findings.unwrap_or(false);
    if fail && !outcome.report.findings.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
