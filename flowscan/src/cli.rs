//! Command-line interface definition.

use clap::Parser;
use std::path::PathBuf;

/// Help text for the configuration file, shown at the bottom of --help.
const CONFIG_HELP: &str = "\
CONFIGURATION FILE (flowscan.toml):
  Create this file in the scan root to set defaults.

  [flowscan]
  max_workers = 8                  # Worker pool override (capped at 32)
  exclude_folders = [\"fixtures\"]   # Skipped in addition to the defaults
  patterns_file = \"patterns.toml\"  # Replace the built-in pattern set
  min_severity = \"medium\"          # Drop findings below this severity
  fail_on_findings = true          # Exit 1 when findings remain

  The FLOWSCAN_MAX_WORKERS environment variable overrides max_workers.
";

/// Static taint-flow scanner for Python projects.
#[derive(Parser, Debug)]
#[command(name = "flowscan", version, about, after_help = CONFIG_HELP)]
pub struct Cli {
    /// Project root to scan.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Output findings as JSON.
    #[arg(long)]
    pub json: bool,

    /// Pattern file replacing the built-in set.
    #[arg(long, value_name = "FILE")]
    pub patterns: Option<PathBuf>,

    /// Worker-pool size (capped at 32).
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Minimum severity to report: critical, high, medium, low.
    #[arg(long, value_name = "SEVERITY")]
    pub min_severity: Option<String>,

    /// Additional folder names to exclude from the walk.
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Suppress the progress spinner.
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 1 when findings remain after filtering.
    #[arg(long)]
    pub fail_on_findings: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_scan_current_directory() {
        let cli = Cli::parse_from(["flowscan"]);
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(!cli.json);
        assert!(cli.exclude.is_empty());
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::parse_from([
            "flowscan",
            "proj",
            "--json",
            "--max-workers",
            "8",
            "--min-severity",
            "high",
            "--exclude",
            "fixtures",
        ]);
        assert_eq!(cli.path, PathBuf::from("proj"));
        assert!(cli.json);
        assert_eq!(cli.max_workers, Some(8));
        assert_eq!(cli.min_severity.as_deref(), Some("high"));
        assert_eq!(cli.exclude, ["fixtures"]);
    }
}
