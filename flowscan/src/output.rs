//! Console and JSON rendering of scan results.

use crate::graph::BuildStats;
use crate::patterns::{Finding, Report, Severity};
use crate::utils::normalize_display_path;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

/// Spinner shown while the build runs. Hidden in test mode to keep test
/// output clean.
#[must_use]
pub fn create_spinner() -> ProgressBar {
    if cfg!(test) {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("flowscan building call graph…");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn severity_cell(severity: Severity) -> Cell {
    let color = match severity {
        Severity::Critical => Color::Red,
        Severity::High => Color::Magenta,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
    };
    Cell::new(severity.to_string()).fg(color)
}

/// Prints findings as a table plus a summary line.
///
/// # Errors
///
/// Returns an error when writing to the output fails.
pub fn print_report(
    writer: &mut impl Write,
    report: &Report,
    stats: &BuildStats,
) -> std::io::Result<()> {
    if report.findings.is_empty() {
        writeln!(
            writer,
            "{} {} files, {} functions, {} call sites ({:.0}% resolved)",
            "[OK] No findings.".green().bold(),
            stats.files_parsed,
            stats.functions,
            stats.call_sites,
            stats.resolution_rate() * 100.0
        )?;
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Severity", "Pattern", "Source", "Sink", "Flow", "Conf"]);

    for finding in &report.findings {
        table.add_row(vec![
            severity_cell(finding.severity),
            Cell::new(&finding.pattern_id),
            Cell::new(format!(
                "{}:{} {}",
                normalize_display_path(&finding.source.file),
                finding.source.line,
                finding.source.call_name
            )),
            Cell::new(format!(
                "{}:{} {}",
                normalize_display_path(&finding.sink.file),
                finding.sink.line,
                finding.sink.call_name
            )),
            Cell::new(if finding.intra_procedural {
                "intra".to_owned()
            } else {
                finding.path.join(" → ")
            }),
            Cell::new(format!("{:.2}", finding.confidence)),
        ]);
    }
    writeln!(writer, "{table}")?;

    let counts = report
        .severity_counts
        .iter()
        .map(|(severity, count)| format!("{count} {severity}"))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        writer,
        "{} {} finding(s): {counts}",
        "[!]".red().bold(),
        report.findings.len()
    )?;
    writeln!(
        writer,
        "    {} files, {} functions, {} call sites ({:.0}% resolved), {} cycles",
        stats.files_parsed,
        stats.functions,
        stats.call_sites,
        stats.resolution_rate() * 100.0,
        stats.cycle_count
    )?;
    Ok(())
}

/// Prints the machine-readable report.
///
/// # Errors
///
/// Returns an error when serialization or writing fails.
pub fn print_json(
    writer: &mut impl Write,
    report: &Report,
    stats: &BuildStats,
) -> std::io::Result<()> {
    let payload = serde_json::json!({
        "findings": report.findings,
        "severity_counts": report.severity_counts,
        "stats": {
            "files_total": stats.files_total,
            "files_parsed": stats.files_parsed,
            "files_failed": stats.files_failed,
            "functions": stats.functions,
            "classes": stats.classes,
            "call_sites": stats.call_sites,
            "resolved_calls": stats.resolved_calls,
            "unresolved_calls": stats.unresolved_calls,
            "failure_counts": stats.failure_counts,
            "cycle_count": stats.cycle_count,
        },
    });
    writeln!(writer, "{}", serde_json::to_string_pretty(&payload)?)
}

/// One-line rendering for logs and tests.
#[must_use]
pub fn format_finding_line(finding: &Finding) -> String {
    format!(
        "[{}] {} {}:{} {} -> {}:{} {}",
        finding.severity,
        finding.pattern_id,
        normalize_display_path(&finding.source.file),
        finding.source.line,
        finding.source.call_name,
        normalize_display_path(&finding.sink.file),
        finding.sink.line,
        finding.sink.call_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::FlowEndpoint;
    use std::path::PathBuf;

    fn sample_finding() -> Finding {
        Finding {
            severity: Severity::Critical,
            pattern_id: "CMD-INJECTION-001".to_owned(),
            pattern_name: "Command Injection".to_owned(),
            description: String::new(),
            cwe: "CWE-78".to_owned(),
            owasp: "A03:2021".to_owned(),
            source: FlowEndpoint {
                fqn: "a.f".to_owned(),
                call_name: "input".to_owned(),
                file: PathBuf::from("a.py"),
                line: 3,
                code_snippet: "x = input()".to_owned(),
            },
            sink: FlowEndpoint {
                fqn: "a.f".to_owned(),
                call_name: "os.system".to_owned(),
                file: PathBuf::from("a.py"),
                line: 4,
                code_snippet: "os.system(x)".to_owned(),
            },
            path: vec!["a.f".to_owned()],
            intra_procedural: true,
            confidence: 1.0,
        }
    }

    #[test]
    fn table_and_json_render() {
        let report = Report::from_findings(vec![sample_finding()]);
        let stats = BuildStats::default();

        let mut text = Vec::new();
        print_report(&mut text, &report, &stats).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("CMD-INJECTION-001"));

        let mut json = Vec::new();
        print_json(&mut json, &report, &stats).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["findings"][0]["pattern_id"], "CMD-INJECTION-001");
        assert_eq!(value["findings"][0]["source"]["line"], 3);
    }

    #[test]
    fn finding_line_is_compact() {
        let line = format_finding_line(&sample_finding());
        assert!(line.contains("a.py:3 input -> a.py:4 os.system"));
    }
}
