//! Progress reporting for the migration pipeline
//!
//! Provides per-table progress bars using indicatif, plus the header and
//! summary printers for the CLI.

use crate::extract::ExtractReport;
use crate::load::LoadReport;
use crate::verify::VerifyReport;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar for one table load
pub struct TableProgress {
    bar: ProgressBar,
}

impl TableProgress {
    /// Create a bar sized to the table's row count
    pub fn new(table_name: &str, total_rows: u64) -> Self {
        let bar = ProgressBar::new(total_rows);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>18} [{bar:30.green}] {pos}/{len} {msg}")
                .expect("Invalid progress template")
                .progress_chars("=> "),
        );
        bar.set_prefix(table_name.to_string());
        Self { bar }
    }

    /// Advance by one batch's worth of rows
    pub fn advance(&self, rows: u64) {
        self.bar.inc(rows);
    }

    /// Show the estimated time remaining
    pub fn set_eta(&self, eta: Duration) {
        self.bar.set_message(format!("eta {}", format_eta(eta)));
    }

    /// Finish the bar with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Linear extrapolation of time remaining from elapsed time and progress.
/// Deliberately simple: elapsed-per-row times rows remaining.
pub fn estimate_remaining(elapsed: Duration, done: u64, total: u64) -> Option<Duration> {
    if done == 0 || total <= done {
        return None;
    }
    let per_row = elapsed.as_secs_f64() / done as f64;
    let remaining = (total - done) as f64 * per_row;
    Some(Duration::from_secs_f64(remaining))
}

fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of a run
pub fn print_header(stage: &str, source: &str, destination: &str) {
    println!();
    println!(
        "{} {}",
        style("practice-migrate").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Stage:").bold(), stage);
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Destination:").bold(), destination);
    println!();
}

/// Print the extraction summary
pub fn print_extract_summary(report: &ExtractReport) {
    println!();
    println!("{}", style("Extraction Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    for table in &report.tables {
        println!(
            "  {:>18} {} rows -> {}",
            table.table.spec().legacy_name,
            format_number(table.rows),
            table.artifact.display()
        );
        if let Some(warning) = &table.count_warning {
            println!("  {:>18} {}", "", style(warning).yellow());
        }
    }
    println!(
        "  {} {}",
        style("Total:").bold(),
        format_number(report.total_rows())
    );
    println!();
}

/// Print the load summary
pub fn print_load_summary(report: &LoadReport, duration: Duration) {
    println!();
    if report.is_clean() {
        println!("{}", style("Load Complete").green().bold());
    } else {
        println!("{}", style("Load Complete (with failures)").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    for outcome in &report.tables {
        let line = format!(
            "  {:>18} {}/{} rows, {} batches",
            outcome.table.to_string(),
            format_number(outcome.rows_loaded),
            format_number(outcome.rows_read),
            outcome.batches_committed,
        );
        if outcome.is_clean() {
            println!("{line}");
        } else {
            println!(
                "{line}, {}",
                style(format!("{} failed", outcome.batches_failed)).red()
            );
        }
        for error in &outcome.errors {
            println!(
                "  {:>18} {}",
                "",
                style(format!(
                    "ids {}-{}: {}",
                    error.first_id, error.last_id, error.message
                ))
                .red()
            );
        }
    }
    println!(
        "  {} {} rows in {:.1}s",
        style("Total:").bold(),
        format_number(report.rows_loaded()),
        duration.as_secs_f64()
    );
    println!();
}

/// Print the verification summary
pub fn print_verify_summary(report: &VerifyReport) {
    println!();
    if report.is_clean() {
        println!("{}", style("Verification Passed").green().bold());
    } else {
        println!("{}", style("VERIFICATION FAILED").red().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    for check in &report.tables {
        print!(
            "  {:>18} {} rows",
            check.table.to_string(),
            format_number(check.rows)
        );
        let stale = check.stale_total();
        if stale > 0 {
            print!(
                " {}",
                style(format!("({stale} rows with pre-1900 dates)")).red()
            );
        }
        println!();
    }
    if !report.is_clean() {
        println!(
            "  {}",
            style(format!(
                "{} rows still carry the legacy sentinel or another pre-1900 date",
                report.stale_date_total()
            ))
            .red()
            .bold()
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_estimate_remaining_linear() {
        // 10s for 100 of 300 rows: 20s remain
        let eta = estimate_remaining(Duration::from_secs(10), 100, 300).unwrap();
        assert_eq!(eta.as_secs(), 20);
    }

    #[test]
    fn test_estimate_remaining_edges() {
        assert!(estimate_remaining(Duration::from_secs(10), 0, 300).is_none());
        assert!(estimate_remaining(Duration::from_secs(10), 300, 300).is_none());
        assert!(estimate_remaining(Duration::from_secs(10), 301, 300).is_none());
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Duration::from_secs(42)), "42s");
        assert_eq!(format_eta(Duration::from_secs(125)), "2m05s");
    }
}
