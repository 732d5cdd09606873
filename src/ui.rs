use colored::Colorize;
use playbook::RunSummary;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Playbook summaries
// ============================================================================

/// `N phases, N tasks ok, N skipped, N failed`
fn summary_line(summary: &RunSummary) -> String {
    let (ok, skipped, failed) = summary
        .phases
        .iter()
        .fold((0, 0, 0), |(o, s, f), p| (o + p.ok, s + p.skipped, f + p.failed));
    let failed = if failed > 0 {
        format!("{failed} failed").red().to_string()
    } else {
        format!("{failed} failed")
    };
    format!(
        "{} phase(s), {ok} task(s) ok, {skipped} skipped, {failed}",
        summary.phases.len()
    )
}

/// Print the counts of a finished playbook
pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", summary_line(summary).dimmed());
}

// ============================================================================
// Tests
// ============================================================================
