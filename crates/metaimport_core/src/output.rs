//! Line-oriented terminal output in the WP-CLI register: plain progress
//! lines on stdout, warnings and non-fatal errors on stderr.

use colored::Colorize;

pub fn log(message: &str) {
    println!("{message}");
}

pub fn success(message: &str) {
    println!("{} {message}", "Success:".green());
}

pub fn warning(message: &str) {
    eprintln!("{} {message}", "Warning:".yellow());
}

/// Non-fatal error: reported inline, never terminates the run.
pub fn error(message: &str) {
    eprintln!("{} {message}", "Error:".red());
}

/// Header for one half of a dry-run diff, e.g. `title Before:`.
pub fn diff_header(key: &str, marker: &str) {
    println!("{} {}", key.yellow(), marker.cyan());
}
