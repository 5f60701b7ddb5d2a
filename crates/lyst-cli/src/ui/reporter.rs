//! Line-oriented terminal reporter.

use super::theme::Icons;
use crossterm::style::Stylize;
use lyst_core::Reporter;

/// Prints build progress, one line per app.
///
/// Skipped apps are only shown with `--verbose`; a typical catalogue has far
/// more apps without an artifact for a given target than with one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalReporter {
    icons: Icons,
    verbose: bool,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            icons: Icons::default(),
            verbose,
        }
    }
}

impl Reporter for TerminalReporter {
    fn section(&self, title: &str) {
        println!();
        println!("{} {}", title.white().bold(), "─".repeat(40).dark_grey());
    }

    fn generated(&self, _target: &str, app: &str, detail: &str) {
        println!(
            "  {} {:<28} {}",
            self.icons.success.green(),
            app,
            detail.dark_grey()
        );
    }

    fn skipped(&self, _target: &str, app: &str, reason: &str) {
        if self.verbose {
            println!(
                "  {} {:<28} {}",
                self.icons.skipped.dark_grey(),
                app.dark_grey(),
                reason.dark_grey()
            );
        }
    }

    fn failed(&self, _target: &str, app: &str, reason: &str) {
        println!("  {} {:<28} {}", self.icons.error.red(), app, reason.red());
    }

    fn info(&self, msg: &str) {
        println!("  {} {}", self.icons.info.cyan(), msg);
    }

    fn warning(&self, msg: &str) {
        println!("  {} {}", self.icons.warning.yellow(), msg.yellow());
    }

    fn error(&self, msg: &str) {
        eprintln!("  {} {}", self.icons.error.red(), msg.red());
    }
}
