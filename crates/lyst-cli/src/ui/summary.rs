//! Result tables printed at the end of a command.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use lyst_core::TargetReport;
use lyst_core::verify::VerifyReport;
use std::path::PathBuf;

fn base_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::DarkGrey)));
    table
}

fn status_cell(ok: bool) -> Cell {
    if ok {
        Cell::new("SUCCESS").fg(Color::Green)
    } else {
        Cell::new("FAILED").fg(Color::Red)
    }
}

/// One row per target: counts plus SUCCESS/FAILED.
pub fn build_table(reports: &[(String, Result<TargetReport, String>)]) -> Table {
    let mut table = base_table(&[
        "Target",
        "Generated",
        "Skipped",
        "Failed",
        "Files (new/updated/same)",
        "Pruned",
        "Status",
    ]);
    for (name, result) in reports {
        match result {
            Ok(report) => {
                table.add_row(vec![
                    Cell::new(name),
                    Cell::new(report.generated),
                    Cell::new(report.skipped),
                    Cell::new(report.failed),
                    Cell::new(format!(
                        "{}/{}/{}",
                        report.files.created, report.files.updated, report.files.unchanged
                    )),
                    Cell::new(report.pruned),
                    status_cell(report.success()),
                ]);
            }
            Err(reason) => {
                table.add_row(vec![
                    Cell::new(name),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(reason),
                    Cell::new("-"),
                    status_cell(false),
                ]);
            }
        }
    }
    table
}

/// One row per verified directory.
pub fn verify_table(reports: &[(PathBuf, VerifyReport)]) -> Table {
    let mut table = base_table(&["Directory", "Checked", "Errors", "Warnings", "Status"]);
    for (dir, report) in reports {
        table.add_row(vec![
            Cell::new(dir.display()),
            Cell::new(report.checked),
            Cell::new(report.errors().count()),
            Cell::new(report.warnings().count()),
            status_cell(report.is_ok()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_target_is_marked() {
        let mut ok = TargetReport::new("homebrew");
        ok.generated = 3;
        let rows = vec![
            ("homebrew".to_string(), Ok(ok)),
            ("winget".to_string(), Ok(TargetReport::new("winget"))),
            ("fdroid".to_string(), Err("catalogue unavailable".to_string())),
        ];
        let rendered = build_table(&rows).to_string();
        assert!(rendered.contains("SUCCESS"));
        assert_eq!(rendered.matches("FAILED").count(), 2);
        assert!(rendered.contains("catalogue unavailable"));
    }

    #[test]
    fn verify_rows_count_findings() {
        let report = VerifyReport {
            checked: 2,
            findings: Vec::new(),
        };
        let rendered = verify_table(&[(PathBuf::from("homebrew-tap"), report)]).to_string();
        assert!(rendered.contains("homebrew-tap"));
        assert!(rendered.contains("SUCCESS"));
    }
}
