//! Output rendering and formatting

use aptsync_types::{format_size, SyncReport, SyncState};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io;

/// Output renderer for the final report
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
    colors: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool, colors: bool) -> Self {
        Self {
            json_output,
            colors,
        }
    }

    /// Render the report of one run
    pub fn render_report(&self, report: &SyncReport) -> io::Result<()> {
        if self.json_output {
            let json = aptsync_ops::report_to_json(report).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        println!("{}", self.summary_table(report));
        if !report.unresolved.is_empty() {
            println!();
            println!("Unresolved repository entries:");
            println!("{}", self.unresolved_table(report));
        }
        if !report.failures.is_empty() {
            println!();
            println!("Failed downloads (retried on the next run):");
            println!("{}", self.failures_table(report));
        }
        if !report.integrity_conflicts.is_empty() {
            println!();
            println!("Conflicting index declarations:");
            for conflict in &report.integrity_conflicts {
                println!(
                    "  {} (entries {} and {}): {}",
                    conflict.rel_path,
                    conflict.first_owner.0,
                    conflict.conflicting_owner.0,
                    conflict.message
                );
            }
        }
        if !report.recovered_paths.is_empty() {
            println!();
            println!("Recovered after an interrupted run:");
            for path in &report.recovered_paths {
                println!("  {}", path.display());
            }
        }
        Ok(())
    }

    fn summary_table(&self, report: &SyncReport) -> Table {
        let mut table = self.table();
        table.set_header(vec![
            Cell::new("Summary").add_attribute(Attribute::Bold),
            Cell::new("").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("State"), self.state_cell(report)]);
        if report.dry_run {
            table.add_row(vec![
                Cell::new("Would download"),
                Cell::new(format!(
                    "{} files, {}",
                    report.files_planned,
                    format_size(report.bytes_planned)
                )),
            ]);
            table.add_row(vec![
                Cell::new("Would clean"),
                Cell::new(format!(
                    "{} files, {}",
                    report.files_would_clean,
                    format_size(report.bytes_would_reclaim)
                )),
            ]);
        } else {
            table.add_row(vec![
                Cell::new("Downloaded"),
                Cell::new(format!(
                    "{} files, {}",
                    report.files_downloaded,
                    format_size(report.bytes_downloaded)
                )),
            ]);
            table.add_row(vec![
                Cell::new("Unchanged"),
                Cell::new(report.files_skipped.to_string()),
            ]);
            table.add_row(vec![
                Cell::new("Cleaned"),
                Cell::new(format!(
                    "{} files, {}",
                    report.files_cleaned,
                    format_size(report.bytes_reclaimed)
                )),
            ]);
        }
        table.add_row(vec![
            Cell::new("Index files"),
            Cell::new(format!(
                "{} fetched ({}), {} unchanged",
                report.index_files_downloaded,
                format_size(report.index_bytes_downloaded),
                report.index_files_unchanged
            )),
        ]);
        table.add_row(vec![
            Cell::new("Failed"),
            self.count_cell(report.files_failed() + report.unresolved.len()),
        ]);
        if report.files_cancelled > 0 {
            table.add_row(vec![
                Cell::new("Cancelled"),
                Cell::new(report.files_cancelled.to_string()),
            ]);
        }
        table.add_row(vec![
            Cell::new("Duration"),
            Cell::new(format!("{}ms", report.duration_ms)),
        ]);
        table
    }

    fn unresolved_table(&self, report: &SyncReport) -> Table {
        let mut table = self.table();
        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Entry").add_attribute(Attribute::Bold),
            Cell::new("Reason").add_attribute(Attribute::Bold),
        ]);
        for failure in &report.unresolved {
            table.add_row(vec![
                Cell::new(failure.entry.0),
                Cell::new(&failure.description),
                Cell::new(&failure.message),
            ]);
        }
        table
    }

    fn failures_table(&self, report: &SyncReport) -> Table {
        let mut table = self.table();
        table.set_header(vec![
            Cell::new("Path").add_attribute(Attribute::Bold),
            Cell::new("Reason").add_attribute(Attribute::Bold),
        ]);
        for failure in &report.failures {
            table.add_row(vec![
                Cell::new(&failure.rel_path),
                Cell::new(failure.reason.to_string()),
            ]);
        }
        table
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.colors {
            table.force_no_tty();
        }
        table
    }

    fn state_cell(&self, report: &SyncReport) -> Cell {
        let text = format!("{:?}", report.state);
        if !self.colors {
            return Cell::new(text);
        }
        match report.state {
            SyncState::Done if report.is_success() => Cell::new(text).fg(Color::Green),
            SyncState::Done => Cell::new(text).fg(Color::Yellow),
            _ => Cell::new(text).fg(Color::Red),
        }
    }

    fn count_cell(&self, count: usize) -> Cell {
        let cell = Cell::new(count.to_string());
        if self.colors && count > 0 {
            cell.fg(Color::Red)
        } else {
            cell
        }
    }
}
