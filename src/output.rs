use std::io::{self, Write};

use serde::Serialize;

use crate::error::ErrorReport;
use crate::report::{Alert, Cell, Flag, Report, Section};
use crate::resolver::{ProgressEvent, ProgressSink};
use crate::version::VersionSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &Report) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_error(report: &ErrorReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_versions(result: &VersionSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain-text rendering: one block per section, tab-separated rows.
pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &Report) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_report(&mut stdout, report)
    }

    pub fn write_report(out: &mut impl Write, report: &Report) -> io::Result<()> {
        writeln!(out, "{}", report.title)?;
        if let Some(release) = &report.release {
            writeln!(out, "release: {release}")?;
        }
        for section in &report.sections {
            writeln!(out)?;
            Self::write_section(out, section)?;
        }
        Ok(())
    }

    fn write_section(out: &mut impl Write, section: &Section) -> io::Result<()> {
        match &section.source {
            Some(source) if source != &section.title => {
                writeln!(out, "== {} [{source}] ({})", section.title, section.rows.len())?
            }
            _ => writeln!(out, "== {} ({})", section.title, section.rows.len())?,
        }
        if section.is_empty() {
            writeln!(out, "   no entries")?;
            return Ok(());
        }
        writeln!(out, "{}", section.columns.join("\t"))?;
        for row in &section.rows {
            let cells: Vec<String> = row.cells.iter().map(render_cell).collect();
            writeln!(out, "{}", cells.join("\t"))?;
        }
        for alert in &section.alerts {
            let message = match alert {
                Alert::AssetsMissing => "some files were not found in object storage",
                Alert::AssetErrors => "some files caused errors",
            };
            writeln!(out, "!! {message}")?;
        }
        Ok(())
    }

    pub fn print_error(report: &ErrorReport) {
        eprintln!("{}\n{}", report.title, report.message);
    }

    pub fn print_versions(result: &VersionSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if result.selected.is_empty() {
            writeln!(stdout, "no published versions recorded")?;
            return Ok(());
        }
        writeln!(
            stdout,
            "versions: {} (selected {})",
            result.versions.join(", "),
            result.selected
        )?;
        if let Some(snapshot) = &result.snapshot {
            for (library, component) in &snapshot.components {
                writeln!(
                    stdout,
                    "{library}\t{}\t{}",
                    component.version, component.count
                )?;
            }
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("{}", event.message),
        }
    }
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Text { value } => value.clone(),
        Cell::Link { url, label } if url == label => url.clone(),
        Cell::Link { url, label } => format!("{label} <{url}>"),
        Cell::Flagged { value, flag } => {
            let marker = match flag {
                Flag::ReleaseMismatch => "release mismatch",
                Flag::AssetMissing => "missing",
                Flag::AssetError => "error",
            };
            format!("{value} [{marker}]")
        }
    }
}
