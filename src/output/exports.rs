use anyhow::Result;
use clap::ValueEnum;
use std::io::Write;

use super::Report;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored tables for a terminal
    #[default]
    Summary,
    Json,
    Csv,
}

/// Writes a report in the requested format.
///
/// - Summary: tables meant for a human reading stdout
/// - JSON: the whole report, failures included
/// - CSV: one line per result row, for spreadsheets
pub fn write_report<R: Report>(
    report: &R,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", report.summary())?;
        }
        OutputFormat::Json => export_json(report, pretty, output)?,
        OutputFormat::Csv => export_csv(report, output)?,
    }
    Ok(())
}

fn export_json<R: Report>(report: &R, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_csv<R: Report>(report: &R, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "{}", R::csv_header())?;
    for row in report.csv_rows() {
        writeln!(output, "{row}")?;
    }
    Ok(())
}

/// Quotes a CSV field when it contains a separator, quote or line break.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
