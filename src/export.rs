//! Export Module
//!
//! Writes a machine-readable copy of a run next to the textual summary: the
//! whole [`RunSummary`] as JSON, or one CSV row per evaluated record.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::models::{RecordOutcome, RunSummary};

/// Supported export formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => bail!("Unsupported export format for {} (use .json or .csv)", path.display()),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonExport<'a> {
    exit_code: u8,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    org_name: &'a str,
    report_id: &'a str,
    domain: &'a str,
    record: usize,
    source_ip: &'a str,
    hostname: &'a str,
    count: u64,
    header_from: &'a str,
    dkim: String,
    spf: String,
    disposition: String,
    passed: bool,
}

/// Writes `summary` to `path` in the format implied by its extension.
pub fn export_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let format = ExportFormat::from_path(path)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file {}", path.display()))?;
    write_summary(BufWriter::new(file), format, summary)
}

/// Writes `summary` to any writer.
pub fn write_summary<W: Write>(mut writer: W, format: ExportFormat, summary: &RunSummary) -> Result<()> {
    match format {
        ExportFormat::Json => {
            let export = JsonExport {
                exit_code: summary.exit_code(),
                summary,
            };
            serde_json::to_writer_pretty(&mut writer, &export)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(writer);
            for report in &summary.reports {
                let meta = &report.metadata;
                for outcome in &report.records {
                    // Invalid records have nothing to tabulate.
                    let RecordOutcome::Evaluated(evaluated) = outcome else {
                        continue;
                    };
                    let record = &evaluated.record;
                    wtr.serialize(CsvRow {
                        org_name: &meta.org_name,
                        report_id: &meta.report_id,
                        domain: &meta.domain,
                        record: evaluated.index,
                        source_ip: &record.source_ip,
                        hostname: &evaluated.hostname,
                        count: record.count,
                        header_from: record.header_from.as_deref().unwrap_or_default(),
                        dkim: record.dkim_results.join(" "),
                        spf: record.spf_results.join(" "),
                        disposition: record.dispositions.join(" "),
                        passed: record.passed(),
                    })?;
                }
            }
            wtr.flush()?;
        }
    }
    Ok(())
}
