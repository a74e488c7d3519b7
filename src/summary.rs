//! Summary Rendering Module
//!
//! This module renders the line-oriented text output: one block per report
//! (failing values, dispositions, per-record verdicts in document order and a
//! per-report total) and the run-wide totals block at the end.
use std::io::{self, Write};
use std::path::Path;

use chrono::{Local, TimeZone};

use crate::dns::HostnameResolver;
use crate::mailbox::RawMessage;
use crate::models::{EvaluatedRecord, RecordOutcome, ReportOutcome, RunSummary};
use crate::scanner::{AttachmentOutcome, Scanner};

const IP_INFO_URL: &str = "https://whatismyipaddress.com/ip/";
/// Shown in place of an empty DKIM/SPF result.
const EMPTY_RESULT: &str = "(empty)";

/// Names the folder being analyzed, framed by blank lines.
pub fn render_banner<W: Write>(out: &mut W, folder: &Path) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Analyzing DMARC reports in the folder '{}'", folder.display())?;
    writeln!(out)
}

/// Scans every message in order, printing each report as it completes, and
/// returns the run summary after printing the totals block.
///
/// A message that cannot be parsed counts as a failure; it never stops the run.
pub async fn analyze_messages<R, W>(
    scanner: &Scanner<'_, R>,
    messages: &[RawMessage],
    out: &mut W,
    details: bool,
) -> io::Result<RunSummary>
where
    R: HostnameResolver,
    W: Write,
{
    let mut summary = RunSummary::default();
    for message in messages {
        let parsed = match mailparse::parse_mail(&message.bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Message {} could not be parsed: {}", message.id, e);
                writeln!(out, "WARNING: message {} could not be parsed: {}", message.id, e)?;
                summary.record_message(true, Vec::new());
                continue;
            }
        };
        let scan = scanner.scan_message(&parsed).await;
        for attachment in &scan.attachments {
            render_attachment(out, attachment, details)?;
        }
        let failure_detected = scan.failure_detected();
        if failure_detected {
            log::info!("Failure detected in message {}", message.id);
        }
        summary.record_message(failure_detected, scan.into_reports());
    }
    render_summary(out, &summary)?;
    Ok(summary)
}

/// Renders the block for a single attachment: a report, or why there is none.
pub fn render_attachment<W: Write>(
    out: &mut W,
    outcome: &AttachmentOutcome,
    details: bool,
) -> io::Result<()> {
    match &outcome.result {
        Ok(report) => render_report(out, report, details),
        Err(e) if !e.is_failure() => writeln!(out, "WARNING: {}", e),
        Err(e) => {
            writeln!(
                out,
                "WARNING: attachment '{}' could not be processed: {}",
                outcome.filename, e
            )?;
            writeln!(out)
        }
    }
}

/// Renders one evaluated report.
///
/// Passing records are only listed when `details` is set.
pub fn render_report<W: Write>(out: &mut W, report: &ReportOutcome, details: bool) -> io::Result<()> {
    let meta = &report.metadata;
    writeln!(
        out,
        "Report: {:<14} for {:>12} (Period {} - {})",
        meta.org_name,
        meta.domain,
        format_timestamp(meta.date_range.begin),
        format_timestamp(meta.date_range.end)
    )?;
    if details {
        let policy = &meta.policy;
        write!(out, "  Policy: p={}", policy.policy)?;
        if let Some(sp) = policy.subdomain_policy {
            write!(out, " sp={}", sp)?;
        }
        writeln!(
            out,
            " adkim={} aspf={} pct={} (report id {})",
            policy.adkim, policy.aspf, policy.pct, meta.report_id
        )?;
    }

    for outcome in &report.records {
        match outcome {
            RecordOutcome::Evaluated(record) => render_record(out, record, details)?,
            RecordOutcome::Invalid { index, reason } => {
                writeln!(out, "WARNING: record {} could not be evaluated: {}", index, reason)?
            }
        }
    }

    if report.any_failure {
        writeln!(
            out,
            " Total of {} email(s) checked and {} emails NOT passed",
            report.messages_checked, report.messages_failed
        )?;
    } else {
        writeln!(out, " Total of {} email(s) checked and all OK!", report.messages_checked)?;
    }
    writeln!(out)
}

fn render_record<W: Write>(out: &mut W, evaluated: &EvaluatedRecord, details: bool) -> io::Result<()> {
    let index = evaluated.index;
    let record = &evaluated.record;
    let failures = record.failures();

    if failures.is_empty() {
        if details {
            writeln!(
                out,
                "    - record {}: OK! {:>3} email(s) checked send from: {:<25} (IP: {})",
                index, record.count, evaluated.hostname, record.source_ip
            )?;
        }
        return Ok(());
    }

    for (mechanism, value) in failures {
        let value = if value.is_empty() { EMPTY_RESULT } else { value };
        writeln!(out, "      + record {}: {}: {}", index, mechanism, value)?;
    }
    for disposition in &record.dispositions {
        writeln!(out, "      + record {}: Disposition/DMARC action: {}", index, disposition)?;
    }
    writeln!(
        out,
        "    - record {}: FAIL: {} mail(s) send from: {} (More info at {}{})",
        index, record.count, evaluated.hostname, IP_INFO_URL, record.source_ip
    )
}

/// Renders the run-wide totals block.
pub fn render_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
    if summary.messages_processed == 0 {
        writeln!(out, "No DMARC reports to process in this folder")?;
    }
    let totals = &summary.totals;
    writeln!(out)?;
    writeln!(out, "DMARC analyse summary:")?;
    writeln!(out, " - Total DMARC report mails processed: {}", summary.messages_processed)?;
    writeln!(out, " - Nr of messages checked: {:>2}", totals.messages_checked)?;
    writeln!(out, " - Nr of messages passed:  {:>2}", totals.messages_passed())?;
    writeln!(out, " - Nr of messages failed:  {:>2}", totals.messages_failed)?;
    writeln!(out)
}

/// Epoch seconds as a local `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn format_timestamp(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => secs.to_string(),
    }
}
