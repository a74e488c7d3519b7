//! Data Models Module
//!
//! This module defines the core data structures used to represent DMARC aggregate
//! reports (metadata, published policy, per-record authentication results) and the
//! outcomes the analyzer derives from them, from a single record up to the whole run.
use crate::error::DmarcError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only DKIM/SPF result value that counts as passing.
pub const PASS: &str = "pass";

/// An attachment part lifted out of a message, before decompression.
#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportMetadata {
    pub org_name: String,
    pub report_id: String,
    pub date_range: DateRange,
    pub domain: String,
    pub policy: PublishedPolicy,
}
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub begin: i64,
    pub end: i64,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PublishedPolicy {
    pub adkim: AlignmentMode,
    pub aspf: AlignmentMode,
    pub policy: PolicyType,
    pub subdomain_policy: Option<PolicyType>,
    pub pct: u8,
}
impl Default for PublishedPolicy {
    fn default() -> Self {
        PublishedPolicy {
            adkim: AlignmentMode::Relaxed,
            aspf: AlignmentMode::Relaxed,
            policy: PolicyType::None,
            subdomain_policy: None,
            pct: 100,
        }
    }
}
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub enum AlignmentMode {
    #[default]
    Relaxed,
    Strict,
}
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub enum PolicyType {
    #[default]
    None,
    Quarantine,
    Reject,
}

/// Authentication mechanism a record result belongs to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Dkim,
    Spf,
}

/// One `<record>` of a report, as read from the document.
///
/// Result values are kept verbatim: anything other than exactly `pass`
/// (including an empty element) is a failure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthRecord {
    pub source_ip: String,
    pub count: u64,
    pub header_from: Option<String>,
    pub dkim_results: Vec<String>,
    pub spf_results: Vec<String>,
    pub dispositions: Vec<String>,
}
impl AuthRecord {
    /// Every non-passing DKIM result followed by every non-passing SPF result,
    /// in document order.
    pub fn failures(&self) -> Vec<(Mechanism, &str)> {
        let dkim = self.dkim_results.iter().map(|r| (Mechanism::Dkim, r.as_str()));
        let spf = self.spf_results.iter().map(|r| (Mechanism::Spf, r.as_str()));
        dkim.chain(spf).filter(|(_, r)| *r != PASS).collect()
    }

    /// A record with no DKIM or SPF results at all passes.
    pub fn passed(&self) -> bool {
        self.dkim_results
            .iter()
            .chain(self.spf_results.iter())
            .all(|r| r == PASS)
    }
}

/// A record together with its reverse-DNS enrichment.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EvaluatedRecord {
    /// 1-based position of the record in the report.
    pub index: usize,
    pub hostname: String,
    #[serde(flatten)]
    pub record: AuthRecord,
}

/// Per-record result: either evaluated, or rejected with the reason.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordOutcome {
    Evaluated(EvaluatedRecord),
    Invalid { index: usize, reason: String },
}
impl RecordOutcome {
    pub fn index(&self) -> usize {
        match self {
            RecordOutcome::Evaluated(r) => r.index,
            RecordOutcome::Invalid { index, .. } => *index,
        }
    }

    pub fn is_failure(&self) -> bool {
        match self {
            RecordOutcome::Evaluated(r) => !r.record.passed(),
            RecordOutcome::Invalid { .. } => true,
        }
    }
}

/// Everything learned from one report attachment.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportOutcome {
    pub metadata: ReportMetadata,
    pub records: Vec<RecordOutcome>,
    pub records_seen: usize,
    pub messages_checked: u64,
    pub messages_failed: u64,
    pub any_failure: bool,
}
impl ReportOutcome {
    /// Folds the per-record outcomes into report-level counters.
    ///
    /// Only evaluated records contribute to the message counts; an invalid
    /// record contributes nothing but still marks the report as failed. A record
    /// whose count would overflow the report total is turned into an invalid one.
    pub fn new(metadata: ReportMetadata, records: Vec<RecordOutcome>) -> Self {
        let mut messages_checked: u64 = 0;
        let mut messages_failed: u64 = 0;
        let records: Vec<RecordOutcome> = records
            .into_iter()
            .map(|outcome| match outcome {
                RecordOutcome::Evaluated(r) => match messages_checked.checked_add(r.record.count) {
                    Some(total) => {
                        messages_checked = total;
                        // Failed is a subset of checked, so it cannot overflow here.
                        if !r.record.passed() {
                            messages_failed += r.record.count;
                        }
                        RecordOutcome::Evaluated(r)
                    }
                    None => {
                        let reason = DmarcError::Record(format!(
                            "count {} overflows the report total",
                            r.record.count
                        ));
                        log::warn!("Record {} could not be evaluated: {}", r.index, reason);
                        RecordOutcome::Invalid {
                            index: r.index,
                            reason: reason.to_string(),
                        }
                    }
                },
                invalid => invalid,
            })
            .collect();
        let any_failure = records.iter().any(RecordOutcome::is_failure);
        ReportOutcome {
            metadata,
            records_seen: records.len(),
            records,
            messages_checked,
            messages_failed,
            any_failure,
        }
    }
}

/// Process-wide running totals for one invocation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunTotals {
    pub messages_checked: u64,
    pub messages_failed: u64,
}
impl RunTotals {
    /// Adds a report's counts; the run totals saturate instead of wrapping.
    pub fn absorb(&mut self, report: &ReportOutcome) {
        self.messages_checked = self.messages_checked.saturating_add(report.messages_checked);
        self.messages_failed = self.messages_failed.saturating_add(report.messages_failed);
    }

    pub fn messages_passed(&self) -> u64 {
        self.messages_checked.saturating_sub(self.messages_failed)
    }
}

/// Final state of a run, from which the exit status is derived.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RunSummary {
    pub messages_processed: usize,
    pub totals: RunTotals,
    pub failure_detected: bool,
    pub reports: Vec<ReportOutcome>,
}
impl RunSummary {
    /// Records one scanned message and the reports it carried.
    pub fn record_message(&mut self, failure_detected: bool, reports: Vec<ReportOutcome>) {
        self.messages_processed += 1;
        self.failure_detected |= failure_detected;
        for report in &reports {
            self.totals.absorb(report);
        }
        self.reports.extend(reports);
    }

    /// `1` if anything failed, `2` if there was nothing to process, `0` otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.failure_detected {
            1
        } else if self.messages_processed == 0 {
            2
        } else {
            0
        }
    }
}

impl fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentMode::Relaxed => write!(f, "relaxed"),
            AlignmentMode::Strict => write!(f, "strict"),
        }
    }
}
impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyType::None => write!(f, "none"),
            PolicyType::Quarantine => write!(f, "quarantine"),
            PolicyType::Reject => write!(f, "reject"),
        }
    }
}
impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mechanism::Dkim => write!(f, "DKIM"),
            Mechanism::Spf => write!(f, "SPF"),
        }
    }
}
impl FromStr for AlignmentMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "r" | "relaxed" => Ok(AlignmentMode::Relaxed),
            "s" | "strict" => Ok(AlignmentMode::Strict),
            _ => Err(format!("Invalid alignment mode: {}", s)),
        }
    }
}
impl FromStr for PolicyType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(PolicyType::None),
            "quarantine" => Ok(PolicyType::Quarantine),
            "reject" => Ok(PolicyType::Reject),
            _ => Err(format!("Invalid policy type: {}", s)),
        }
    }
}
