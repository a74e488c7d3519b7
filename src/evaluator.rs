//! Record evaluation.
//!
//! Every `<record>` of a report is read into an [`AuthRecord`] independently of
//! its siblings: a malformed record becomes a [`RecordOutcome::Invalid`] and the
//! remaining records are still evaluated. Source IPs are then resolved
//! concurrently, at most [`MAX_CONCURRENT_LOOKUPS`] at a time, and the outcomes
//! are returned in document order.

use futures_util::stream::{self, StreamExt};

use crate::dns::{hostname_or_placeholder, HostnameResolver};
use crate::error::{DmarcError, Result};
use crate::models::{AuthRecord, EvaluatedRecord, RecordOutcome};
use crate::xml_parser::XmlElement;

/// Upper bound on reverse lookups in flight for one report.
pub const MAX_CONCURRENT_LOOKUPS: usize = 16;

/// Reads every record of the report without touching the network.
///
/// Calling this twice on the same tree yields identical results.
pub fn parse_records(tree: &XmlElement) -> Vec<Result<AuthRecord>> {
    tree.find_all("record").into_iter().map(parse_record).collect()
}

fn parse_record(record: &XmlElement) -> Result<AuthRecord> {
    let source_ip = record
        .find_text("row/source_ip")
        .map(|s| s.trim().to_string())
        .ok_or_else(|| DmarcError::Record("missing source_ip".into()))?;

    let count = match record.find_text("row/count") {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| DmarcError::Record(format!("count {:?} is not a number", raw)))?,
        None => 0,
    };

    Ok(AuthRecord {
        source_ip,
        count,
        header_from: record
            .find_text("identifiers/header_from")
            .map(|s| s.trim().to_string()),
        // A record may carry several DKIM signatures and SPF checks.
        dkim_results: record.find_all_text("auth_results/dkim/result"),
        spf_results: record.find_all_text("auth_results/spf/result"),
        dispositions: record
            .find_all_text("row/policy_evaluated/disposition")
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect(),
    })
}

/// Evaluates every record of the report, enriching valid ones with a hostname.
pub async fn evaluate_records<R: HostnameResolver>(
    tree: &XmlElement,
    resolver: &R,
) -> Vec<RecordOutcome> {
    let parsed = parse_records(tree);

    let hostnames: Vec<Option<String>> = stream::iter(parsed.iter().map(|record| async move {
        match record {
            Ok(r) => Some(hostname_or_placeholder(resolver, &r.source_ip).await),
            Err(_) => None,
        }
    }))
    .buffered(MAX_CONCURRENT_LOOKUPS)
    .collect()
    .await;

    parsed
        .into_iter()
        .zip(hostnames)
        .enumerate()
        .map(|(i, (record, hostname))| {
            let index = i + 1;
            match record {
                Ok(record) => RecordOutcome::Evaluated(EvaluatedRecord {
                    index,
                    hostname: hostname.unwrap_or_default(),
                    record,
                }),
                Err(e) => {
                    log::warn!("Record {} could not be evaluated: {}", index, e);
                    RecordOutcome::Invalid {
                        index,
                        reason: e.to_string(),
                    }
                }
            }
        })
        .collect()
}
