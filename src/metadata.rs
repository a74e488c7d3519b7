//! Report metadata extraction.
//!
//! The five mandatory fields (org name, report id, both ends of the date range
//! and the published domain) must all be present, otherwise the report is not
//! evaluated. The published policy is informational and falls back to defaults.

use crate::error::{DmarcError, Result};
use crate::models::{AlignmentMode, DateRange, PolicyType, PublishedPolicy, ReportMetadata};
use crate::xml_parser::XmlElement;

const ORG_NAME: &str = "report_metadata/org_name";
const REPORT_ID: &str = "report_metadata/report_id";
const RANGE_BEGIN: &str = "report_metadata/date_range/begin";
const RANGE_END: &str = "report_metadata/date_range/end";
const DOMAIN: &str = "policy_published/domain";

/// Extracts and validates the report-level metadata from a normalized tree.
///
/// # Errors
///
/// Returns [`DmarcError::MissingField`] naming the first absent field, or a
/// date-range bound that is not an integer.
pub fn extract_metadata(tree: &XmlElement) -> Result<ReportMetadata> {
    let org_name = required(tree, ORG_NAME)?;
    let report_id = required(tree, REPORT_ID)?;
    let begin = required_timestamp(tree, RANGE_BEGIN)?;
    let end = required_timestamp(tree, RANGE_END)?;
    let domain = required(tree, DOMAIN)?;

    Ok(ReportMetadata {
        org_name,
        report_id,
        date_range: DateRange { begin, end },
        domain,
        policy: published_policy(tree),
    })
}

fn required(tree: &XmlElement, path: &str) -> Result<String> {
    tree.find_text(path)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| DmarcError::MissingField(path.to_string()))
}

fn required_timestamp(tree: &XmlElement, path: &str) -> Result<i64> {
    let raw = required(tree, path)?;
    raw.parse().map_err(|_| {
        DmarcError::MissingField(format!("{} (not an epoch timestamp: {:?})", path, raw))
    })
}

fn published_policy(tree: &XmlElement) -> PublishedPolicy {
    let defaults = PublishedPolicy::default();
    let field = |name: &str| tree.find_text(&format!("policy_published/{}", name)).map(str::trim);
    PublishedPolicy {
        adkim: field("adkim")
            .and_then(|s| s.parse::<AlignmentMode>().ok())
            .unwrap_or(defaults.adkim),
        aspf: field("aspf")
            .and_then(|s| s.parse::<AlignmentMode>().ok())
            .unwrap_or(defaults.aspf),
        policy: field("p")
            .and_then(|s| s.parse::<PolicyType>().ok())
            .unwrap_or(defaults.policy),
        subdomain_policy: field("sp").and_then(|s| s.parse::<PolicyType>().ok()),
        pct: field("pct").and_then(|s| s.parse().ok()).unwrap_or(defaults.pct),
    }
}
