//! Attachment Scanner Module
//!
//! This module walks the MIME structure of a report message, picks out the
//! attachment parts, and drives each one through decompression, XML
//! normalization, metadata validation and record evaluation. A failure in one
//! attachment is captured in its [`AttachmentOutcome`] and never stops the scan
//! of its siblings.
use mailparse::{MailHeaderMap, ParsedMail};

use crate::config::Config;
use crate::dns::HostnameResolver;
use crate::error::Result;
use crate::evaluator::evaluate_records;
use crate::metadata::extract_metadata;
use crate::models::{RawAttachment, ReportOutcome};
use crate::xml_parser::parse_report_xml;
use crate::zip_handler::decode_attachment;

/// What became of one attachment part.
#[derive(Debug)]
pub struct AttachmentOutcome {
    pub filename: String,
    pub result: Result<ReportOutcome>,
}

impl AttachmentOutcome {
    pub fn is_failure(&self) -> bool {
        match &self.result {
            Ok(report) => report.any_failure,
            Err(e) => e.is_failure(),
        }
    }
}

/// Outcome of scanning every attachment of one message.
#[derive(Debug, Default)]
pub struct MessageScan {
    pub attachments: Vec<AttachmentOutcome>,
}

impl MessageScan {
    /// True if any attachment produced a failing record or could not be evaluated.
    pub fn failure_detected(&self) -> bool {
        self.attachments.iter().any(AttachmentOutcome::is_failure)
    }

    /// Successfully evaluated reports, in attachment order.
    pub fn into_reports(self) -> Vec<ReportOutcome> {
        self.attachments
            .into_iter()
            .filter_map(|a| a.result.ok())
            .collect()
    }
}

/// Scans messages with a shared configuration and resolver.
pub struct Scanner<'a, R> {
    config: &'a Config,
    resolver: &'a R,
}

impl<'a, R: HostnameResolver> Scanner<'a, R> {
    pub fn new(config: &'a Config, resolver: &'a R) -> Self {
        Self { config, resolver }
    }

    /// Processes every attachment part of `message`, in structural order.
    pub async fn scan_message(&self, message: &ParsedMail<'_>) -> MessageScan {
        let mut scan = MessageScan::default();
        for part in attachment_parts(message) {
            let Some(filename) = filename_of(part) else {
                log::debug!("Skipping attachment part without a filename");
                continue;
            };
            let result = match part.get_body_raw() {
                Ok(content) => {
                    let attachment = RawAttachment {
                        filename: filename.clone(),
                        content,
                    };
                    self.process_attachment(&attachment).await
                }
                Err(e) => Err(e.into()),
            };
            if let Err(e) = &result {
                if e.is_failure() {
                    log::warn!("Attachment {} could not be processed: {}", filename, e);
                } else {
                    log::info!("Skipping attachment {}: {}", filename, e);
                }
            }
            scan.attachments.push(AttachmentOutcome { filename, result });
        }
        scan
    }

    /// Runs one attachment through the whole report pipeline.
    pub async fn process_attachment(&self, attachment: &RawAttachment) -> Result<ReportOutcome> {
        log::info!("Processing attachment: {}", attachment.filename);
        let bytes = decode_attachment(&attachment.filename, &attachment.content, self.config)?;
        let tree = parse_report_xml(&bytes)?;
        let metadata = extract_metadata(&tree)?;
        log::debug!(
            "Report {} from {} for {}",
            metadata.report_id,
            metadata.org_name,
            metadata.domain
        );
        let records = evaluate_records(&tree, self.resolver).await;
        Ok(ReportOutcome::new(metadata, records))
    }
}

/// Non-container parts carrying a `Content-Disposition` header, in walk order.
pub fn attachment_parts<'a, 'b>(message: &'b ParsedMail<'a>) -> Vec<&'b ParsedMail<'a>> {
    let mut parts = Vec::new();
    walk(message, &mut parts);
    parts
        .into_iter()
        .filter(|part| !part.ctype.mimetype.to_lowercase().starts_with("multipart/"))
        .filter(|part| part.get_headers().get_first_value("Content-Disposition").is_some())
        .collect()
}

fn walk<'a, 'b>(part: &'b ParsedMail<'a>, out: &mut Vec<&'b ParsedMail<'a>>) {
    out.push(part);
    for sub in &part.subparts {
        walk(sub, out);
    }
}

/// The disposition `filename`, falling back to the content-type `name`.
fn filename_of(part: &ParsedMail<'_>) -> Option<String> {
    part.get_content_disposition()
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
