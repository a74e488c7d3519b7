//! Error Handling Module
//!
//! This module defines the error taxonomy of the analyzer using the `thiserror` crate.
//! Errors are contained at the smallest enclosing unit (record, report, attachment)
//! by the callers; nothing in here decides whether a run aborts.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmarcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Mail parse error: {0}")]
    Mail(#[from] mailparse::MailParseError),

    #[error("{0} files are not supported")]
    UnsupportedFormat(String),

    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Missing mandatory field: {0}")]
    MissingField(String),

    #[error("Invalid record: {0}")]
    Record(String),

    #[error("Reverse DNS lookup failed: {0}")]
    Dns(String),
}

impl DmarcError {
    /// Whether this error marks the parent message as containing a failure.
    ///
    /// Unsupported attachments are skipped silently; everything else that
    /// stops a report from being evaluated is a failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, DmarcError::UnsupportedFormat(_))
    }
}

pub type Result<T> = std::result::Result<T, DmarcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_is_not_a_failure() {
        assert!(!DmarcError::UnsupportedFormat(".pdf".into()).is_failure());
        assert!(DmarcError::MalformedXml("eof".into()).is_failure());
        assert!(DmarcError::MissingField("report_metadata/report_id".into()).is_failure());
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = DmarcError::UnsupportedFormat(".pdf".into());
        assert_eq!(err.to_string(), ".pdf files are not supported");
    }
}
