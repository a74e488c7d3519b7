//! DMARC analyse Library
//!
//! This library provides the core functionality for analyzing DMARC aggregate
//! report mails: attachment decompression, namespace-agnostic XML parsing,
//! report metadata validation, per-record DKIM/SPF evaluation with reverse DNS
//! enrichment, and the textual summary with its pass/fail/no-data exit status.

pub mod config;
pub mod error;
pub mod models;
pub mod zip_handler;
pub mod xml_parser;
pub mod metadata;
pub mod dns;
pub mod evaluator;
pub mod scanner;
pub mod summary;
pub mod mailbox;
pub mod export;

pub use config::Config;
pub use error::{DmarcError, Result};
pub use scanner::{MessageScan, Scanner};
pub use zip_handler::decode_attachment;
pub use xml_parser::parse_report_xml;
