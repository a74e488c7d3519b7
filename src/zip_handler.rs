//! ZIP Handler Module
//!
//! This module decompresses DMARC report attachments held in memory. ZIP archives
//! yield their first entry (by listing order, not by name), GZIP payloads are
//! inflated whole. It enforces the configured attachment size, decompressed size,
//! and compression ratio limits.
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;
use flate2::read::GzDecoder;
use crate::config::Config;
use crate::error::{DmarcError, Result};

/// Decompresses an attachment according to its filename extension.
///
/// # Errors
///
/// Returns [`DmarcError::UnsupportedFormat`] for anything but `.zip` and `.gz`;
/// the caller is expected to skip such attachments rather than fail on them.
pub fn decode_attachment(filename: &str, content: &[u8], config: &Config) -> Result<Vec<u8>> {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "zip" | "gz" => {}
        "" => return Err(DmarcError::UnsupportedFormat("Extensionless".into())),
        other => return Err(DmarcError::UnsupportedFormat(format!(".{}", other))),
    }

    if content.len() > config.max_file_size {
        return Err(DmarcError::FileTooLarge(format!(
            "Attachment {} is {} bytes, limit is {} bytes",
            filename,
            content.len(),
            config.max_file_size
        )));
    }

    if ext == "zip" {
        extract_first_entry(content, config)
    } else {
        inflate_gzip(content, config)
    }
}

fn extract_first_entry(content: &[u8], config: &Config) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(content))?;
    if archive.is_empty() {
        return Err(DmarcError::Format("ZIP archive has no entries".into()));
    }
    if archive.len() > 1 {
        log::debug!("ZIP archive holds {} entries, reading only the first", archive.len());
    }

    let entry = archive.by_index(0)?;
    log::debug!("Reading ZIP entry {}", entry.name());

    let compressed_size = entry.compressed_size();
    let uncompressed_size = entry.size();
    if compressed_size > 0 {
        let compression_ratio = uncompressed_size as f64 / compressed_size as f64;
        if compression_ratio > config.max_compression_ratio {
            return Err(DmarcError::Format(format!(
                "Suspicious compression ratio: {:.2}",
                compression_ratio
            )));
        }
    }
    if uncompressed_size > config.max_decompressed_size as u64 {
        return Err(DmarcError::FileTooLarge("Decompressed size too large".to_string()));
    }

    // The declared size is not trusted; the read itself is bounded too.
    read_bounded(entry, config.max_decompressed_size)
}

fn inflate_gzip(content: &[u8], config: &Config) -> Result<Vec<u8>> {
    read_bounded(GzDecoder::new(content), config.max_decompressed_size)
}

fn read_bounded<R: Read>(reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut contents = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut contents)?;
    if contents.len() > limit {
        return Err(DmarcError::FileTooLarge("Decompressed size too large".to_string()));
    }
    Ok(contents)
}
