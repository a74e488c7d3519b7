//! Mailbox Module
//!
//! This module supplies raw report messages to the analyzer from a local Maildir
//! (`new/` and `cur/`) or from a plain directory of `.eml` files. It is
//! read-only: message flags are never changed and nothing is deleted.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;

/// Which messages of the mailbox to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    /// Messages not yet marked as seen.
    #[default]
    Unread,
    All,
    /// Messages delivered on or after today's (UTC) date.
    Today,
    /// Messages delivered on or after yesterday's (UTC) date.
    Yesterday,
}

/// One message exactly as stored in the mailbox.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub bytes: Vec<u8>,
}

/// A supplier of raw report messages.
pub trait MessageSource {
    fn fetch(&self, selection: Selection) -> Result<Vec<RawMessage>>;
}

struct MailEntry {
    path: PathBuf,
    unread: bool,
    delivered: NaiveDate,
}

pub struct Maildir {
    root: PathBuf,
}

impl Maildir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fetches messages matching `selection`, with `today` as the reference date.
    pub fn fetch_as_of(&self, selection: Selection, today: NaiveDate) -> Result<Vec<RawMessage>> {
        let since = match selection {
            Selection::Today => Some(today),
            Selection::Yesterday => today.pred_opt(),
            Selection::Unread | Selection::All => None,
        };

        let mut messages = Vec::new();
        for entry in self.entries()? {
            let selected = match selection {
                Selection::Unread => entry.unread,
                Selection::All => true,
                Selection::Today | Selection::Yesterday => since.is_some_and(|d| entry.delivered >= d),
            };
            if !selected {
                continue;
            }
            let id = entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            messages.push(RawMessage {
                id,
                bytes: fs::read(&entry.path)?,
            });
        }
        log::info!(
            "Fetched {} message(s) ({:?}) from {}",
            messages.len(),
            selection,
            self.root.display()
        );
        Ok(messages)
    }

    fn entries(&self) -> Result<Vec<MailEntry>> {
        let new_dir = self.root.join("new");
        let cur_dir = self.root.join("cur");
        let mut entries = Vec::new();
        if new_dir.is_dir() || cur_dir.is_dir() {
            if new_dir.is_dir() {
                collect(&new_dir, |_| true, &mut entries)?;
            }
            if cur_dir.is_dir() {
                collect(&cur_dir, |name| !is_seen(name), &mut entries)?;
            }
        } else {
            collect(&self.root, |_| true, &mut entries)?;
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

impl MessageSource for Maildir {
    fn fetch(&self, selection: Selection) -> Result<Vec<RawMessage>> {
        self.fetch_as_of(selection, Utc::now().date_naive())
    }
}

fn collect<F>(dir: &Path, unread: F, out: &mut Vec<MailEntry>) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let delivered = DateTime::<Utc>::from(entry.metadata()?.modified()?).date_naive();
        out.push(MailEntry {
            path: entry.path(),
            unread: unread(&name),
            delivered,
        });
    }
    Ok(())
}

/// Maildir info suffix `:2,<flags>` carries `S` once a message was seen.
fn is_seen(name: &str) -> bool {
    name.rsplit_once(":2,")
        .is_some_and(|(_, flags)| flags.contains('S'))
}
