//! DMARC analyse - DMARC aggregate report mailbox analyzer
//!
//! This tool reads DMARC aggregate report mails from a local mailbox, unpacks the
//! ZIP/GZIP attachments, evaluates the DKIM and SPF results of every record and
//! prints a per-report and overall summary.
//!
//! Exit status: 0 when every report passed, 1 when any failure was detected,
//! 2 when there were no report mails to process.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use colored::*;
use dmarc_analyse::dns::DnsResolver;
use dmarc_analyse::export::{export_summary, ExportFormat};
use dmarc_analyse::mailbox::{Maildir, MessageSource, Selection};
use dmarc_analyse::summary::{analyze_messages, render_banner};
use dmarc_analyse::{Config, Scanner};

/// CLI arguments for DMARC analyse.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DMARC aggregate report mailbox analyzer",
    long_about = "Reads DMARC aggregate report mails from a Maildir, unpacks their ZIP/GZIP \
                  attachments and reports every record whose DKIM or SPF result did not pass.\n\n\
                  Without a selection flag only unread report mails are analyzed.",
    group(ArgGroup::new("selection").args(["all", "today", "yesterday", "unread", "test"]))
)]
struct Cli {
    /// Show also details for non error records
    #[arg(long)]
    details: bool,

    /// Read all report messages, also already processed (read) messages
    #[arg(long)]
    all: bool,

    /// Read today's report messages
    #[arg(long)]
    today: bool,

    /// Read yesterday's report messages
    #[arg(long)]
    yesterday: bool,

    /// Read the unread report messages (default)
    #[arg(long)]
    unread: bool,

    /// Read all report messages from the test mailbox
    #[arg(long)]
    test: bool,

    /// Mailbox directory (overrides DMARC_MAILDIR)
    #[arg(long, value_name = "DIR")]
    maildir: Option<PathBuf>,

    /// Also write the results to a .json or .csv file
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn selection(&self) -> Selection {
        if self.all || self.test {
            Selection::All
        } else if self.today {
            Selection::Today
        } else if self.yesterday {
            Selection::Yesterday
        } else {
            Selection::Unread
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity.
    env_logger::Builder::new()
        .filter_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn })
        .parse_default_env()
        .init();

    let mut config = Config::new().context("Failed to load configuration")?;
    if let Some(dir) = &cli.maildir {
        config.maildir = dir.clone();
    }
    if let Some(path) = &cli.export {
        // Fail before any mail is read rather than after.
        ExportFormat::from_path(path)?;
    }

    let mailbox = if cli.test {
        Maildir::new(config.test_mailbox())
    } else {
        Maildir::new(config.maildir.clone())
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render_banner(&mut out, mailbox.root())?;

    let messages = mailbox
        .fetch(cli.selection())
        .with_context(|| format!("Failed to read mailbox {}", mailbox.root().display()))?;

    let resolver = DnsResolver::new(config.dns_timeout);
    let scanner = Scanner::new(&config, &resolver);
    let summary = analyze_messages(&scanner, &messages, &mut out, cli.details)
        .await
        .context("Failed to write report output")?;
    out.flush()?;

    if let Some(path) = &cli.export {
        export_summary(path, &summary)?;
        log::info!("Results exported to {}", path.display());
    }

    let code = summary.exit_code();
    let verdict = match code {
        0 => "All DMARC reports passed".green(),
        1 => "DMARC failures detected".red().bold(),
        _ => "No DMARC reports to process".yellow(),
    };
    eprintln!("{}", verdict);
    Ok(ExitCode::from(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_flags() {
        let cli = Cli::parse_from(["dmarc-analyse"]);
        assert_eq!(cli.selection(), Selection::Unread);
        let cli = Cli::parse_from(["dmarc-analyse", "--today", "--details"]);
        assert_eq!(cli.selection(), Selection::Today);
        assert!(cli.details);
        let cli = Cli::parse_from(["dmarc-analyse", "--test"]);
        assert_eq!(cli.selection(), Selection::All);
        let cli = Cli::parse_from(["dmarc-analyse", "--yesterday"]);
        assert_eq!(cli.selection(), Selection::Yesterday);
    }

    #[test]
    fn test_selection_flags_are_exclusive() {
        assert!(Cli::try_parse_from(["dmarc-analyse", "--all", "--today"]).is_err());
        assert!(Cli::try_parse_from(["dmarc-analyse", "--all", "--details"]).is_ok());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
