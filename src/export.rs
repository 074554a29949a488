// Batch Exporter
// Drives the encoder over every stored entry and assembles the intake file

use crate::config::ContractConstants;
use crate::encoder::{encode_entry, RECORD_LENGTH};
use crate::error::Result;
use crate::models::{BillingEntry, Recipient};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// An entry left out of the batch and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub entry_id: i64,
    pub recipient_id: i64,
    pub date: String,
    pub reason: String,
}

/// Encoded lines of a batch plus the entries that could not be encoded
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub lines: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

/// A finished export ready to be written or streamed
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub line_count: usize,
    pub skipped: Vec<SkippedEntry>,
}

impl ExportFile {
    /// SHA-256 of the content, hex encoded
    pub fn sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.content);
        format!("{:x}", hasher.finalize())
    }
}

/// Encode every entry in store order.
///
/// Entries that cannot be encoded are logged and reported, never fatal.
pub fn generate_lines(
    entries: &[BillingEntry],
    recipients: &[Recipient],
    today: NaiveDate,
    contract: &ContractConstants,
) -> ExportReport {
    let by_id: HashMap<i64, &Recipient> = recipients.iter().map(|r| (r.id, r)).collect();
    let mut report = ExportReport::default();

    for entry in entries {
        let recipient = by_id.get(&entry.recipient_id).copied();
        match encode_entry(entry, recipient, today, contract) {
            Ok(lines) => {
                debug!(entry_id = entry.id, lines = lines.len(), "Encoded billing entry");
                report.lines.extend(lines);
            }
            Err(e) => {
                warn!(
                    entry_id = entry.id,
                    recipient_id = entry.recipient_id,
                    date = %entry.date,
                    error = %e,
                    "Skipping billing entry"
                );
                report.skipped.push(SkippedEntry {
                    entry_id: entry.id,
                    recipient_id: entry.recipient_id,
                    date: entry.date.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let off_length = report
        .lines
        .iter()
        .filter(|line| line.chars().count() != RECORD_LENGTH)
        .count();
    if off_length > 0 {
        warn!(
            off_length,
            expected = RECORD_LENGTH,
            "Records with a non-standard Medicaid ID width"
        );
    }

    report
}

/// File name for a batch produced on `today`:
/// `M<contract>X<YY>0000<ISO week, 2 digits>.txt`, eight digits after the `X`
pub fn export_filename(today: NaiveDate, contract: &ContractConstants) -> String {
    format!(
        "M{}X{:02}0000{:02}.txt",
        contract.contract_number,
        today.year() % 100,
        today.iso_week().week()
    )
}

/// Join records with a newline after each one, the last included
pub fn render(lines: &[String]) -> Vec<u8> {
    let mut content = String::with_capacity(lines.len() * (RECORD_LENGTH + 1));
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    content.into_bytes()
}

/// Build the complete export for the current store contents.
///
/// Does not touch the store; clearing is a separate operation.
pub fn export(
    entries: &[BillingEntry],
    recipients: &[Recipient],
    today: NaiveDate,
    contract: &ContractConstants,
) -> ExportFile {
    let report = generate_lines(entries, recipients, today, contract);
    let file = ExportFile {
        filename: export_filename(today, contract),
        content: render(&report.lines),
        line_count: report.lines.len(),
        skipped: report.skipped,
    };

    info!(
        filename = %file.filename,
        entries = entries.len(),
        lines = file.line_count,
        skipped = file.skipped.len(),
        "Built billing export"
    );
    file
}

/// Write the export to a temporary file that is deleted when dropped.
pub fn stage(file: &ExportFile, staging_dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix("billing-export-")
        .suffix(".txt")
        .tempfile_in(staging_dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir))?;
    staged.write_all(&file.content)?;
    staged.flush()?;
    debug!(path = %staged.path().display(), "Staged billing export");
    Ok(staged)
}

/// Write the export under its own name into `dir`, returning the full path.
pub fn write_to_dir(file: &ExportFile, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(&file.filename);
    fs::write(&path, &file.content)?;
    info!(path = %path.display(), bytes = file.content.len(), "Wrote billing export");
    Ok(path)
}
