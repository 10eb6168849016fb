//! Lead export: CSV text, the import template, and atomic file writes.
//!
//! File writes go to a temporary file in the destination directory and are
//! persisted over the final path only once complete.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{Terminator, Writer, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::AppError;
use crate::leads::Lead;

const EXPORT_HEADER: [&str; 5] = ["firstName", "lastName", "email", "phoneNumber", "status"];
const TEMPLATE_HEADER: [&str; 4] = ["firstName", "lastName", "email", "phoneNumber"];
const TEMPLATE_ROWS: [[&str; 4]; 2] = [
    ["John", "Doe", "john@example.com", "+1234567890"],
    ["Jane", "Smith", "jane@example.com", "+0987654321"],
];

fn csv_writer<W: std::io::Write>(inner: W) -> Writer<W> {
    WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(inner)
}

fn write_leads<W: std::io::Write>(writer: &mut Writer<W>, leads: &[Lead]) -> Result<(), AppError> {
    writer
        .write_record(EXPORT_HEADER)
        .map_err(|e| AppError::Internal(format!("Failed to write CSV header: {}", e)))?;

    for lead in leads {
        writer
            .write_record([
                lead.first_name.as_str(),
                lead.last_name.as_str(),
                lead.email.as_deref().unwrap_or(""),
                lead.phone_number.as_str(),
                lead.status.as_str(),
            ])
            .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {}", e)))?;
    }
    Ok(())
}

fn into_string(writer: Writer<Vec<u8>>) -> Result<String, AppError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV writer: {}", e.error())))?;
    String::from_utf8(bytes).map_err(|_| AppError::Internal("CSV output is not UTF-8".into()))
}

/// Renders leads as CSV with a `firstName,lastName,email,phoneNumber,status`
/// header. Fields containing quotes, commas or newlines are quoted.
pub fn export_csv(leads: &[Lead]) -> Result<String, AppError> {
    let mut writer = csv_writer(Vec::new());
    write_leads(&mut writer, leads)?;
    into_string(writer)
}

/// Example file showing the import columns.
pub fn template_csv() -> Result<String, AppError> {
    let mut writer = csv_writer(Vec::new());
    writer
        .write_record(TEMPLATE_HEADER)
        .map_err(|e| AppError::Internal(format!("Failed to write CSV header: {}", e)))?;
    for row in TEMPLATE_ROWS {
        writer
            .write_record(row)
            .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {}", e)))?;
    }
    into_string(writer)
}

/// Default export file name for a given day, e.g. `leads-2025-03-14.csv`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("leads-{}.csv", date.format("%Y-%m-%d"))
}

/// Writes leads to `final_path` atomically. If writing fails, the
/// destination is left untouched and the temporary file is removed.
pub fn write_csv_atomic(final_path: impl AsRef<Path>, leads: &[Lead]) -> Result<PathBuf, AppError> {
    let final_path = final_path.as_ref().to_path_buf();

    let parent_dir = match final_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        Some(_) => PathBuf::from("."),
        None => {
            return Err(AppError::Internal(format!(
                "Cannot determine parent directory for: {}",
                final_path.display()
            )))
        }
    };

    let temp_file = NamedTempFile::new_in(&parent_dir)
        .map_err(|e| AppError::Internal(format!("Failed to create temporary file: {}", e)))?;

    let mut writer = csv_writer(BufWriter::new(temp_file));
    write_leads(&mut writer, leads)?;

    let buf_writer = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV writer: {}", e.error())))?;

    let named_temp = buf_writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush buffer: {}", e.error())))?;

    named_temp.persist(&final_path).map_err(|e| {
        AppError::Internal(format!(
            "Failed to persist file to {}: {}",
            final_path.display(),
            e.error
        ))
    })?;

    info!("[LEADS] Exported {} leads", leads.len());
    Ok(final_path)
}
