// src/store/export.rs

use super::{COLUMNS, DocumentRecord, StoreError};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use time::Date;
use time::macros::format_description;

/// Write `records` as CSV in the fixed column layout, header first.
///
/// The header is written explicitly so an empty table still exports its columns.
pub fn write_csv<W: Write>(writer: W, records: &[DocumentRecord]) -> Result<(), StoreError> {
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    out.write_record(COLUMNS)?;
    for record in records {
        out.serialize(record)?;
    }
    out.flush()?;
    Ok(())
}

/// Dump every row to `path`. Returns the number of rows written.
pub fn export_to_file(records: &[DocumentRecord], path: &Path) -> Result<usize, StoreError> {
    let mut file = File::create(path)?;
    write_csv(&mut file, records)?;
    file.sync_all()?;
    Ok(records.len())
}

/// `docuflow_audit_YYYYMMDD.csv`
pub fn default_export_name(day: Date) -> String {
    let stamp = day
        .format(format_description!("[year][month][day]"))
        .unwrap_or_else(|_| day.to_string());
    format!("docuflow_audit_{stamp}.csv")
}
