// src/store/mod.rs

mod csv_file;
pub mod export;
mod sqlite;

pub use csv_file::CsvStore;
pub use sqlite::SqliteStore;

use crate::config::{Config, StoreBackend};
use crate::document::ExtractedDocument;
use crate::policy::Status;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

/// Column layout of the persisted table. Order and names are part of the
/// export format.
pub const COLUMNS: [&str; 10] = [
    "id",
    "filename",
    "status",
    "confidence",
    "vendor",
    "date",
    "total",
    "type",
    "timestamp",
    "extracted_json",
];

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage: CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage: cannot format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// One processed document as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub status: Status,
    pub confidence: u8,
    pub vendor: String,
    pub date: String,
    pub total: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub timestamp: String,
    pub extracted_json: String,
}

impl DocumentRecord {
    /// Parse the stored copy of the extraction.
    pub fn document(&self) -> serde_json::Result<ExtractedDocument> {
        ExtractedDocument::from_json(&self.extracted_json)
    }
}

/// A record before the store has assigned it an id and status.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub filename: String,
    pub confidence: u8,
    pub vendor: String,
    pub date: String,
    pub total: String,
    pub doc_type: String,
    pub timestamp: String,
    pub extracted_json: String,
}

impl NewRecord {
    /// Build the row for a freshly extracted document, stamped with the current time.
    pub fn from_document(filename: &str, doc: &ExtractedDocument) -> Result<Self, StoreError> {
        let edit = RecordEdit::from_document(doc)?;
        Ok(Self {
            filename: filename.to_string(),
            confidence: doc.overall_confidence,
            vendor: edit.vendor,
            date: edit.date,
            total: edit.total,
            doc_type: doc
                .document_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            timestamp: timestamp_now()?,
            extracted_json: edit.extracted_json,
        })
    }

    fn into_record(self, id: i64, status: Status) -> DocumentRecord {
        DocumentRecord {
            id,
            filename: self.filename,
            status,
            confidence: self.confidence,
            vendor: self.vendor,
            date: self.date,
            total: self.total,
            doc_type: self.doc_type,
            timestamp: self.timestamp,
            extracted_json: self.extracted_json,
        }
    }
}

/// Columns rewritten when a reviewer corrects a document.
#[derive(Debug, Clone, PartialEq)]
struct RecordEdit {
    vendor: String,
    date: String,
    total: String,
    extracted_json: String,
}

impl RecordEdit {
    fn from_document(doc: &ExtractedDocument) -> Result<Self, StoreError> {
        Ok(Self {
            vendor: doc
                .vendor_name
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            date: doc.date.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            total: doc
                .total_amount
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "0".to_string()),
            extracted_json: doc.to_json()?,
        })
    }

    fn apply(&self, record: &mut DocumentRecord) {
        record.vendor.clone_from(&self.vendor);
        record.date.clone_from(&self.date);
        record.total.clone_from(&self.total);
        record.extracted_json.clone_from(&self.extracted_json);
    }
}

/// Durable table of processed documents.
///
/// Ids are `row count + 1` at insertion time, so they stay unique only as
/// long as rows are never deleted.
pub trait DocumentStore {
    /// All rows in storage order. Unreadable storage reads as an empty table.
    fn list_all(&self) -> Vec<DocumentRecord>;

    /// Insert a row and return its id. Durable once this returns.
    fn append(&self, record: NewRecord, status: Status) -> Result<i64, StoreError>;

    /// Set `status` on row `id`, and with `edited` also overwrite vendor,
    /// date, total and the stored document. An unknown id changes nothing.
    fn update(
        &self,
        id: i64,
        status: Status,
        edited: Option<&ExtractedDocument>,
    ) -> Result<(), StoreError>;

    fn get(&self, id: i64) -> Option<DocumentRecord> {
        self.list_all().into_iter().find(|r| r.id == id)
    }

    fn with_status(&self, status: Status) -> Vec<DocumentRecord> {
        self.list_all()
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }
}

/// Open the store selected in the config.
pub fn open_store(cfg: &Config) -> Result<Box<dyn DocumentStore>, StoreError> {
    let path = cfg.db_path();
    Ok(match cfg.store {
        StoreBackend::Sqlite => Box::new(SqliteStore::new(path)?),
        StoreBackend::Csv => Box::new(CsvStore::new(path)),
    })
}

/// Local wall-clock time as `YYYY-MM-DD HH:MM:SS`.
pub fn timestamp_now() -> Result<String, time::error::Format> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
}
