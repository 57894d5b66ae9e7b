use super::{DocumentRecord, DocumentStore, NewRecord, RecordEdit, StoreError};
use crate::document::ExtractedDocument;
use crate::policy::Status;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct SqliteStore {
    conn: Connection,
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl SqliteStore {
    /// Open (or create) the document table in the SQLite file at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // Every commit reaches the disk before the call returns.
        conn.pragma_update(None, "synchronous", "FULL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                filename TEXT NOT NULL,
                status TEXT NOT NULL,
                confidence INTEGER NOT NULL,
                vendor TEXT NOT NULL,
                date TEXT NOT NULL,
                total TEXT NOT NULL,
                type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                extracted_json TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)",
            [],
        )?;

        info!("Document store initialized");
        Ok(Self { conn })
    }

    fn try_list(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, status, confidence, vendor, date, total, type, timestamp, extracted_json
             FROM documents
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Helper: map the 10-column projection to `DocumentRecord`.
    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
        Ok(DocumentRecord {
            id: row.get(0)?,
            filename: row.get(1)?,
            status: row.get(2)?,
            confidence: row.get(3)?,
            vendor: row.get(4)?,
            date: row.get(5)?,
            total: row.get(6)?,
            doc_type: row.get(7)?,
            timestamp: row.get(8)?,
            extracted_json: row.get(9)?,
        })
    }
}

impl DocumentStore for SqliteStore {
    fn list_all(&self) -> Vec<DocumentRecord> {
        match self.try_list() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Document table unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    fn append(&self, record: NewRecord, status: Status) -> Result<i64, StoreError> {
        // Count and insert under one write lock so two writers cannot pick the same id.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let record = record.into_record(count + 1, status);

        tx.execute(
            "INSERT INTO documents
                (id, filename, status, confidence, vendor, date, total, type, timestamp, extracted_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.filename,
                record.status,
                record.confidence,
                record.vendor,
                record.date,
                record.total,
                record.doc_type,
                record.timestamp,
                record.extracted_json,
            ],
        )?;
        tx.commit()?;

        info!(id = record.id, filename = %record.filename, status = %status, "Document stored");
        Ok(record.id)
    }

    fn update(
        &self,
        id: i64,
        status: Status,
        edited: Option<&ExtractedDocument>,
    ) -> Result<(), StoreError> {
        let changed = match edited {
            Some(doc) => {
                let edit = RecordEdit::from_document(doc)?;
                self.conn.execute(
                    "UPDATE documents
                     SET status = ?1, vendor = ?2, date = ?3, total = ?4, extracted_json = ?5
                     WHERE id = ?6",
                    params![
                        status,
                        edit.vendor,
                        edit.date,
                        edit.total,
                        edit.extracted_json,
                        id
                    ],
                )?
            }
            None => self.conn.execute(
                "UPDATE documents SET status = ?1 WHERE id = ?2",
                params![status, id],
            )?,
        };

        if changed == 0 {
            debug!(id, "No document with this id, nothing updated");
        } else {
            info!(id, status = %status, edited = edited.is_some(), "Document updated");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    #[test]
    fn test_contract() {
        contract::empty_store_lists_nothing(&store());
        contract::append_assigns_sequential_ids(&store());
        contract::missing_fields_get_placeholders(&store());
        contract::update_touches_only_target_row(&store());
        contract::status_only_update(&store());
        contract::update_is_idempotent(&store());
        contract::unknown_id_is_a_no_op(&store());
        contract::filters_by_status(&store());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.db");
        let doc = contract::sample_document("ACME", 100.0, 95);
        {
            let db = SqliteStore::new(&path).unwrap();
            let record = NewRecord::from_document("a.pdf", &doc).unwrap();
            db.append(record, Status::NeedsReview).unwrap();
            db.update(1, Status::Approved, None).unwrap();
        }
        let db = SqliteStore::new(&path).unwrap();
        let rows = db.list_all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Status::Approved);
    }

    #[test]
    fn test_rejects_unknown_status_text() {
        let db = store();
        db.conn
            .execute(
                "INSERT INTO documents VALUES (1, 'a.pdf', 'rejected', 50, 'v', 'd', '0', 't', 'ts', '{}')",
                [],
            )
            .unwrap();
        assert!(db.try_list().is_err());
        assert!(db.list_all().is_empty());
    }
}
