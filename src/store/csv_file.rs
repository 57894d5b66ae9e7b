use super::export::write_csv;
use super::{DocumentRecord, DocumentStore, NewRecord, RecordEdit, StoreError};
use crate::document::ExtractedDocument;
use crate::policy::Status;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// The whole table in one CSV file.
///
/// Every call reads the full file and every change rewrites it. There is no
/// locking: two processes writing at once can lose an update.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<DocumentRecord>, csv::Error>>()?;
        Ok(rows)
    }

    /// Replace the file atomically: write a sibling temp file, fsync, rename.
    fn write_table(&self, records: &[DocumentRecord]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        write_csv(tmp.as_file_mut(), records)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl DocumentStore for CsvStore {
    fn list_all(&self) -> Vec<DocumentRecord> {
        match self.read_table() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Document table unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    fn append(&self, record: NewRecord, status: Status) -> Result<i64, StoreError> {
        let mut rows = self.list_all();
        let id = rows.len() as i64 + 1;
        let filename = record.filename.clone();
        rows.push(record.into_record(id, status));
        self.write_table(&rows)?;

        info!(id, filename = %filename, status = %status, "Document stored");
        Ok(id)
    }

    fn update(
        &self,
        id: i64,
        status: Status,
        edited: Option<&ExtractedDocument>,
    ) -> Result<(), StoreError> {
        let mut rows = self.list_all();
        if !rows.iter().any(|r| r.id == id) {
            debug!(id, "No document with this id, nothing updated");
            return Ok(());
        }

        let edit = edited.map(RecordEdit::from_document).transpose()?;
        for row in rows.iter_mut().filter(|r| r.id == id) {
            if let Some(edit) = &edit {
                edit.apply(row);
            }
            row.status = status;
        }
        self.write_table(&rows)?;

        info!(id, status = %status, edited = edited.is_some(), "Document updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::COLUMNS;
    use crate::store::contract;

    fn store() -> (tempfile::TempDir, CsvStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("documents_data.csv"));
        (dir, store)
    }

    #[test]
    fn test_contract() {
        contract::empty_store_lists_nothing(&store().1);

        let cases: [fn(&dyn DocumentStore); 7] = [
            contract::append_assigns_sequential_ids,
            contract::missing_fields_get_placeholders,
            contract::update_touches_only_target_row,
            contract::status_only_update,
            contract::update_is_idempotent,
            contract::unknown_id_is_a_no_op,
            contract::filters_by_status,
        ];
        for case in cases {
            let (_dir, db) = store();
            case(&db);
        }
    }

    #[test]
    fn test_file_layout() {
        let (_dir, db) = store();
        let doc = contract::sample_document("ACME, Inc.", 1980.0, 92);
        db.append(NewRecord::from_document("a.pdf", &doc).unwrap(), Status::Approved)
            .unwrap();

        let content = fs::read_to_string(db.path()).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(header, COLUMNS.join(","));
        assert!(content.contains("\"ACME, Inc.\""));
    }

    #[test]
    fn test_unknown_id_leaves_file_untouched() {
        let (_dir, db) = store();
        let doc = contract::sample_document("ACME", 10.0, 50);
        db.append(NewRecord::from_document("a.pdf", &doc).unwrap(), Status::NeedsReview)
            .unwrap();
        let before = fs::read(db.path()).unwrap();

        db.update(7, Status::Approved, Some(&doc)).unwrap();
        assert_eq!(fs::read(db.path()).unwrap(), before);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let (_dir, db) = store();
        fs::write(db.path(), "id,filename\nnot,a,valid,table\n").unwrap();
        assert!(db.list_all().is_empty());

        let doc = contract::sample_document("ACME", 10.0, 50);
        let id = db
            .append(NewRecord::from_document("a.pdf", &doc).unwrap(), Status::NeedsReview)
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(db.list_all().len(), 1);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = CsvStore::new(dir.path().join("nested").join("docs.csv"));
        let doc = contract::sample_document("ACME", 10.0, 50);
        db.append(NewRecord::from_document("a.pdf", &doc).unwrap(), Status::Approved)
            .unwrap();
        assert_eq!(db.list_all().len(), 1);
    }
}
