// src/review.rs

use crate::document::{Amount, DocumentType, ExtractedDocument};
use crate::policy::Status;
use crate::store::{DocumentRecord, DocumentStore, StoreError};
use crate::validator::{ValidationReport, Validator};
use tracing::{info, warn};

/// A document waiting for a person, with the rule verdicts to show them.
#[derive(Debug)]
pub struct ReviewItem {
    pub record: DocumentRecord,
    pub document: ExtractedDocument,
    pub report: ValidationReport,
}

/// Rows in `needs_review`, oldest first, each re-validated against today.
pub fn pending(store: &dyn DocumentStore, validator: &Validator) -> Vec<ReviewItem> {
    store
        .with_status(Status::NeedsReview)
        .into_iter()
        .map(|record| {
            let document = record.document().unwrap_or_else(|e| {
                warn!(id = record.id, error = %e, "Stored extraction is not valid JSON");
                ExtractedDocument::default()
            });
            let report = validator.validate(&document);
            ReviewItem {
                record,
                document,
                report,
            }
        })
        .collect()
}

/// Corrections a reviewer made. `None` keeps the extracted value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewEdits {
    pub vendor_name: Option<String>,
    pub date: Option<String>,
    pub total_amount: Option<f64>,
    pub document_type: Option<DocumentType>,
}

impl ReviewEdits {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, doc: &mut ExtractedDocument) {
        if let Some(vendor) = &self.vendor_name {
            doc.vendor_name = Some(vendor.clone());
        }
        if let Some(date) = &self.date {
            doc.date = Some(date.clone());
        }
        if let Some(total) = self.total_amount {
            doc.total_amount = Some(Amount::Number(total));
        }
        if let Some(kind) = self.document_type {
            doc.document_type = Some(kind);
        }
    }
}

/// Approve row `id` with the reviewer's corrections applied.
///
/// Returns `false` when no such row exists. Approving a row that is already
/// approved just rewrites the same values.
pub fn approve(store: &dyn DocumentStore, id: i64, edits: &ReviewEdits) -> Result<bool, StoreError> {
    let Some(record) = store.get(id) else {
        warn!(id, "No document with this id");
        return Ok(false);
    };

    let mut document = record.document().unwrap_or_else(|e| {
        warn!(id, error = %e, "Stored extraction is not valid JSON, starting from an empty one");
        ExtractedDocument::default()
    });
    edits.apply(&mut document);

    store.update(id, Status::Approved, Some(&document))?;
    info!(id, edited = !edits.is_empty(), "Document approved");
    Ok(true)
}
