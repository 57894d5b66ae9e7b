// src/dashboard.rs

use crate::policy::Status;
use crate::store::DocumentRecord;

/// Aggregate view over every stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub processed: usize,
    pub approved: usize,
    pub needs_review: usize,
    /// Percentage of rows approved, rounded to a whole number (halves to even).
    pub approval_rate: u32,
    pub average_confidence: u32,
}

impl Summary {
    /// `None` for an empty table, there is nothing to summarise.
    pub fn from_records(records: &[DocumentRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let processed = records.len();
        let approved = records
            .iter()
            .filter(|r| r.status == Status::Approved)
            .count();
        let confidence_sum: u64 = records.iter().map(|r| u64::from(r.confidence)).sum();

        Some(Self {
            processed,
            approved,
            needs_review: processed - approved,
            approval_rate: (approved as f64 / processed as f64 * 100.0).round_ties_even() as u32,
            average_confidence: (confidence_sum as f64 / processed as f64).round_ties_even() as u32,
        })
    }
}

/// Rows newest first. Timestamps are `YYYY-MM-DD HH:MM:SS`, so text order
/// is time order; ties keep storage order.
pub fn ledger(records: &[DocumentRecord]) -> Vec<&DocumentRecord> {
    let mut rows: Vec<&DocumentRecord> = records.iter().collect();
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows
}
