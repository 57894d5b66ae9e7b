use super::{Structurer, StructuringError};
use crate::document::{Amount, DocumentType, ExtractedDocument, LineItem};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;

/// Regex results are never trusted enough to skip review: confidence tops
/// out at this value when every field is found.
const MAX_HEURISTIC_CONFIDENCE: usize = 80;

/// Per-field confidence reported for anything the patterns matched.
const FIELD_CONFIDENCE: u8 = 60;

/// Keyword-anchored regex extraction. No model involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicStructurer;

#[async_trait]
impl Structurer for HeuristicStructurer {
    fn name(&self) -> String {
        "heuristics".to_string()
    }

    async fn structure(&self, text: &str) -> Result<ExtractedDocument, StructuringError> {
        let doc = extract(text);
        if doc.coverage().0 == 0 {
            return Err(StructuringError::NothingExtracted);
        }
        Ok(doc)
    }
}

/// Main extraction entry point.
pub fn extract(text: &str) -> ExtractedDocument {
    let mut doc = ExtractedDocument {
        document_type: extract_document_type(text),
        invoice_number: extract_invoice_number(text),
        date: extract_date(text),
        vendor_name: extract_vendor(text),
        total_amount: extract_total_amount(text).map(Amount::Number),
        currency: extract_currency(text),
        tax_amount: extract_tax_amount(text).map(Amount::Number),
        payment_terms: extract_payment_terms(text),
        line_items: extract_line_items(text),
        ..Default::default()
    };

    let found: BTreeMap<String, u8> = [
        "document_type",
        "invoice_number",
        "date",
        "vendor_name",
        "total_amount",
        "currency",
        "tax_amount",
        "payment_terms",
    ]
    .iter()
    .filter(|f| doc.field_is_present(f))
    .map(|f| (f.to_string(), FIELD_CONFIDENCE))
    .collect();

    let (filled, total) = doc.coverage();
    doc.overall_confidence = (filled * MAX_HEURISTIC_CONFIDENCE / total) as u8;
    doc.field_confidence = found;
    doc
}

// ---------------------------------------------------------------------------
// Scalar field extractors
// ---------------------------------------------------------------------------

fn extract_document_type(text: &str) -> Option<DocumentType> {
    let upper = text.to_uppercase();
    if upper.contains("RECEIPT") {
        Some(DocumentType::Receipt)
    } else if upper.contains("INVOICE") {
        Some(DocumentType::Invoice)
    } else if upper.contains("BILL") && !upper.contains("BILL TO") {
        Some(DocumentType::Bill)
    } else {
        None
    }
}

fn extract_invoice_number(text: &str) -> Option<String> {
    // "Invoice #: INV-2026-001", "Invoice No. 123", "Receipt Number: R-9"
    let re = Regex::new(
        r"(?i)(?:Invoice|Receipt|Bill)\s*(?:No\.?|Number|#)\s*:?\s*#?\s*([A-Za-z0-9][A-Za-z0-9\-/]*)",
    )
    .ok()?;
    re.captures(text).map(|c| c[1].trim().to_string())
}

fn extract_date(text: &str) -> Option<String> {
    let re = Regex::new(
        r"(?i)\b(?:Invoice\s+|Receipt\s+|Issue\s+)?Date\s*:?\s*(\d{4}-\d{2}-\d{2}|[A-Za-z]+\s+\d{1,2},?\s+\d{4}|\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4})",
    )
    .ok()?;
    let raw = re.captures(text)?[1].trim().to_string();
    Some(normalise_date(&raw).unwrap_or(raw))
}

/// "February 16, 2026" -> "2026-02-16". Numeric day/month orders are
/// ambiguous and left as found.
fn normalise_date(raw: &str) -> Option<String> {
    if Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok()?.is_match(raw) {
        return Some(raw.to_string());
    }
    let re = Regex::new(r"^([A-Za-z]+)\s+(\d{1,2}),?\s+(\d{4})$").ok()?;
    let cap = re.captures(raw)?;
    let month = month_number(&cap[1])?;
    let day: u8 = cap[2].parse().ok()?;
    Some(format!("{}-{month:02}-{day:02}", &cap[3]))
}

fn month_number(name: &str) -> Option<u8> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u8 + 1)
}

fn extract_currency(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)\b(US\$|USD|SGD|EUR|GBP|THB|JPY|CAD|AUD)\b").ok()?;
    if let Some(cap) = re.captures(text) {
        let raw = cap[1].to_uppercase();
        // Normalise "US$" → "USD"
        return Some(if raw == "US$" { "USD".to_string() } else { raw });
    }
    if text.contains('€') {
        Some("EUR".to_string())
    } else if text.contains('£') {
        Some("GBP".to_string())
    } else if text.contains('$') {
        Some("USD".to_string())
    } else {
        None
    }
}

fn parse_money(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

fn extract_total_amount(text: &str) -> Option<f64> {
    // Line-anchored so "Subtotal:" does not count. The last match wins,
    // grand totals come after running totals.
    let re = Regex::new(
        r"(?im)^\s*(?:grand\s+)?total(?:\s+(?:due|amount|payable))?\s*:?\s*(?:[A-Z]{3}\s*)?[$€£]?\s*(\d[\d,]*(?:\.\d+)?)",
    )
    .ok()?;
    re.captures_iter(text)
        .filter_map(|c| parse_money(&c[1]))
        .last()
}

fn extract_tax_amount(text: &str) -> Option<f64> {
    let re = Regex::new(
        r"(?im)^\s*(?:sales\s+|vat\s+|gst\s+)?(?:tax|vat|gst)(?:\s*\([^)]*\))?\s*:?\s*[$€£]?\s*(\d[\d,]*(?:\.\d+)?)",
    )
    .ok()?;
    re.captures(text).and_then(|c| parse_money(&c[1]))
}

fn extract_payment_terms(text: &str) -> Option<String> {
    let re = Regex::new(r"(?im)Payment\s+Terms\s*:?\s*([^\n]+?)\s*$").ok()?;
    re.captures(text).map(|c| c[1].trim().to_string())
}

fn extract_vendor(text: &str) -> Option<String> {
    // An explicit label beats guessing.
    let labelled = Regex::new(r"(?im)^\s*(?:Vendor|Seller|Supplier|Merchant)\s*:\s*(.+?)\s*$").ok()?;
    if let Some(cap) = labelled.captures(text) {
        return Some(cap[1].to_string());
    }

    // Otherwise the first company that is not the one being billed.
    let buyer = extract_buyer(text).map(|b| b.to_uppercase());
    extract_company_names(text)
        .into_iter()
        .find(|company| match &buyer {
            Some(b) => !company.to_uppercase().contains(b.as_str()),
            None => true,
        })
}

fn extract_buyer(text: &str) -> Option<String> {
    // "BILL TO:" is followed by the buyer name on the next line
    let re = Regex::new(r"(?i)(?:Bill(?:ed)?\s+To|Sold\s+To)\s*:?\s*\n\s*(.+)").ok()?;
    re.captures(text).map(|c| c[1].trim().to_string())
}

/// Find company-like names (X Inc., X LLC, X PTE LTD, X CO. LTD, etc.)
fn extract_company_names(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(
        r"(?im)^[ \t]*([A-Za-z0-9][A-Za-z0-9&.,' \t-]*?\b(?:PTE\.?[ \t]*LTD\.?|CO\.?,?[ \t]*LTD\.?|LTD\.?|LLC|GMBH|CORPORATION|CORP\.?|INC\.?))",
    ) else {
        return Vec::new();
    };
    re.captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

/// Rows shaped like `description  qty  unit_price  subtotal`.
fn extract_line_items(text: &str) -> Vec<LineItem> {
    let Ok(row_re) = Regex::new(
        r"(?m)^[ \t]*([A-Za-z][^\n]*?)[ \t]+(\d+(?:\.\d+)?)[ \t]+[$€£]?(\d[\d,]*\.\d{2})[ \t]+[$€£]?(\d[\d,]*\.\d{2})[ \t]*$",
    ) else {
        return Vec::new();
    };

    row_re
        .captures_iter(text)
        .filter_map(|cap| {
            let quantity: f64 = cap[2].parse().ok()?;
            let unit_price = parse_money(&cap[3])?;
            let subtotal = parse_money(&cap[4])?;
            // Only rows whose arithmetic adds up are line items.
            if (quantity * unit_price - subtotal).abs() > 0.01 {
                return None;
            }
            Some(LineItem {
                description: Some(cap[1].trim().to_string()),
                quantity: Some(Amount::Number(quantity)),
                unit_price: Some(Amount::Number(unit_price)),
                subtotal: Some(Amount::Number(subtotal)),
            })
        })
        .collect()
}
