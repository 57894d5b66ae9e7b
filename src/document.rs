// src/document.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Category of a processed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum DocumentType {
    Invoice,
    Receipt,
    Bill,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "Invoice",
            DocumentType::Receipt => "Receipt",
            DocumentType::Bill => "Bill",
            DocumentType::Other => "Other",
        }
    }
}

impl From<String> for DocumentType {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "invoice" => DocumentType::Invoice,
            "receipt" => DocumentType::Receipt,
            "bill" => DocumentType::Bill,
            _ => DocumentType::Other,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monetary value as the model returned it.
///
/// Models are not reliable about types, so a total can arrive as a number,
/// as a string such as `"1,980.00"`, or as something else entirely. Keeping
/// the raw shape lets validation tell "absent" apart from "present but bad".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Amount {
    /// Numeric coercion: numbers as-is, strings parsed after trimming,
    /// booleans as 1/0. Anything else is not a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amount::Number(n) => Some(*n),
            Amount::Text(s) => s.trim().parse::<f64>().ok(),
            Amount::Other(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
            Amount::Other(_) => None,
        }
    }

    /// Whether the value counts as "filled in" for required-field checks.
    /// Zero and the empty string do not.
    pub fn is_truthy(&self) -> bool {
        match self {
            Amount::Number(n) => *n != 0.0,
            Amount::Text(s) => !s.is_empty(),
            Amount::Other(v) => value_is_truthy(v),
        }
    }
}

impl From<f64> for Amount {
    fn from(n: f64) -> Self {
        Amount::Number(n)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Number(n) => write!(f, "{n}"),
            Amount::Text(s) => f.write_str(s),
            Amount::Other(v) => write!(f, "{v}"),
        }
    }
}

/// A single line on an invoice or receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<Amount>,
    #[serde(default)]
    pub unit_price: Option<Amount>,
    #[serde(default)]
    pub subtotal: Option<Amount>,
}

/// Structured fields extracted from one document.
///
/// Field names are the wire contract with the structuring model. Keys the
/// model adds beyond these are kept in `extra` so nothing is lost when the
/// document is written back to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    #[serde(default)]
    pub document_type: Option<DocumentType>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub invoice_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Amount>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(default)]
    pub tax_amount: Option<Amount>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_terms: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub line_items: Vec<LineItem>,
    #[serde(default, deserialize_with = "score_map")]
    pub field_confidence: BTreeMap<String, u8>,
    #[serde(default, deserialize_with = "score")]
    pub overall_confidence: u8,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractedDocument {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Whether `field` holds a non-empty, non-zero value.
    ///
    /// Names outside the schema are looked up among the preserved extra keys.
    pub fn field_is_present(&self, field: &str) -> bool {
        match field {
            "document_type" => self.document_type.is_some(),
            "invoice_number" => non_empty(&self.invoice_number),
            "date" => non_empty(&self.date),
            "vendor_name" => non_empty(&self.vendor_name),
            "total_amount" => self.total_amount.as_ref().is_some_and(Amount::is_truthy),
            "currency" => non_empty(&self.currency),
            "tax_amount" => self.tax_amount.as_ref().is_some_and(Amount::is_truthy),
            "payment_terms" => non_empty(&self.payment_terms),
            "line_items" => !self.line_items.is_empty(),
            "field_confidence" => !self.field_confidence.is_empty(),
            "overall_confidence" => self.overall_confidence != 0,
            other => self.extra.get(other).is_some_and(value_is_truthy),
        }
    }

    /// How many scalar fields were filled in (out of the scalar ones).
    pub fn coverage(&self) -> (usize, usize) {
        let total = 8;
        let filled = [
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
        .filter(|f| self.field_is_present(f))
        .count();
        (filled, total)
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

fn value_is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Convert a 0-100 score in whatever shape the model sent it.
fn score_from_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if raw.is_nan() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

/// Accept numbers and booleans where a string is expected. Falsy non-string
/// values (`0`, `false`, `[]`, `{}`) read as missing.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) if !value_is_truthy(&other) => None,
        Some(other) => Some(other.to_string()),
    })
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(score_from_value).unwrap_or(0))
}

fn score_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .iter()
        .filter_map(|(field, v)| score_from_value(v).map(|s| (field.clone(), s)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_model_answer() {
        let json = r#"{
            "document_type": "Invoice",
            "invoice_number": "INV-2026-001",
            "date": "2026-02-09",
            "vendor_name": "ACME Solutions Inc.",
            "total_amount": 1980.00,
            "currency": "USD",
            "tax_amount": 180,
            "payment_terms": "Net 30",
            "line_items": [
                {"description": "Cloud Hosting Service - Annual", "quantity": 1, "unit_price": 1200.0, "subtotal": 1200.0}
            ],
            "field_confidence": {"vendor_name": 98, "total_amount": "95%"},
            "overall_confidence": 93.6
        }"#;
        let doc = ExtractedDocument::from_json(json).unwrap();
        assert_eq!(doc.document_type, Some(DocumentType::Invoice));
        assert_eq!(doc.vendor_name.as_deref(), Some("ACME Solutions Inc."));
        assert_eq!(doc.total_amount, Some(Amount::Number(1980.0)));
        assert_eq!(doc.line_items.len(), 1);
        assert_eq!(doc.field_confidence.get("total_amount"), Some(&95));
        assert_eq!(doc.overall_confidence, 94);
        assert!(doc.extra.is_empty());
    }

    #[test]
    fn test_absent_null_and_zero_are_distinct() {
        let absent = ExtractedDocument::from_json("{}").unwrap();
        let null = ExtractedDocument::from_json(r#"{"total_amount": null}"#).unwrap();
        let zero = ExtractedDocument::from_json(r#"{"total_amount": 0}"#).unwrap();

        assert_eq!(absent.total_amount, None);
        assert_eq!(null.total_amount, None);
        assert_eq!(zero.total_amount, Some(Amount::Number(0.0)));
        assert!(!zero.field_is_present("total_amount"));
    }

    #[test]
    fn test_loose_types_are_tolerated() {
        let json = r#"{
            "document_type": "credit note",
            "invoice_number": 12345,
            "total_amount": "1,980.00",
            "line_items": null,
            "overall_confidence": 250
        }"#;
        let doc = ExtractedDocument::from_json(json).unwrap();
        assert_eq!(doc.document_type, Some(DocumentType::Other));
        assert_eq!(doc.invoice_number.as_deref(), Some("12345"));
        assert_eq!(doc.total_amount, Some(Amount::Text("1,980.00".into())));
        assert!(doc.line_items.is_empty());
        assert_eq!(doc.overall_confidence, 100);
    }

    #[test]
    fn test_falsy_scalars_in_text_fields_are_missing() {
        let doc = ExtractedDocument::from_json(
            r#"{"vendor_name": 0, "date": false, "currency": "", "invoice_number": true}"#,
        )
        .unwrap();
        assert_eq!(doc.vendor_name, None);
        assert_eq!(doc.date, None);
        assert!(!doc.field_is_present("vendor_name"));
        assert!(!doc.field_is_present("date"));
        assert!(!doc.field_is_present("currency"));
        assert_eq!(doc.invoice_number.as_deref(), Some("true"));
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let json = r#"{"vendor_name": "ACME", "po_number": "PO-7", "overall_confidence": 90}"#;
        let doc = ExtractedDocument::from_json(json).unwrap();
        assert_eq!(doc.extra.get("po_number"), Some(&Value::from("PO-7")));
        assert!(doc.field_is_present("po_number"));

        let again = ExtractedDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_amount_coercion() {
        assert_eq!(Amount::Text(" 12.50 ".into()).as_f64(), Some(12.5));
        assert_eq!(Amount::Text("twelve".into()).as_f64(), None);
        assert_eq!(Amount::Other(Value::Bool(true)).as_f64(), Some(1.0));
        assert_eq!(Amount::Other(Value::Array(vec![])).as_f64(), None);
    }

    #[test]
    fn test_coverage_counts_scalar_fields() {
        let doc = ExtractedDocument {
            vendor_name: Some("ACME".into()),
            date: Some("2026-02-09".into()),
            total_amount: Some(Amount::Number(10.0)),
            ..Default::default()
        };
        assert_eq!(doc.coverage(), (3, 8));
    }
}
