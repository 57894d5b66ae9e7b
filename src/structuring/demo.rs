use super::{Structurer, StructuringError};
use crate::document::{Amount, DocumentType, ExtractedDocument, LineItem};
use async_trait::async_trait;
use std::time::Duration;

/// Fixed answer for demos: no API key, no network, always auto-approvable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoStructurer;

#[async_trait]
impl Structurer for DemoStructurer {
    fn name(&self) -> String {
        "demo".to_string()
    }

    async fn structure(&self, _text: &str) -> Result<ExtractedDocument, StructuringError> {
        // Feels like a model call without making one.
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(mock_document())
    }
}

pub fn mock_document() -> ExtractedDocument {
    ExtractedDocument {
        document_type: Some(DocumentType::Invoice),
        invoice_number: Some("MOCK-12345".into()),
        date: Some("2026-02-09".into()),
        vendor_name: Some("Mock Vendor Corp.".into()),
        total_amount: Some(Amount::Number(1980.0)),
        currency: Some("USD".into()),
        line_items: vec![LineItem {
            description: Some("Cloud Services".into()),
            quantity: Some(Amount::Number(1.0)),
            unit_price: Some(Amount::Number(1980.0)),
            subtotal: Some(Amount::Number(1980.0)),
        }],
        overall_confidence: 92,
        ..Default::default()
    }
}
