// src/structuring/llm.rs

use super::{Structurer, StructuringError};
use crate::document::ExtractedDocument;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Instructs the model to return the document schema as a bare JSON object.
const SYSTEM_PROMPT: &str = r#"You are a document processing assistant.
Given raw text extracted from a PDF invoice or receipt, extract structured data and return ONLY valid JSON.

The JSON must match this schema exactly:
{
  "document_type": "Invoice" | "Receipt" | "Bill" | "Other",
  "invoice_number": "string or null",
  "date": "YYYY-MM-DD or null",
  "vendor_name": "string or null",
  "total_amount": number or null,
  "currency": "string or null (e.g. USD, EUR, GBP)",
  "tax_amount": number or null,
  "payment_terms": "string or null",
  "line_items": [
    {
      "description": "string",
      "quantity": number,
      "unit_price": number,
      "subtotal": number
    }
  ],
  "field_confidence": { "<field name>": integer 0-100, ... },
  "overall_confidence": integer 0-100
}

Notes:
- Amounts are plain numbers without currency symbols or thousands separators.
- Give a confidence score for every field above in field_confidence.
- Use null for fields you cannot determine.
- Return ONLY the JSON object, no markdown fences, no commentary."#;

/// Longer inputs are cut to stay within context limits.
const MAX_INPUT_CHARS: usize = 12_000;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// One model behind an OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmStructurer {
    client: Client,
    label: &'static str,
    base_url: String,
    model: String,
    api_key: String,
}

impl LlmStructurer {
    pub fn new(client: Client, label: &'static str, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client,
            label,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!(
                        "Extract the document data from the following PDF text:\n\n{}",
                        truncate_chars(text, MAX_INPUT_CHARS)
                    ),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl Structurer for LlmStructurer {
    fn name(&self) -> String {
        format!("{}/{}", self.label, self.model)
    }

    async fn structure(&self, text: &str) -> Result<ExtractedDocument, StructuringError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StructuringError::Api { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(StructuringError::EmptyResponse)?;
        debug!(model = %self.model, chars = content.len(), "LLM answered");

        parse_completion(content)
    }
}

/// Turn the model's message into a document.
fn parse_completion(content: &str) -> Result<ExtractedDocument, StructuringError> {
    // Strip markdown fences if the model added them despite instructions
    let json_str = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    // Reasoning models may prepend text; keep just the outermost object.
    let json_str = extract_json_object(json_str)?;
    Ok(ExtractedDocument::from_json(json_str)?)
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text.
fn extract_json_object(s: &str) -> Result<&str, StructuringError> {
    let start = s
        .find('{')
        .ok_or(StructuringError::NoJsonObject("no '{' found"))?;
    let end = s
        .rfind('}')
        .ok_or(StructuringError::NoJsonObject("no '}' found"))?;
    if end <= start {
        return Err(StructuringError::NoJsonObject("braces out of order"));
    }
    Ok(&s[start..=end])
}

/// At most `max` characters of `s`, never splitting a UTF-8 sequence.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
