// src/structuring/mod.rs

mod demo;
mod heuristics;
mod llm;

pub use demo::DemoStructurer;
pub use heuristics::HeuristicStructurer;
pub use llm::LlmStructurer;

use crate::config::{LlmBackend, LlmSection};
use crate::document::ExtractedDocument;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("Malformed JSON in LLM response: {0}")]
    NoJsonObject(&'static str),

    #[error("Failed to parse LLM response as a document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No recognisable fields in document text")]
    NothingExtracted,
}

/// One way of turning document text into structured fields.
#[async_trait]
pub trait Structurer: Send + Sync {
    /// Short label for logs, e.g. `remote/gpt-4o-mini`.
    fn name(&self) -> String;

    async fn structure(&self, text: &str) -> Result<ExtractedDocument, StructuringError>;
}

/// Strategies tried in order until one produces a document.
pub struct FallbackChain {
    strategies: Vec<Box<dyn Structurer>>,
}

impl FallbackChain {
    pub fn new(strategies: Vec<Box<dyn Structurer>>) -> Self {
        Self { strategies }
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First successful strategy wins. `None` when the text is empty or
    /// every strategy failed; there is never a partial document.
    pub async fn structure(&self, text: &str) -> Option<ExtractedDocument> {
        if text.trim().is_empty() {
            warn!("No text to structure");
            return None;
        }

        for strategy in &self.strategies {
            let name = strategy.name();
            match strategy.structure(text).await {
                Ok(doc) => {
                    let (filled, total) = doc.coverage();
                    info!(
                        strategy = %name,
                        filled, total,
                        confidence = doc.overall_confidence,
                        "Structured extraction succeeded"
                    );
                    return Some(doc);
                }
                Err(e) => {
                    warn!(strategy = %name, error = %e, "Structuring strategy failed");
                }
            }
        }

        error!(tried = self.strategies.len(), "All structuring strategies failed");
        None
    }
}

/// API key for hosted backends.
fn api_key_from_env() -> Option<String> {
    ["LLM_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

/// Check if the Ollama server is reachable.
async fn check_ollama_health(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches('/').trim_end_matches("/v1");

    match client
        .get(health_url)
        .timeout(Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            info!("Ollama server is reachable");
            true
        }
        Ok(resp) => {
            warn!(status = %resp.status(), "Ollama server returned non-OK status");
            false
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

/// Build the strategy chain for the configured backend.
///
/// A backend that cannot be used (no API key, Ollama down) contributes no
/// strategies; if nothing is left the chain simply fails every document.
pub async fn build_chain(llm: &LlmSection) -> Result<FallbackChain, StructuringError> {
    let mut strategies: Vec<Box<dyn Structurer>> = Vec::new();

    match llm.backend {
        LlmBackend::Demo => strategies.push(Box::new(DemoStructurer)),
        LlmBackend::Heuristics => strategies.push(Box::new(HeuristicStructurer)),
        LlmBackend::Remote | LlmBackend::Ollama => {
            if let Some(endpoint) = llm.endpoint() {
                let client = Client::builder()
                    .timeout(Duration::from_secs(endpoint.timeout_secs))
                    .build()?;

                let api_key = match llm.backend {
                    LlmBackend::Remote => api_key_from_env(),
                    // required by the API shape but ignored by Ollama
                    _ => Some("ollama".to_string()),
                };
                let reachable = match llm.backend {
                    LlmBackend::Ollama => check_ollama_health(&client, &endpoint.base_url).await,
                    _ => true,
                };

                match api_key {
                    None => error!("LLM_API_KEY / OPENAI_API_KEY not set, remote backend disabled"),
                    Some(_) if !reachable => error!(
                        url = %endpoint.base_url,
                        "Ollama is not running. Start it with: ollama serve"
                    ),
                    Some(key) => {
                        info!(
                            url = %endpoint.base_url,
                            models = ?endpoint.models,
                            backend = ?llm.backend,
                            "Using LLM backend"
                        );
                        let label = match llm.backend {
                            LlmBackend::Ollama => "ollama",
                            _ => "remote",
                        };
                        for model in &endpoint.models {
                            strategies.push(Box::new(LlmStructurer::new(
                                client.clone(),
                                label,
                                &endpoint.base_url,
                                model,
                                &key,
                            )));
                        }
                    }
                }
            }

            if llm.heuristic_fallback {
                strategies.push(Box::new(HeuristicStructurer));
            }
        }
    }

    Ok(FallbackChain::new(strategies))
}
