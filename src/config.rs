use crate::policy::AUTO_APPROVE_THRESHOLD;
use crate::validator::{AMOUNT_WARNING_LIMIT, REQUIRED_FIELDS};
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config: cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Config: invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backing file for the record store. Defaults depend on `store`.
    pub db_path: Option<String>,
    pub store: StoreBackend,
    /// Ingested files are copied here first when set.
    pub upload_dir: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub policy: PolicySection,
    pub llm: LlmSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            store: StoreBackend::default(),
            upload_dir: None,
            log_level: default_log_level(),
            policy: PolicySection::default(),
            llm: LlmSection::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Single-file SQLite table (transactional).
    #[default]
    Sqlite,
    /// Flat CSV file, rewritten on every change.
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub auto_approve_threshold: u8,
    pub amount_warning_limit: f64,
    pub required_fields: Vec<String>,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            auto_approve_threshold: AUTO_APPROVE_THRESHOLD,
            amount_warning_limit: AMOUNT_WARNING_LIMIT,
            required_fields: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Hosted OpenAI-compatible API (needs `LLM_API_KEY` or `OPENAI_API_KEY`).
    #[default]
    Remote,
    /// Local Ollama server.
    Ollama,
    /// Regex extraction only, no model.
    Heuristics,
    /// Fixed mock answer; no PDF parsing and no API calls.
    Demo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    /// Append regex extraction after the model strategies.
    pub heuristic_fallback: bool,
    pub remote: EndpointConfig,
    pub ollama: EndpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: Option<String>,
    /// Tried in order until one answers with a usable document.
    pub models: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            models: Vec::new(),
            timeout_secs: 60,
        }
    }
}

const REMOTE_BASE_URL: &str = "https://api.openai.com/v1";
// Cheapest first, sturdier model as fallback.
const REMOTE_MODELS: &[&str] = &["gpt-4.1-nano-2025-04-14", "gpt-4o-mini"];
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const OLLAMA_MODELS: &[&str] = &["qwen3:8b"];

/// Endpoint settings with per-backend defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSettings {
    pub base_url: String,
    pub models: Vec<String>,
    pub timeout_secs: u64,
}

impl LlmSection {
    /// `None` for backends that never talk to a model.
    pub fn endpoint(&self) -> Option<EndpointSettings> {
        let (section, default_url, default_models) = match self.backend {
            LlmBackend::Remote => (&self.remote, REMOTE_BASE_URL, REMOTE_MODELS),
            LlmBackend::Ollama => (&self.ollama, OLLAMA_BASE_URL, OLLAMA_MODELS),
            LlmBackend::Heuristics | LlmBackend::Demo => return None,
        };

        let base_url = section
            .base_url
            .clone()
            .unwrap_or_else(|| default_url.to_string());
        let models = if section.models.is_empty() {
            default_models.iter().map(|m| m.to_string()).collect()
        } else {
            section.models.clone()
        };
        Some(EndpointSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            models,
            timeout_secs: section.timeout_secs,
        })
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` if it exists, otherwise run on built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn db_path(&self) -> &str {
        match (&self.db_path, self.store) {
            (Some(p), _) => p.as_str(),
            (None, StoreBackend::Sqlite) => "docuflow.db",
            (None, StoreBackend::Csv) => "documents_data.csv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.store, StoreBackend::Sqlite);
        assert_eq!(cfg.db_path(), "docuflow.db");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.upload_dir, None);
        assert_eq!(cfg.policy.auto_approve_threshold, 85);
        assert_eq!(cfg.policy.amount_warning_limit, 10_000.0);
        assert_eq!(
            cfg.policy.required_fields,
            ["vendor_name", "date", "total_amount"]
        );
        assert_eq!(cfg.llm.backend, LlmBackend::Remote);
        assert!(!cfg.llm.heuristic_fallback);
    }

    #[test]
    fn test_full_config() {
        let cfg: Config = toml::from_str(
            r#"
            store = "csv"
            log_level = "debug"
            upload_dir = "uploads"

            [policy]
            auto_approve_threshold = 90

            [llm]
            backend = "ollama"
            heuristic_fallback = true

            [llm.ollama]
            base_url = "http://gpu-box:11434/v1/"
            models = ["llama3.1:8b"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.db_path(), "documents_data.csv");
        assert_eq!(cfg.upload_dir.as_deref(), Some("uploads"));
        assert_eq!(cfg.policy.auto_approve_threshold, 90);
        assert_eq!(cfg.policy.amount_warning_limit, 10_000.0);

        let endpoint = cfg.llm.endpoint().unwrap();
        assert_eq!(endpoint.base_url, "http://gpu-box:11434/v1");
        assert_eq!(endpoint.models, ["llama3.1:8b"]);
        assert_eq!(endpoint.timeout_secs, 60);
    }

    #[test]
    fn test_remote_defaults_to_model_fallback_list() {
        let cfg = Config::default();
        let endpoint = cfg.llm.endpoint().unwrap();
        assert_eq!(endpoint.base_url, "https://api.openai.com/v1");
        assert_eq!(endpoint.models, ["gpt-4.1-nano-2025-04-14", "gpt-4o-mini"]);
    }

    #[test]
    fn test_offline_backends_have_no_endpoint() {
        let mut cfg = Config::default();
        cfg.llm.backend = LlmBackend::Demo;
        assert!(cfg.llm.endpoint().is_none());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.store, StoreBackend::Sqlite);
        assert!(Config::load(dir.path().join("nope.toml")).is_err());
    }
}
