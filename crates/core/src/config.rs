//! Configuration management for Citeflow.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.citeflow/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with sources and profiles stored in `.citeflow/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .citeflow/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider (e.g., "ollama")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// Provider endpoint override
    pub endpoint: Option<String>,

    /// Provider request timeout in seconds
    pub llm_timeout_secs: Option<u64>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    /// Retrieval settings injected into the retriever
    pub retrieval: RetrievalConfig,

    /// Completion and reformulation settings
    pub completion: CompletionConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

/// Retrieval settings handed to the document index on every search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Maximum number of results requested from the index
    pub max_results: usize,

    /// Minimum semantic similarity for a document to be returned (0.0 - 1.0)
    pub similarity_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            similarity_threshold: 0.3,
        }
    }
}

impl RetrievalConfig {
    /// Check that the settings are usable.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_results == 0 {
            return Err(AppError::Config(
                "retrieval.maxResults must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::Config(format!(
                "retrieval.similarityThreshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }

        Ok(())
    }
}

/// Sampling settings for answer generation and query reformulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionConfig {
    /// Temperature for the answer completion
    pub temperature: f32,

    /// Temperature for follow-up query reformulation
    pub reformulation_temperature: f32,

    /// Number of trailing conversation messages sent for reformulation
    pub reformulation_turns: usize,

    /// Upper bound on a reformulation call, in seconds
    pub reformulation_timeout_secs: u64,

    /// Maximum tokens to generate for the answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            reformulation_temperature: 0.1,
            reformulation_turns: 6,
            reformulation_timeout_secs: 10,
            max_tokens: None,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    retrieval: Option<RetrievalConfig>,
    completion: Option<CompletionConfig>,
    server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            llm_timeout_secs: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            retrieval: RetrievalConfig::default(),
            completion: CompletionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `CITEFLOW_WORKSPACE`: Override workspace path
    /// - `CITEFLOW_CONFIG`: Path to config file
    /// - `CITEFLOW_PROVIDER`: LLM provider
    /// - `CITEFLOW_MODEL`: Model identifier
    /// - `CITEFLOW_ENDPOINT`: Provider endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use citeflow_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration with an explicit workspace and config file taking
    /// precedence over `CITEFLOW_WORKSPACE` and `CITEFLOW_CONFIG`.
    pub fn load_from(
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
    ) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var_os("CITEFLOW_WORKSPACE").map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        let config_file =
            config_file.or_else(|| std::env::var_os("CITEFLOW_CONFIG").map(PathBuf::from));
        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.citeflow_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("CITEFLOW_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("CITEFLOW_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("CITEFLOW_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = model;
            }
            if llm.endpoint.is_some() {
                result.endpoint = llm.endpoint;
            }
            if llm.timeout.is_some() {
                result.llm_timeout_secs = llm.timeout;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        if let Some(completion) = config_file.completion {
            result.completion = completion;
        }

        if let Some(server) = config_file.server {
            result.server = server;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .citeflow directory.
    pub fn citeflow_dir(&self) -> PathBuf {
        self.workspace.join(".citeflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama"];
        if !known_providers.contains(&self.provider.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AppError::Config("Model identifier cannot be empty".to_string()));
        }

        self.retrieval.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.retrieval.max_results, 10);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_citeflow_dir() {
        let config = AppConfig::default();
        assert!(config.citeflow_dir().ends_with(".citeflow"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("mistral".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.model, "mistral");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
llm:
  model: qwen2.5
  endpoint: http://gpu-box:11434
retrieval:
  maxResults: 5
  similarityThreshold: 0.45
completion:
  temperature: 0.2
logging:
  color: false
  json: true
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();

        assert_eq!(merged.model, "qwen2.5");
        assert_eq!(merged.endpoint.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(merged.retrieval.max_results, 5);
        assert!((merged.retrieval.similarity_threshold - 0.45).abs() < f32::EPSILON);
        assert!((merged.completion.temperature - 0.2).abs() < f32::EPSILON);
        // Unspecified fields keep their defaults
        assert_eq!(merged.completion.reformulation_turns, 6);
        assert!(merged.no_color);
        assert!(merged.json_logs);
    }

    #[test]
    fn test_load_from_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval:\n  maxResults: 3\n").unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.retrieval.max_results, 3);
    }

    #[test]
    fn test_load_from_workspace() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join(".citeflow");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.yaml"), "server:\n  bind: 0.0.0.0:9000\n").unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, temp.path());
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let result = AppConfig::load_from(Some(PathBuf::from("/nonexistent/citeflow")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut config = AppConfig::default();
        config.retrieval.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        config.retrieval.similarity_threshold = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let config = AppConfig {
            provider: "unknown".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_max_results() {
        let mut config = AppConfig::default();
        config.retrieval.max_results = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
