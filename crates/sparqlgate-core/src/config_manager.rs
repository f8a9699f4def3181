use crate::query_builder::DEFAULT_PREFIXES;
use crate::sanitize::sanitize_uri;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Smallest output budget that still fits the truncation marker
pub const MIN_OUTPUT_CHARS: usize = 256;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for SparqlGate
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SparqlGateConfig {
    /// Trusted endpoint and timeouts
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Output size budget
    #[serde(default)]
    pub output: OutputConfig,

    /// Append-only audit trail of tool calls
    #[serde(default)]
    pub audit: AuditConfig,

    /// Duplicate handling for keyed listings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    /// Trusted SPARQL endpoint URL
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Deadline for calls to the trusted endpoint
    #[serde(default = "default_internal_timeout_ms")]
    pub internal_timeout_ms: u64,

    /// Deadline for calls to caller-supplied endpoints
    #[serde(default = "default_external_timeout_ms")]
    pub external_timeout_ms: u64,

    /// Prefix block injected into trusted queries (None = built-in block)
    #[serde(default)]
    pub prefixes: Option<String>,

    /// Largest response body read from a caller-supplied endpoint
    #[serde(default = "default_external_max_response_bytes")]
    pub external_max_response_bytes: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            internal_timeout_ms: default_internal_timeout_ms(),
            external_timeout_ms: default_external_timeout_ms(),
            prefixes: None,
            external_max_response_bytes: default_external_max_response_bytes(),
        }
    }
}

impl EndpointConfig {
    pub fn internal_timeout(&self) -> Duration {
        Duration::from_millis(self.internal_timeout_ms)
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }

    pub fn prefix_block(&self) -> &str {
        self.prefixes.as_deref().unwrap_or(DEFAULT_PREFIXES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Maximum characters of any serialized tool output
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_audit_path(),
        }
    }
}

/// Which row survives when the same natural key appears more than once
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Keep the longer value, first seen on ties
    #[default]
    PreferLongest,
    KeepFirst,
}

impl std::str::FromStr for DuplicateKeyPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "prefer_longest" | "longest" => Ok(DuplicateKeyPolicy::PreferLongest),
            "keep_first" | "first" => Ok(DuplicateKeyPolicy::KeepFirst),
            other => Err(ConfigError::ValidationError(format!(
                "Invalid duplicate policy: {}. Must be one of: prefer_longest, keep_first",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicateKeyPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_endpoint_url() -> String {
    "http://localhost:8890/sparql".to_string()
}
fn default_internal_timeout_ms() -> u64 {
    30_000
}
fn default_external_timeout_ms() -> u64 {
    10_000
} // Third-party hosts get a tighter bound
fn default_external_max_response_bytes() -> usize {
    16 * 1024 * 1024
}
fn default_max_chars() -> usize {
    50_000
}
fn default_true() -> bool {
    true
}
fn default_audit_path() -> PathBuf {
    PathBuf::from(".sparqlgate").join("audit.jsonl")
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration manager: env > config file > defaults
pub struct ConfigManager {
    config: SparqlGateConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.sparqlgate.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();
        let (config, config_path) = Self::load_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load from an explicit config file path (CLI `--config`)
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_dotenv();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    fn finish(config: SparqlGateConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        info!("Configuration loaded");
        match config_path {
            Some(ref path) => info!("   Config file: {}", path.display()),
            None => info!("   Config file: NONE (using defaults)"),
        }
        info!("   Endpoint: {}", config.endpoint.url);
        info!(
            "   Timeouts: internal={}ms external={}ms",
            config.endpoint.internal_timeout_ms, config.endpoint.external_timeout_ms
        );
        info!("   Output budget: {} chars", config.output.max_chars);

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".sparqlgate.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .sparqlgate.env: {}", e);
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.sparqlgate.toml
    /// 2. ~/.sparqlgate/config.toml
    /// 3. defaults
    fn load_config_file() -> Result<(SparqlGateConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".sparqlgate.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sparqlgate").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        info!("No config file found, using defaults");
        Ok((SparqlGateConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<SparqlGateConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(config: SparqlGateConfig) -> SparqlGateConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (env in production, a map in tests)
    fn apply_overrides<F>(mut config: SparqlGateConfig, lookup: F) -> SparqlGateConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SPARQLGATE_ENDPOINT") {
            config.endpoint.url = url;
        }
        if let Some(ms) = lookup("SPARQLGATE_INTERNAL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.endpoint.internal_timeout_ms = ms;
        }
        if let Some(ms) = lookup("SPARQLGATE_EXTERNAL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.endpoint.external_timeout_ms = ms;
        }
        if let Some(bytes) =
            lookup("SPARQLGATE_EXTERNAL_MAX_RESPONSE_BYTES").and_then(|v| v.parse().ok())
        {
            config.endpoint.external_max_response_bytes = bytes;
        }
        if let Some(chars) = lookup("SPARQLGATE_MAX_OUTPUT_CHARS").and_then(|v| v.parse().ok()) {
            config.output.max_chars = chars;
        }
        if let Some(path) = lookup("SPARQLGATE_AUDIT_PATH") {
            config.audit.path = PathBuf::from(path);
        }
        if let Some(enabled) = lookup("SPARQLGATE_AUDIT_ENABLED") {
            config.audit.enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }
        if let Some(policy) = lookup("SPARQLGATE_DUPLICATE_POLICY") {
            match policy.parse() {
                Ok(policy) => config.reconcile.duplicate_policy = policy,
                Err(e) => warn!("Ignoring SPARQLGATE_DUPLICATE_POLICY: {}", e),
            }
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    fn validate_config(config: &SparqlGateConfig) -> Result<(), ConfigError> {
        sanitize_uri(&config.endpoint.url).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid endpoint URL: {}", e))
        })?;

        if config.endpoint.internal_timeout_ms == 0 || config.endpoint.external_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        if config.endpoint.external_max_response_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "endpoint.external_max_response_bytes must be greater than zero".to_string(),
            ));
        }

        if config.output.max_chars < MIN_OUTPUT_CHARS {
            return Err(ConfigError::ValidationError(format!(
                "output.max_chars must be at least {}",
                MIN_OUTPUT_CHARS
            )));
        }

        Ok(())
    }

    pub fn config(&self) -> &SparqlGateConfig {
        &self.config
    }

    pub fn into_config(self) -> SparqlGateConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Render the resolved configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.config).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SparqlGateConfig::default();
        assert_eq!(config.output.max_chars, 50_000);
        assert!(config.endpoint.internal_timeout_ms > config.endpoint.external_timeout_ms);
        assert_eq!(config.reconcile.duplicate_policy, DuplicateKeyPolicy::PreferLongest);
        assert!(config.endpoint.prefix_block().contains("PREFIX skos:"));
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = SparqlGateConfig::default();
        bad.endpoint.url = "localhost:8890/sparql".to_string();
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = SparqlGateConfig::default();
        bad.endpoint.external_timeout_ms = 0;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = SparqlGateConfig::default();
        bad.output.max_chars = 10;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = SparqlGateConfig::default();
        bad.endpoint.external_max_response_bytes = 0;
        assert!(ConfigManager::validate_config(&bad).is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("SPARQLGATE_ENDPOINT", "https://query.example.org/sparql"),
            ("SPARQLGATE_EXTERNAL_TIMEOUT_MS", "2500"),
            ("SPARQLGATE_MAX_OUTPUT_CHARS", "not-a-number"),
            ("SPARQLGATE_AUDIT_ENABLED", "0"),
            ("SPARQLGATE_DUPLICATE_POLICY", "keep-first"),
            ("SPARQLGATE_EXTERNAL_MAX_RESPONSE_BYTES", "1048576"),
        ]
        .into_iter()
        .collect();

        let config = ConfigManager::apply_overrides(SparqlGateConfig::default(), |k| {
            env.get(k).map(|v| v.to_string())
        });

        assert_eq!(config.endpoint.url, "https://query.example.org/sparql");
        assert_eq!(config.endpoint.external_timeout_ms, 2500);
        assert_eq!(config.output.max_chars, 50_000);
        assert!(!config.audit.enabled);
        assert_eq!(config.reconcile.duplicate_policy, DuplicateKeyPolicy::KeepFirst);
        assert_eq!(config.endpoint.external_max_response_bytes, 1_048_576);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[endpoint]\nurl = \"https://data.example.org/sparql\"\n\n[reconcile]\nduplicate_policy = \"keep_first\""
        )
        .unwrap();

        let config = ConfigManager::read_toml_file(file.path()).unwrap();
        assert_eq!(config.endpoint.url, "https://data.example.org/sparql");
        assert_eq!(config.endpoint.internal_timeout_ms, 30_000);
        assert_eq!(config.endpoint.external_max_response_bytes, 16 * 1024 * 1024);
        assert_eq!(config.output.max_chars, 50_000);
        assert_eq!(config.reconcile.duplicate_policy, DuplicateKeyPolicy::KeepFirst);
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigManager::load_from(Path::new("/nonexistent/sparqlgate.toml"))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
