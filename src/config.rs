//! Engine configuration.
//!
//! Everything has a documented default, so an empty environment yields a
//! working stub-free setup pointed at a local Infinity server. Sources are
//! layered, later ones winning:
//!
//! 1. built-in defaults
//! 2. optional `mmembed.{toml,yaml,json}` in the working directory (or an explicit file)
//! 3. `MMEMBED__<SECTION>__<KEY>` environment variables
//! 4. legacy deployment variables:
//!    `HTTP_CLIENT_USER_AGENT`, `HTTP_CLIENT_TIMEOUT`, `HTTP_CLIENT_MAX_CONNECTIONS`,
//!    `HTTP_CLIENT_MAX_KEEPALIVE_CONNECTIONS`, `INFINITY_HOST`, `INFINITY_PORT`,
//!    `MODEL_NAME`, `MODEL_NAMES` (`;`-separated)
//!
//! ## Example TOML
//!
//! ```toml
//! [http]
//! timeout_secs = 5.0
//! max_connections = 16
//!
//! [backend]
//! kind = "infinity"
//! base_url = "http://127.0.0.1:7997"
//! models = ["patrickjohncyh/fashion-clip", "BAAI/bge-small-en-v1.5"]
//!
//! [server]
//! port = 8000
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::retry::RetryConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_MAX_CONNECTIONS: usize = 50;
pub const DEFAULT_MAX_KEEPALIVE_CONNECTIONS: usize = 20;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_MODEL: &str = "patrickjohncyh/fashion-clip";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("environment variable {key} must be {expected}, got {value:?}")]
    InvalidEnv {
        key: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("validation error: {0}")]
    Validation(String),
}

/// Settings for the pooled HTTP client used to download image URLs.
/// Fixed once the pool is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpPoolConfig {
    /// Descriptive client identifier sent as `User-Agent`.
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: f64,
    /// Upper bound on concurrent in-flight downloads.
    pub max_connections: usize,
    /// Idle keep-alive connections retained per host.
    pub max_keepalive_connections: usize,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_keepalive_connections: DEFAULT_MAX_KEEPALIVE_CONNECTIONS,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl HttpPoolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(ConfigError::Validation(format!(
                "http.timeout_secs must be a positive number, got {}",
                self.timeout_secs
            )));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "http.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Which embedding backend adapter to build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible `/embeddings` endpoint (Infinity, TEI, vLLM...).
    Infinity,
    /// Deterministic in-process vectors. For tests and local smoke runs.
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL; requests go to `<base_url>/embeddings`.
    pub base_url: String,
    /// Models the backend serves. Empty means "accept any model name".
    pub models: Vec<String>,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Timeout for one backend request.
    pub timeout_secs: u64,
    pub retry: RetryConfig,
    /// Vector width produced by the stub backend.
    pub stub_dimensions: usize,
    /// Make the stub reject images, like a text-only model would.
    pub stub_text_only: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Infinity,
            base_url: "http://0.0.0.0:7997".to_string(),
            models: vec![DEFAULT_MODEL.to_string()],
            default_model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            retry: RetryConfig::default(),
            stub_dimensions: 512,
            stub_text_only: false,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "backend.default_model must not be empty".into(),
            ));
        }
        if self.kind == BackendKind::Stub && self.stub_dimensions == 0 {
            return Err(ConfigError::Validation(
                "backend.stub_dimensions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Outer request timeout, independent from the pool and backend timeouts.
    pub timeout_secs: u64,
    pub max_body_size_mb: usize,
    pub log_level: String,
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            timeout_secs: 300,
            max_body_size_mb: 32,
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|e| ConfigError::Validation(format!("invalid bind address: {e}")))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub http: HttpPoolConfig,
    pub backend: BackendConfig,
    pub server: ServerConfig,
}

impl EngineConfig {
    /// Load from `.env`, the optional `mmembed.*` file, and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let builder = config::Config::builder()
            .add_source(config::File::with_name("mmembed").required(false))
            .add_source(config::Environment::with_prefix("MMEMBED").separator("__"));
        Self::finish(builder, |key| std::env::var(key).ok())
    }

    /// Load from an explicit file plus the process environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("MMEMBED").separator("__"));
        Self::finish(builder, |key| std::env::var(key).ok())
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut cfg: EngineConfig = builder.build()?.try_deserialize()?;
        cfg.apply_env_overrides(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply the legacy deployment variables on top of the loaded values.
    /// `lookup` abstracts the environment so this is testable without touching the process.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(ua) = get("HTTP_CLIENT_USER_AGENT") {
            self.http.user_agent = ua;
        }
        if let Some(raw) = get("HTTP_CLIENT_TIMEOUT") {
            self.http.timeout_secs = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "HTTP_CLIENT_TIMEOUT",
                expected: "a float",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get("HTTP_CLIENT_MAX_CONNECTIONS") {
            self.http.max_connections = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "HTTP_CLIENT_MAX_CONNECTIONS",
                expected: "an integer",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get("HTTP_CLIENT_MAX_KEEPALIVE_CONNECTIONS") {
            self.http.max_keepalive_connections =
                raw.parse().map_err(|_| ConfigError::InvalidEnv {
                    key: "HTTP_CLIENT_MAX_KEEPALIVE_CONNECTIONS",
                    expected: "an integer",
                    value: raw.clone(),
                })?;
        }

        let host = get("INFINITY_HOST");
        let port = get("INFINITY_PORT");
        if host.is_some() || port.is_some() {
            let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
            let port = port.unwrap_or_else(|| "7997".to_string());
            self.backend.base_url = format!("http://{host}:{port}");
        }

        if let Some(names) = get("MODEL_NAMES") {
            let models: Vec<String> = names
                .split(';')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if let Some(first) = models.first() {
                self.backend.default_model = first.clone();
            }
            self.backend.models = models;
        }
        if let Some(model) = get("MODEL_NAME") {
            if !self.backend.models.contains(&model) {
                self.backend.models.push(model.clone());
            }
            self.backend.default_model = model;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate()?;
        self.backend.validate()?;
        Ok(())
    }
}
