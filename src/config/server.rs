// src/config/server.rs
// Server, environment, and upstream inference configuration

use serde::{Deserialize, Serialize};

use super::{env_parsed, env_string};

/// Deployment environment. Affects log level, rate-limit strictness, and
/// whether error details are attached to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match env_string("ENVIRONMENT", "development").to_lowercase().as_str() {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn default_log_level(self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Staging => "info",
            Environment::Production => "info",
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: String,
    pub environment: Environment,
    pub log_level: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_string("LUMEN_HOST", "127.0.0.1"),
            port: env_parsed("LUMEN_PORT", 8900),
            data_dir: env_string("LUMEN_DATA_DIR", "./lumen_data"),
            environment: Environment::from_env(),
            log_level: std::env::var("LOG_LEVEL").ok(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Effective tracing filter: explicit LOG_LEVEL wins, otherwise the
    /// environment default.
    pub fn log_filter(&self) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| self.environment.default_log_level().to_string())
    }
}

/// Local inference server (Ollama-compatible, loopback only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub default_model: String,
    /// Per-request streaming timeout in seconds
    pub request_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_string("LUMEN_UPSTREAM_URL", "http://127.0.0.1:11434"),
            default_model: env_string("LUMEN_DEFAULT_MODEL", "llama3.2"),
            request_timeout_secs: env_parsed("LUMEN_UPSTREAM_TIMEOUT_SECS", 300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_defaults_to_development() {
        assert_eq!(Environment::Development.default_log_level(), "debug");
        assert!(!Environment::Development.is_production());
        assert!(Environment::Production.is_production());
    }
}
