// dispatch-config: the YAML configuration surface (§6), grounded on
// `knhk-config`'s layered "defaults -> file -> env" shape, adapted from
// TOML to YAML per the wire contract.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

fn default_plugin_dir() -> String {
    "./plugins".to_string()
}

fn default_flow() -> String {
    "echo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_workers() -> usize {
    8
}

fn default_queue_size() -> usize {
    64
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_timeout_secs() -> u64 {
    120
}

fn default_queue_impl() -> String {
    "in-process".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,
    #[serde(default = "default_flow")]
    pub default_flow: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dev: bool,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub model_api_pools: HashMap<String, ModelPoolConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            workers: default_workers(),
            queue_size: default_queue_size(),
            default_timeout_secs: default_timeout_secs(),
            max_timeout_secs: default_max_timeout_secs(),
        }
    }
}

/// Reserved for future external queue backends (§6) — only `in-process`
/// is implemented today; `addr`/`stream` are parsed and stored but
/// otherwise unused.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(rename = "impl", default = "default_queue_impl")]
    pub impl_name: String,
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub stream: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            impl_name: default_queue_impl(),
            addr: String::new(),
            stream: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelPoolConfig {
    pub base: String,
    pub endpoints: Vec<ModelEndpointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEndpointConfig {
    pub url: String,
    pub apikey: String,
}

impl Config {
    pub(crate) fn from_yaml_str(raw: &str, path: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Checks the constraints spec.md leaves implicit in the schema
    /// but that every deployment must satisfy to behave sanely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid("server.workers must be >= 1".into()));
        }
        if self.server.queue_size == 0 {
            return Err(ConfigError::Invalid(
                "server.queue_size must be >= 1".into(),
            ));
        }
        if self.server.default_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.default_timeout_secs must be >= 1".into(),
            ));
        }
        if self.server.default_timeout_secs > self.server.max_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "server.default_timeout_secs ({}) exceeds server.max_timeout_secs ({})",
                self.server.default_timeout_secs, self.server.max_timeout_secs
            )));
        }
        for (name, pool) in &self.model_api_pools {
            if pool.endpoints.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "model pool '{name}' has no endpoints configured"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_are_absent() {
        let config = Config::from_yaml_str("plugin_dir: ./plugins\n", "<test>").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.workers, 8);
        assert_eq!(config.queue.impl_name, "in-process");
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = Config::from_yaml_str("plugin_dir: ./plugins\n", "<test>").unwrap();
        config.server.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_default_timeout_above_max() {
        let mut config = Config::from_yaml_str("plugin_dir: ./plugins\n", "<test>").unwrap();
        config.server.default_timeout_secs = 200;
        config.server.max_timeout_secs = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_model_pool_with_no_endpoints() {
        let raw = r#"
model_api_pools:
  default:
    base: openai
    endpoints: []
"#;
        let config = Config::from_yaml_str(raw, "<test>").unwrap();
        assert!(config.validate().is_err());
    }
}
