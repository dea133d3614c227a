//! Configuration surface for the dispatch core: a YAML file located via
//! the `ADK_CONFIG` environment variable, with a small set of env var
//! overrides layered on top (§6).

mod config;
mod env;
mod error;

pub use config::{Config, ModelEndpointConfig, ModelPoolConfig, QueueConfig, ServerConfig};
pub use env::{apply_overrides, ENV_BIND_ADDRESS, ENV_CONFIG_PATH};
pub use error::ConfigError;

impl Config {
    /// Loads the YAML file named by `ADK_CONFIG`, applies environment
    /// overrides, validates the result, and returns it. This is the
    /// only entry point `dispatch-gateway::main` uses.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| "config.yaml".to_string());
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config = Config::from_yaml_str(&raw, &path)?;
        apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }
}
