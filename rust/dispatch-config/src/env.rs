// dispatch-config: environment variable overrides layered on top of the
// YAML file (§6 "environment variables"), mirroring `knhk-config::env`'s
// override-after-parse approach.

use crate::config::Config;

/// Path to the YAML config file. Required — there is no implicit
/// default file location, matching spec.md §6.
pub const ENV_CONFIG_PATH: &str = "ADK_CONFIG";

/// Overrides `server.bind_address` when set, letting deployments pin
/// the listen address without editing the YAML file (e.g. container
/// orchestrators that inject `ADDR`).
pub const ENV_BIND_ADDRESS: &str = "ADDR";

pub fn apply_overrides(config: &mut Config) {
    if let Ok(addr) = std::env::var(ENV_BIND_ADDRESS) {
        if !addr.is_empty() {
            config.server.bind_address = addr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_env_var_overrides_bind_address() {
        std::env::set_var(ENV_BIND_ADDRESS, "127.0.0.1:9999");
        let mut config = Config::from_yaml_str("plugin_dir: ./plugins\n", "<test>").unwrap();
        apply_overrides(&mut config);
        assert_eq!(config.server.bind_address, "127.0.0.1:9999");
        std::env::remove_var(ENV_BIND_ADDRESS);
    }

    #[test]
    fn absent_env_var_leaves_file_value_untouched() {
        std::env::remove_var(ENV_BIND_ADDRESS);
        let mut config = Config::from_yaml_str(
            "server:\n  bind_address: \"0.0.0.0:1234\"\n",
            "<test>",
        )
        .unwrap();
        apply_overrides(&mut config);
        assert_eq!(config.server.bind_address, "0.0.0.0:1234");
    }
}
