use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::fs;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub bitcoind: BitcoindConfig,
    /// Seconds between main-loop iterations.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ServerConfig {
    /// Network selector; decides address version bytes.
    pub network: String,
    /// Storage driver selector.
    pub storage: String,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct BitcoindConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn get_env_var(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

impl Config {
    /// Parse config
    ///
    /// # Errors
    /// * config file not exists
    /// * incorrect config
    pub fn new(file: &str) -> Result<Self> {
        let config_toml = fs::read_to_string(file).context("Failed to read config file")?;
        let mut config: Config =
            toml::from_str(&config_toml).context("Failed to parse config file")?;

        config.bitcoind.host = get_env_var("BITCOIND_HOST").unwrap_or(config.bitcoind.host);
        if let Some(port) = get_env_var("BITCOIND_PORT") {
            config.bitcoind.port = port.parse().context("Failed to parse BITCOIND_PORT")?;
        }
        config.bitcoind.user = get_env_var("BITCOIND_USER").unwrap_or(config.bitcoind.user);
        config.bitcoind.password =
            get_env_var("BITCOIND_PASSWORD").unwrap_or(config.bitcoind.password);

        Ok(config)
    }
}
