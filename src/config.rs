//! Application configuration from environment variables.
//!
//! Field names map to upper-cased environment variables
//! (`server_port` → `SERVER_PORT`). An optional `.env` file is loaded
//! first; every field has a sensible local default.

use serde::Deserialize;

use crate::bus::QueueOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_topic")]
    pub topic_name: String,
    #[serde(default = "default_payment_queue")]
    pub payment_queue: String,
    #[serde(default = "default_wallet_queue")]
    pub wallet_queue: String,
    #[serde(default = "default_gateway_queue")]
    pub external_gateway_queue: String,

    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,

    /// How the simulated gateway answers: `succeed`, `reject`, `timeout`.
    #[serde(default = "default_gateway_mode")]
    pub gateway_mode: String,
}

fn default_port() -> u16 {
    3000
}

fn default_topic() -> String {
    "payment-events".to_string()
}

fn default_payment_queue() -> String {
    "payment-service-queue".to_string()
}

fn default_wallet_queue() -> String {
    "wallet-service-queue".to_string()
}

fn default_gateway_queue() -> String {
    "external-gateway-queue".to_string()
}

fn default_visibility_timeout() -> u64 {
    30
}

fn default_max_receive_count() -> u32 {
    3
}

fn default_gateway_mode() -> String {
    "succeed".to_string()
}

impl Config {
    /// Load configuration from environment variables, reading an
    /// optional `.env` file first.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            visibility_timeout: std::time::Duration::from_secs(self.visibility_timeout_secs),
            max_receive_count: self.max_receive_count,
            ..QueueOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let config: Config = envy::from_iter(std::iter::empty::<(String, String)>()).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.topic_name, "payment-events");
        assert_eq!(config.max_receive_count, 3);
        assert_eq!(config.visibility_timeout_secs, 30);
        assert_eq!(config.gateway_mode, "succeed");
    }

    #[test]
    fn overrides_from_iter() {
        let vars = vec![
            ("SERVER_PORT".to_string(), "8080".to_string()),
            ("GATEWAY_MODE".to_string(), "reject".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.gateway_mode, "reject");
    }
}
