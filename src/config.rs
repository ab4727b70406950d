use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the account store. Without it the
    /// server runs on the in-memory store (development only).
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub fx: FxConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FxConfig {
    /// Preferred provider, tried before the public fallbacks.
    #[serde(default)]
    pub provider_url: Option<String>,
    #[serde(default = "default_fx_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_fx_fallback")]
    pub fallback_rate: Decimal,
}

fn default_fx_ttl() -> u64 {
    300
}

fn default_fx_fallback() -> Decimal {
    Decimal::from(20)
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            provider_url: None,
            ttl_secs: default_fx_ttl(),
            fallback_rate: default_fx_fallback(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
