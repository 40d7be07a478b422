use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::exchange::client::{DEMO_URL, PRODUCTION_URL};
use crate::exchange::signer::Credentials;
use crate::rate_limiter::TokenBucket;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExchangeConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub demo: bool,
    /// Requests per second; unset means unpaced.
    pub rate_limit: Option<u32>,
}

impl ExchangeConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| env::var("KRAKEN_FUTURES_API_KEY").ok())
    }

    pub fn get_api_secret(&self) -> Option<String> {
        self.api_secret
            .clone()
            .or_else(|| env::var("KRAKEN_FUTURES_API_SECRET").ok())
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let key = self.get_api_key().ok_or_else(|| {
            ConfigError::Message(
                "exchange api_key not set (check config or KRAKEN_FUTURES_API_KEY)".to_string(),
            )
        })?;
        let secret = self.get_api_secret().ok_or_else(|| {
            ConfigError::Message(
                "exchange api_secret not set (check config or KRAKEN_FUTURES_API_SECRET)"
                    .to_string(),
            )
        })?;
        Ok(Credentials::new(key, secret))
    }

    /// Request pacing; unset or zero means unpaced.
    pub fn rate_limiter(&self) -> Option<TokenBucket> {
        match self.rate_limit {
            Some(per_sec) if per_sec > 0 => Some(TokenBucket::new(per_sec as usize, per_sec as f64)),
            _ => None,
        }
    }

    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None if self.demo => DEMO_URL.to_string(),
            None => PRODUCTION_URL.to_string(),
        }
    }
}

fn default_symbol() -> String {
    "PF_XBTUSD".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Port of the read-only status API; unset disables it.
    pub port: Option<u16>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval_secs: default_interval_secs(),
            port: None,
        }
    }
}

impl AgentConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_decision_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DecisionConfig {
    #[serde(default = "default_decision_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    pub temperature: Option<f32>,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            base_url: default_decision_url(),
            api_key: None,
            model: default_model(),
            temperature: None,
        }
    }
}

impl DecisionConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| env::var("OPENAI_API_KEY").ok())
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let home = env::var("HOME").unwrap_or_else(|_| ".".into());

        let s = Config::builder()
            // 1. Global config from ~/.kraken-agent/config.{toml,json,ini}
            .add_source(File::with_name(&format!("{}/.kraken-agent/config", home)).required(false))
            // 2. Project config
            .add_source(File::with_name("config/config").required(false))
            // 3. Local overrides (not checked in)
            .add_source(File::with_name("config/local").required(false))
            // 4. Environment, e.g. AGENT__EXCHANGE__API_KEY
            .add_source(Environment::with_prefix("AGENT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
