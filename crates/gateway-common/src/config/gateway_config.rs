//! Gateway client configuration
//!
//! Loads configuration from environment variables, with an optional `.env` file.

use gateway_protocol::{
    ConnectionProperties, GatewayUrl, IdentifyPayload, Intents, ShardInfo, DEFAULT_API_VERSION,
};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Everything needed to open and identify a gateway session
#[derive(Clone)]
pub struct GatewayConfig {
    pub env: Environment,
    /// Bot token, never logged
    pub token: String,
    pub url: String,
    pub version: u8,
    pub intents: Intents,
    pub shard: Option<ShardInfo>,
    pub large_threshold: Option<u16>,
    pub compress: Option<bool>,
    pub properties: ConnectionProperties,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

// Default value functions
fn default_url() -> String {
    "wss://gateway.discord.gg".to_string()
}

fn default_version() -> u8 {
    DEFAULT_API_VERSION
}

fn default_intents() -> Intents {
    Intents::non_privileged()
}

fn default_os() -> String {
    env::consts::OS.to_string()
}

fn default_library() -> String {
    "gateway-client".to_string()
}

impl GatewayConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `GATEWAY_TOKEN` is missing or a variable fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("GATEWAY_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingVar("GATEWAY_TOKEN"))?;

        let intents = match parse_var::<u32, _>(&lookup, "GATEWAY_INTENTS")? {
            Some(bits) => Intents::validate(bits)
                .map_err(|err| ConfigError::InvalidValue("GATEWAY_INTENTS", err.to_string()))?,
            None => default_intents(),
        };

        let shard = match (
            parse_var::<u32, _>(&lookup, "GATEWAY_SHARD_ID")?,
            parse_var::<u32, _>(&lookup, "GATEWAY_SHARD_COUNT")?,
        ) {
            (Some(id), Some(count)) => Some(
                ShardInfo::new(id, count)
                    .map_err(|err| ConfigError::InvalidValue("GATEWAY_SHARD_ID", err.to_string()))?,
            ),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar("GATEWAY_SHARD_COUNT")),
            (None, Some(_)) => return Err(ConfigError::MissingVar("GATEWAY_SHARD_ID")),
        };

        let large_threshold = parse_var::<u16, _>(&lookup, "GATEWAY_LARGE_THRESHOLD")?;
        if let Some(threshold) = large_threshold {
            if !IdentifyPayload::LARGE_THRESHOLD_RANGE.contains(&threshold) {
                return Err(ConfigError::InvalidValue(
                    "GATEWAY_LARGE_THRESHOLD",
                    format!("{threshold} is outside 50..=250"),
                ));
            }
        }

        Ok(Self {
            env: lookup("APP_ENV")
                .and_then(|s| Environment::parse(&s))
                .unwrap_or_default(),
            token,
            url: lookup("GATEWAY_URL").unwrap_or_else(default_url),
            version: parse_var(&lookup, "GATEWAY_VERSION")?.unwrap_or_else(default_version),
            intents,
            shard,
            large_threshold,
            compress: parse_var(&lookup, "GATEWAY_COMPRESS")?,
            properties: ConnectionProperties::new(
                lookup("CLIENT_OS").unwrap_or_else(default_os),
                lookup("CLIENT_BROWSER").unwrap_or_else(default_library),
                lookup("CLIENT_DEVICE").unwrap_or_else(default_library),
            ),
        })
    }

    /// Connect URL with the configured protocol version
    #[must_use]
    pub fn gateway_url(&self) -> GatewayUrl {
        GatewayUrl::new(self.url.clone()).with_version(self.version)
    }

    /// Identify payload for a fresh session
    #[must_use]
    pub fn identify(&self) -> IdentifyPayload {
        let mut identify = IdentifyPayload::new(self.token.clone(), self.intents)
            .with_properties(self.properties.clone());
        identify.compress = self.compress;
        identify.large_threshold = self.large_threshold;
        identify.shard = self.shard;
        identify
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("env", &self.env)
            .field("token", &"[redacted]")
            .field("url", &self.url)
            .field("version", &self.version)
            .field("intents", &self.intents)
            .field("shard", &self.shard)
            .field("large_threshold", &self.large_threshold)
            .field("compress", &self.compress)
            .field("properties", &self.properties)
            .finish()
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| ConfigError::InvalidValue(key, format!("{raw:?}: {err}")))
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
