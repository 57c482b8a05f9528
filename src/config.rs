//! Service configuration loaded from environment variables.
//!
//! Every variable is optional:
//! - `DATABASE_URL` - `PostgreSQL` connection string; unset runs on the in-memory store
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8000)
//! - `TOKEN_SECRET` - Bearer token signing key; unset generates one per process
//! - `TOKEN_TTL_MINUTES` - Token lifetime (default: 30)
//! - `CHAT_API_KEY` (or `DEEPSEEK_API_KEY`) - Completion API key; unset disables chat
//! - `CHAT_API_URL` - Completion endpoint (default: DeepSeek chat completions)
//! - `CHAT_MODEL` - Model name (default: deepseek-chat)
//! - `UPLOAD_DIR` - Image root (default: uploads)
//! - `INITIAL_BALANCE` - Balance credited to new accounts (default: 10000000)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use crate::domain::value_objects::Money;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TOKEN_TTL_MINUTES: u32 = 30;
const DEFAULT_CHAT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEFAULT_CHAT_MODEL: &str = "deepseek-chat";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_INITIAL_BALANCE: i64 = 10_000_000;
const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<SecretString>,
    pub host: IpAddr,
    pub port: u16,
    pub token_secret: SecretString,
    /// `true` when `TOKEN_SECRET` was unset; tokens die with the process.
    pub token_secret_generated: bool,
    pub token_ttl: chrono::Duration,
    pub chat: ChatConfig,
    pub upload_dir: PathBuf,
    pub initial_balance: Money,
}

/// Completion API settings. No key means the chat endpoint answers with a
/// fixed apology instead of calling out.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<SecretString>,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let host = match get("HOST") {
            Some(v) => v.parse::<IpAddr>().map_err(|e| invalid("HOST", e))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| invalid("PORT", e))?,
            None => DEFAULT_PORT,
        };
        let ttl_minutes = match get("TOKEN_TTL_MINUTES") {
            Some(v) => v.parse::<u32>().map_err(|e| invalid("TOKEN_TTL_MINUTES", e))?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        if ttl_minutes == 0 {
            return Err(invalid("TOKEN_TTL_MINUTES", "must be at least 1"));
        }
        let initial_balance = match get("INITIAL_BALANCE") {
            Some(v) => {
                let amount = v.parse::<Decimal>().map_err(|e| invalid("INITIAL_BALANCE", e))?;
                Money::new(amount).map_err(|e| invalid("INITIAL_BALANCE", e))?
            }
            None => Money::new(Decimal::from(DEFAULT_INITIAL_BALANCE)).map_err(|e| invalid("INITIAL_BALANCE", e))?,
        };

        let (token_secret, token_secret_generated) = match get("TOKEN_SECRET") {
            Some(secret) => (SecretString::from(secret), false),
            None => (random_secret(), true),
        };

        Ok(Self {
            database_url: get("DATABASE_URL").map(SecretString::from),
            host,
            port,
            token_secret,
            token_secret_generated,
            token_ttl: chrono::Duration::minutes(i64::from(ttl_minutes)),
            chat: ChatConfig {
                api_key: get("CHAT_API_KEY").or_else(|| get("DEEPSEEK_API_KEY")).map(SecretString::from),
                api_url: get("CHAT_API_URL").unwrap_or_else(|| DEFAULT_CHAT_API_URL.to_owned()),
                model: get("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
                timeout: CHAT_TIMEOUT,
            },
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_owned())),
            initial_balance,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn invalid(key: &str, detail: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_owned(), detail.to_string())
}

fn random_secret() -> SecretString {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    SecretString::from(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(cfg.token_ttl, chrono::Duration::minutes(30));
        assert!(cfg.token_secret_generated);
        assert!(cfg.chat.api_key.is_none());
        assert_eq!(cfg.chat.model, "deepseek-chat");
        assert_eq!(cfg.upload_dir, PathBuf::from("uploads"));
        assert_eq!(cfg.initial_balance.amount(), Decimal::from(10_000_000));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("TOKEN_SECRET", "s3cr3t-value"),
            ("TOKEN_TTL_MINUTES", "5"),
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("INITIAL_BALANCE", "100.50"),
        ])
        .unwrap();
        assert_eq!(cfg.socket_addr().to_string(), "127.0.0.1:9000");
        assert!(!cfg.token_secret_generated);
        assert_eq!(cfg.token_secret.expose_secret(), "s3cr3t-value");
        assert_eq!(cfg.token_ttl, chrono::Duration::minutes(5));
        assert_eq!(cfg.chat.api_key.as_ref().map(|k| k.expose_secret().to_owned()), Some("sk-test".to_owned()));
        assert_eq!(cfg.initial_balance.amount(), Decimal::new(1005, 1));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let cfg = config(&[("DATABASE_URL", "  "), ("CHAT_API_KEY", "")]).unwrap();
        assert!(cfg.database_url.is_none());
        assert!(cfg.chat.api_key.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(ConfigError::InvalidEnvVar(k, _)) if k == "PORT"));
        assert!(config(&[("INITIAL_BALANCE", "-1")]).is_err());
        assert!(config(&[("TOKEN_TTL_MINUTES", "0")]).is_err());
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = config(&[]).unwrap();
        let b = config(&[]).unwrap();
        assert_ne!(a.token_secret.expose_secret(), b.token_secret.expose_secret());
    }
}
