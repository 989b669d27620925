//! Configuration module for the ArkABA backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Configuration could not be parsed.
#[derive(Debug, Error)]
#[error("invalid value for {key}: {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Stripe credentials. Absent means paid flows are disabled.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

/// Outgoing mail settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// HTTP relay endpoint; when unset mail is only logged
    pub relay_url: Option<String>,
    pub from: String,
    /// Recipient of contact-form submissions
    pub admin_email: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding /api/admin (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    pub stripe: StripeConfig,
    pub mail: MailConfig,
    /// ISO currency code used for every price
    pub currency: String,
    /// Days added to a membership per paid term
    pub membership_term_days: i64,
    /// Minutes an unpaid registration keeps its seat
    pub registration_hold_minutes: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            api_psk: optional("ARKABA_API_PSK"),
            db_path: string_or("ARKABA_DB_PATH", "./data/arkaba.sqlite").into(),
            index_path: string_or("ARKABA_INDEX_PATH", "./data/index").into(),
            bind_addr: parse_or("ARKABA_BIND_ADDR", "127.0.0.1:8080")?,
            log_level: string_or("ARKABA_LOG_LEVEL", "info"),
            log_format: parse_or("ARKABA_LOG_FORMAT", "pretty")?,
            stripe: StripeConfig {
                secret_key: optional("ARKABA_STRIPE_SECRET_KEY"),
                webhook_secret: optional("ARKABA_STRIPE_WEBHOOK_SECRET"),
                api_base: string_or("ARKABA_STRIPE_API_BASE", "https://api.stripe.com"),
            },
            mail: MailConfig {
                relay_url: optional("ARKABA_MAIL_RELAY_URL"),
                from: string_or("ARKABA_MAIL_FROM", "ArkABA <no-reply@arkaba.org>"),
                admin_email: string_or("ARKABA_ADMIN_EMAIL", "admin@arkaba.org"),
            },
            currency: string_or("ARKABA_CURRENCY", "usd").to_ascii_lowercase(),
            membership_term_days: positive("ARKABA_MEMBERSHIP_TERM_DAYS", "365")?,
            registration_hold_minutes: positive("ARKABA_REGISTRATION_HOLD_MINUTES", "30")?,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn string_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    string_or(key, default).parse().map_err(|e: T::Err| ConfigError {
        key,
        message: e.to_string(),
    })
}

fn positive(key: &'static str, default: &str) -> Result<i64, ConfigError> {
    let value: i64 = parse_or(key, default)?;
    if value <= 0 {
        return Err(ConfigError {
            key,
            message: format!("must be positive, got {}", value),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global; keep every env-mutating assertion in one test.
    #[test]
    fn test_config_from_env() {
        for key in [
            "ARKABA_API_PSK",
            "ARKABA_DB_PATH",
            "ARKABA_INDEX_PATH",
            "ARKABA_BIND_ADDR",
            "ARKABA_LOG_LEVEL",
            "ARKABA_LOG_FORMAT",
            "ARKABA_STRIPE_SECRET_KEY",
            "ARKABA_STRIPE_WEBHOOK_SECRET",
            "ARKABA_STRIPE_API_BASE",
            "ARKABA_CURRENCY",
            "ARKABA_MAIL_RELAY_URL",
            "ARKABA_MEMBERSHIP_TERM_DAYS",
            "ARKABA_REGISTRATION_HOLD_MINUTES",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();
        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/arkaba.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.stripe.secret_key.is_none());
        assert_eq!(config.stripe.api_base, "https://api.stripe.com");
        assert_eq!(config.currency, "usd");
        assert_eq!(config.membership_term_days, 365);
        assert_eq!(config.registration_hold_minutes, 30);

        env::set_var("ARKABA_BIND_ADDR", "not-an-address");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.key, "ARKABA_BIND_ADDR");
        env::remove_var("ARKABA_BIND_ADDR");

        env::set_var("ARKABA_MEMBERSHIP_TERM_DAYS", "0");
        let err = Config::from_env().unwrap_err();
        assert_eq!(err.key, "ARKABA_MEMBERSHIP_TERM_DAYS");
        env::remove_var("ARKABA_MEMBERSHIP_TERM_DAYS");

        env::set_var("ARKABA_CURRENCY", "EUR");
        env::set_var("ARKABA_LOG_FORMAT", "json");
        let config = Config::from_env().unwrap();
        assert_eq!(config.currency, "eur");
        assert_eq!(config.log_format, LogFormat::Json);
        env::remove_var("ARKABA_CURRENCY");
        env::remove_var("ARKABA_LOG_FORMAT");
    }
}
