// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use config::{Config as ConfigFile, File, Environment};

/// Seconds after which an unresolved SOS session is closed by the system
pub const SOS_AUTO_RESOLVE_SECS: u64 = 30;

/// Central configuration for the realtime service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub realtime_server_addr: String,
    pub sos: SosConfig,
    pub mail: MailConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SosConfig {
    /// How long resolved records are kept after their end time
    pub resolved_retention_secs: u64,
    pub sweep_interval_secs: u64,
    /// Upper bound on the emergency dispatch call
    pub dispatch_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MailConfig {
    /// HTTP mail relay endpoint; mail is disabled when unset
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
    /// Off-system contact that receives every emergency alert
    pub recipient: String,
    pub timeout_secs: u64,
}

impl Default for SosConfig {
    fn default() -> Self {
        Self {
            resolved_retention_secs: 3600,
            sweep_interval_secs: 60,
            dispatch_timeout_secs: 10,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            api_key: None,
            from: "alerts@raahi.local".to_string(),
            recipient: "emergency-contact@raahi.local".to_string(),
            timeout_secs: 8,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            realtime_server_addr: "127.0.0.1:8080".to_string(),
            sos: SosConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let defaults = Self::default();

        let config = ConfigFile::builder()
            .set_default("realtime_server_addr", defaults.realtime_server_addr)?
            .set_default("sos.resolved_retention_secs", defaults.sos.resolved_retention_secs)?
            .set_default("sos.sweep_interval_secs", defaults.sos.sweep_interval_secs)?
            .set_default("sos.dispatch_timeout_secs", defaults.sos.dispatch_timeout_secs)?
            .set_default("mail.from", defaults.mail.from)?
            .set_default("mail.recipient", defaults.mail.recipient)?
            .set_default("mail.timeout_secs", defaults.mail.timeout_secs)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP_MAIL__RELAY_URL
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");
                Self::from_plain_env()
            }
        }
    }

    fn from_plain_env() -> Self {
        let defaults = Self::default();

        Self {
            realtime_server_addr: env::var("REALTIME_SERVER_ADDR")
                .unwrap_or(defaults.realtime_server_addr),
            sos: SosConfig {
                resolved_retention_secs: parse_env("SOS_RETENTION_SECS")
                    .unwrap_or(defaults.sos.resolved_retention_secs),
                sweep_interval_secs: parse_env("SOS_SWEEP_INTERVAL_SECS")
                    .unwrap_or(defaults.sos.sweep_interval_secs),
                dispatch_timeout_secs: parse_env("DISPATCH_TIMEOUT_SECS")
                    .unwrap_or(defaults.sos.dispatch_timeout_secs),
            },
            mail: MailConfig {
                relay_url: env::var("MAIL_RELAY_URL").ok().filter(|v| !v.is_empty()),
                api_key: env::var("MAIL_API_KEY").ok().filter(|v| !v.is_empty()),
                from: env::var("MAIL_FROM").unwrap_or(defaults.mail.from),
                recipient: env::var("MAIL_RECIPIENT").unwrap_or(defaults.mail.recipient),
                timeout_secs: parse_env("MAIL_TIMEOUT_SECS")
                    .unwrap_or(defaults.mail.timeout_secs),
            },
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value: {}, using default", key, raw);
            None
        }
    }
}
