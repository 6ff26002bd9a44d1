use std::{net::SocketAddr, time::Duration};

use crate::error::ConfigError;
use crate::registry::InstanceRegistry;

const DEFAULT_IDLE_MINUTES: u64 = 30;
const DEFAULT_POLL_SECONDS: u64 = 120;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub accept_invalid_certs: bool,
    pub token: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}/api/v2", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub registry: InstanceRegistry,
    pub auto_shutdown: bool,
    pub idle_threshold: Duration,
    pub poll_interval: Duration,
    pub allowed_origins: Vec<String>,
    pub notify_webhook_url: Option<String>,
    pub listen_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let servers = get("IDLEWATCH_SERVERS").ok_or(ConfigError::Missing("IDLEWATCH_SERVERS"))?;
        let registry = InstanceRegistry::parse(&servers)?;
        if registry.is_empty() {
            return Err(ConfigError::Invalid {
                var: "IDLEWATCH_SERVERS",
                reason: "no `name:id` entries".to_string(),
            });
        }

        let token = get("IDLEWATCH_API_TOKEN").ok_or(ConfigError::Missing("IDLEWATCH_API_TOKEN"))?;

        let port = match get("IDLEWATCH_API_PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "IDLEWATCH_API_PORT",
                reason: e.to_string(),
            })?,
            None => 8443,
        };

        let timeout_ms = parse_u64(get("IDLEWATCH_API_TIMEOUT_MS"), "IDLEWATCH_API_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .clamp(1000, 10 * 60_000);

        let api = ApiConfig {
            host: get("IDLEWATCH_API_HOST").unwrap_or_else(|| "localhost".to_string()),
            port,
            tls: parse_bool(get("IDLEWATCH_API_TLS"), "IDLEWATCH_API_TLS")?.unwrap_or(true),
            accept_invalid_certs: parse_bool(
                get("IDLEWATCH_API_INSECURE_TLS"),
                "IDLEWATCH_API_INSECURE_TLS",
            )?
            .unwrap_or(true),
            token,
            timeout: Duration::from_millis(timeout_ms),
        };

        let idle_minutes = parse_u64(get("IDLEWATCH_IDLE_MINUTES"), "IDLEWATCH_IDLE_MINUTES")?
            .unwrap_or(DEFAULT_IDLE_MINUTES);
        let poll_seconds = parse_u64(get("IDLEWATCH_POLL_SECONDS"), "IDLEWATCH_POLL_SECONDS")?
            .unwrap_or(DEFAULT_POLL_SECONDS);
        if idle_minutes == 0 {
            return Err(ConfigError::Invalid {
                var: "IDLEWATCH_IDLE_MINUTES",
                reason: "must be greater than zero".to_string(),
            });
        }
        if poll_seconds == 0 {
            return Err(ConfigError::Invalid {
                var: "IDLEWATCH_POLL_SECONDS",
                reason: "must be greater than zero".to_string(),
            });
        }
        let idle_threshold = idle_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::Invalid {
                var: "IDLEWATCH_IDLE_MINUTES",
                reason: format!("{idle_minutes} minutes is out of range"),
            })?;
        let poll_interval = Duration::from_secs(poll_seconds);
        if poll_interval >= idle_threshold {
            return Err(ConfigError::Inconsistent(format!(
                "poll interval ({poll_seconds}s) must be shorter than the idle threshold ({idle_minutes}min)"
            )));
        }

        let allowed_origins = get("IDLEWATCH_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let listen_addr = match get("IDLEWATCH_LISTEN_ADDR") {
            Some(v) => v.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                var: "IDLEWATCH_LISTEN_ADDR",
                reason: e.to_string(),
            })?,
            None => ([0, 0, 0, 0], 8080).into(),
        };

        Ok(Self {
            api,
            registry,
            auto_shutdown: parse_bool(get("IDLEWATCH_AUTO_SHUTDOWN"), "IDLEWATCH_AUTO_SHUTDOWN")?
                .unwrap_or(false),
            idle_threshold,
            poll_interval,
            allowed_origins,
            notify_webhook_url: get("IDLEWATCH_NOTIFY_WEBHOOK_URL"),
            listen_addr,
        })
    }

    pub fn idle_minutes(&self) -> u64 {
        self.idle_threshold.as_secs() / 60
    }

    /// Logs the effective configuration. The API token is never printed.
    pub fn log_summary(&self) {
        let servers: Vec<String> = self.registry.names().into_iter().map(|n| n.0).collect();
        tracing::info!(
            api = %self.api.base_url(),
            accept_invalid_certs = self.api.accept_invalid_certs,
            timeout_ms = self.api.timeout.as_millis() as u64,
            ?servers,
            "remote management API configured"
        );
        tracing::info!(
            allowed_origins = ?self.allowed_origins,
            webhook = self.notify_webhook_url.is_some(),
            "command surface configured"
        );
        if self.auto_shutdown {
            tracing::info!(
                idle_minutes = self.idle_minutes(),
                poll_seconds = self.poll_interval.as_secs(),
                "auto-shutdown enabled"
            );
        } else {
            tracing::info!("auto-shutdown disabled");
        }
    }
}

fn parse_bool(raw: Option<String>, var: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got {raw:?}"),
        }),
    }
}

fn parse_u64(raw: Option<String>, var: &'static str) -> Result<Option<u64>, ConfigError> {
    raw.map(|v| {
        v.parse::<u64>().map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        })
    })
    .transpose()
}
