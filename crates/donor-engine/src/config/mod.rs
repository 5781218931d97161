use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::campaign::ReminderLeadTime;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub campaign: CampaignConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let delivery_timeout_ms = env::var("APP_DELIVERY_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidDeliveryTimeout)?;

        let scheduler_tick_secs = env::var("APP_SCHEDULER_TICK_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidSchedulerTick)?;

        let reminder_leads = parse_reminder_leads(
            &env::var("APP_REMINDER_LEADS").unwrap_or_else(|_| "7d,3d,1d,2h".to_string()),
        )?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            campaign: CampaignConfig {
                delivery_timeout_ms,
                scheduler_tick_secs,
                reminder_leads,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Notification delivery and reminder scheduling.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    pub delivery_timeout_ms: u64,
    pub scheduler_tick_secs: u64,
    pub reminder_leads: Vec<ReminderLeadTime>,
}

impl CampaignConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_secs)
    }
}

const MAX_REMINDER_LEAD_DAYS: i64 = 366;

/// Parses a list such as `7d,3d,1d,2h` into reminder lead times.
///
/// Leads longer than a year are rejected.
pub fn parse_reminder_leads(raw: &str) -> Result<Vec<ReminderLeadTime>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = || ConfigError::InvalidReminderLead {
                value: entry.to_string(),
            };
            let (amount, unit) = match entry.char_indices().last() {
                Some((index, _)) => entry.split_at(index),
                None => return Err(invalid()),
            };
            let amount = amount
                .parse::<i64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(invalid)?;
            match unit {
                "d" | "D" if amount <= MAX_REMINDER_LEAD_DAYS => {
                    Ok(ReminderLeadTime::days(amount))
                }
                "h" | "H" if amount <= MAX_REMINDER_LEAD_DAYS * 24 => {
                    Ok(ReminderLeadTime::hours(amount))
                }
                _ => Err(invalid()),
            }
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDeliveryTimeout,
    InvalidSchedulerTick,
    InvalidReminderLead { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDeliveryTimeout => {
                write!(f, "APP_DELIVERY_TIMEOUT_MS must be a positive number of milliseconds")
            }
            ConfigError::InvalidSchedulerTick => {
                write!(f, "APP_SCHEDULER_TICK_SECS must be a positive number of seconds")
            }
            ConfigError::InvalidReminderLead { value } => write!(
                f,
                "APP_REMINDER_LEADS entry '{}' must look like 7d or 2h",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDeliveryTimeout
            | ConfigError::InvalidSchedulerTick
            | ConfigError::InvalidReminderLead { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::campaign::JobTrigger;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("APP_DELIVERY_TIMEOUT_MS");
        env::remove_var("APP_SCHEDULER_TICK_SECS");
        env::remove_var("APP_REMINDER_LEADS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.campaign.delivery_timeout(), Duration::from_millis(5000));
        assert_eq!(config.campaign.scheduler_tick(), Duration::from_secs(60));
        assert_eq!(config.campaign.reminder_leads, ReminderLeadTime::defaults());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn rejects_zero_delivery_timeout() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_DELIVERY_TIMEOUT_MS", "0");
        let error = AppConfig::load().expect_err("zero timeout rejected");
        assert!(matches!(error, ConfigError::InvalidDeliveryTimeout));
        reset_env();
    }

    #[test]
    fn parses_custom_reminder_leads() {
        let leads = parse_reminder_leads(" 5d, 6h ,").expect("leads parse");
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].lead, chrono::Duration::days(5));
        assert_eq!(
            leads[0].trigger,
            JobTrigger::Daily {
                hour: 10,
                minute: 30
            }
        );
        assert_eq!(leads[1].window, chrono::Duration::hours(1));
    }

    #[test]
    fn rejects_unknown_lead_unit() {
        let error = parse_reminder_leads("3w").expect_err("weeks are not supported");
        assert_eq!(error.to_string(), "APP_REMINDER_LEADS entry '3w' must look like 7d or 2h");
    }

    #[test]
    fn rejects_reminder_leads_longer_than_a_year() {
        for entry in ["367d", "100000000d", "200000000000d", "8785h", "9223372036854775807h"] {
            let error = parse_reminder_leads(entry).expect_err("oversized lead rejected");
            assert_eq!(
                error.to_string(),
                format!("APP_REMINDER_LEADS entry '{entry}' must look like 7d or 2h")
            );
        }
        let leads = parse_reminder_leads("366d,8784h").expect("a year is accepted");
        assert_eq!(leads[0].lead, chrono::Duration::days(366));
        assert_eq!(leads[1].lead, chrono::Duration::hours(8784));
    }
}
