//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;

use cadence_core::domain::RetryPolicy;
use cadence_core::services::SweeperConfig;
use cadence_infra::JwtConfig;

#[cfg(feature = "postgres")]
use cadence_infra::DatabaseConfig;

use crate::background::SchedulerConfig;

/// Which publishing backend the sweeper talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherKind {
    Simulated,
    Http,
}

impl FromStr for PublisherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown publisher kind: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub kind: PublisherKind,
    pub url: Option<String>,
    pub timeout: Duration,
    pub latency: Duration,
    pub failure_rate: f64,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub scheduler: SchedulerConfig,
    pub sweeper: SweeperConfig,
    pub publisher: PublisherSettings,
}

/// Parse `key`, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring malformed environment variable");
            default
        }),
        Err(_) => default,
    }
}

const DEFAULT_LEASE_SECS: i64 = 300;
const MAX_LEASE_SECS: i64 = 24 * 60 * 60;

/// Claim lease from `SWEEP_LEASE_SECS`. Values outside `1..=MAX_LEASE_SECS`
/// fall back to the default.
fn lease_from_secs(secs: i64) -> TimeDelta {
    if !(1..=MAX_LEASE_SECS).contains(&secs) {
        tracing::warn!(
            value = secs,
            max = MAX_LEASE_SECS,
            default = DEFAULT_LEASE_SECS,
            "SWEEP_LEASE_SECS out of range, using default"
        );
        return TimeDelta::seconds(DEFAULT_LEASE_SECS);
    }
    TimeDelta::seconds(secs)
}

/// The sweeper renews its lease before every publish, so one publish call
/// has to fit inside a lease.
fn lease_covers_publish(lease: TimeDelta, publish_timeout: Duration) -> bool {
    TimeDelta::from_std(publish_timeout).is_ok_and(|timeout| lease > timeout)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        #[cfg(feature = "postgres")]
        let database = env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: env_or("DB_MAX_CONNECTIONS", 100),
            min_connections: env_or("DB_MIN_CONNECTIONS", 10),
        });

        let jwt_defaults = JwtConfig::default();
        let jwt = JwtConfig {
            secret: env::var("JWT_SECRET").unwrap_or(jwt_defaults.secret),
            expiration_hours: env_or("JWT_EXPIRATION_HOURS", jwt_defaults.expiration_hours),
            issuer: env::var("JWT_ISSUER").unwrap_or(jwt_defaults.issuer),
        };

        let scheduler = SchedulerConfig {
            enabled: env_flag("SCHEDULER_ENABLED", true),
            interval: Duration::from_secs(env_or("SCHEDULER_INTERVAL_SECS", 30)),
            idle_log_interval: Duration::from_secs(env_or("SCHEDULER_IDLE_LOG_SECS", 300)),
        };

        // 0 disables the attempt cap.
        let max_attempts = match env_or::<u32>("PUBLISH_MAX_ATTEMPTS", 5) {
            0 => None,
            n => Some(n),
        };
        let sweeper = SweeperConfig {
            batch_size: env_or("SWEEP_BATCH_SIZE", 100),
            lease: lease_from_secs(env_or("SWEEP_LEASE_SECS", DEFAULT_LEASE_SECS)),
            retry: RetryPolicy {
                max_attempts,
                backoff: TimeDelta::seconds(i64::from(env_or::<u32>(
                    "PUBLISH_RETRY_BACKOFF_SECS",
                    0,
                ))),
            },
        };

        let publisher = PublisherSettings {
            kind: env_or("PUBLISHER_KIND", PublisherKind::Simulated),
            url: env::var("PUBLISHER_URL").ok(),
            timeout: Duration::from_secs(env_or("PUBLISHER_TIMEOUT_SECS", 10)),
            latency: Duration::from_millis(env_or("PUBLISHER_LATENCY_MS", 200)),
            failure_rate: env_or("PUBLISHER_FAILURE_RATE", 0.05),
        };

        if !lease_covers_publish(sweeper.lease, publisher.timeout) {
            tracing::warn!(
                lease_secs = sweeper.lease.num_seconds(),
                timeout_secs = publisher.timeout.as_secs(),
                "SWEEP_LEASE_SECS does not exceed PUBLISHER_TIMEOUT_SECS, a slow publish can outlive its claim"
            );
        }

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_or("PORT", 8080),
            #[cfg(feature = "postgres")]
            database,
            jwt,
            scheduler,
            sweeper,
            publisher,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_kind_parse() {
        assert_eq!("HTTP".parse::<PublisherKind>().unwrap(), PublisherKind::Http);
        assert_eq!(
            "simulated".parse::<PublisherKind>().unwrap(),
            PublisherKind::Simulated
        );
        assert!("carrier-pigeon".parse::<PublisherKind>().is_err());
    }

    #[test]
    fn test_lease_out_of_range_uses_default() {
        let default = TimeDelta::seconds(DEFAULT_LEASE_SECS);
        assert_eq!(lease_from_secs(0), default);
        assert_eq!(lease_from_secs(-30), default);
        assert_eq!(lease_from_secs(i64::MAX), default);
        assert_eq!(lease_from_secs(MAX_LEASE_SECS + 1), default);
        assert_eq!(lease_from_secs(45), TimeDelta::seconds(45));
        assert_eq!(lease_from_secs(MAX_LEASE_SECS), TimeDelta::days(1));
    }

    #[test]
    fn test_lease_must_outlast_one_publish() {
        let timeout = Duration::from_secs(10);
        assert!(lease_covers_publish(TimeDelta::seconds(300), timeout));
        assert!(!lease_covers_publish(TimeDelta::seconds(10), timeout));
        assert!(!lease_covers_publish(TimeDelta::seconds(5), timeout));
    }

    #[test]
    fn test_env_or_falls_back_when_unset() {
        assert_eq!(env_or("CADENCE_TEST_SURELY_UNSET_VAR", 42u32), 42);
        assert!(env_flag("CADENCE_TEST_SURELY_UNSET_FLAG", true));
    }
}
