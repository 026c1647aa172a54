//! # Engine Configuration
//!
//! Defaults with explicit environment-variable overrides. Malformed values
//! are a [`FlowsyncError::Configuration`], never silently ignored.

use chrono::{FixedOffset, NaiveDate, Utc};

use crate::error::{FlowsyncError, Result};
use crate::webhook::RelayQueueConfig;

/// Top-level configuration for the engine, web surface, and relay queue.
#[derive(Debug, Clone)]
pub struct FlowsyncConfig {
    /// Fixed operating timezone as a UTC offset in minutes. All calendar-day
    /// resolution ("today", range bounds) happens in this offset.
    pub operating_utc_offset_minutes: i32,
    /// Minimum delay between outbound calls to one source, used when the
    /// workflow definition does not override it.
    pub default_min_delay_ms: u64,
    /// Capacity of each broadcast channel in the event publisher.
    pub event_channel_capacity: usize,
    /// Bounded attempts for the terminal execution snapshot write.
    pub terminal_persist_attempts: u32,
    /// Webhook relay queue policy.
    pub relay: RelayQueueConfig,
    /// Bind address for the web API.
    pub bind_address: String,
    /// Postgres connection string; absent means in-memory stores.
    pub database_url: Option<String>,
}

impl Default for FlowsyncConfig {
    fn default() -> Self {
        Self {
            operating_utc_offset_minutes: 0,
            default_min_delay_ms: 250,
            event_channel_capacity: 1024,
            terminal_persist_attempts: 3,
            relay: RelayQueueConfig::default(),
            bind_address: "127.0.0.1:8085".to_string(),
            database_url: None,
        }
    }
}

impl FlowsyncConfig {
    /// Build configuration from defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(url);
        }

        if let Ok(bind) = std::env::var("FLOWSYNC_BIND_ADDRESS") {
            config.bind_address = bind;
        }

        if let Ok(offset) = std::env::var("FLOWSYNC_UTC_OFFSET_MINUTES") {
            config.operating_utc_offset_minutes = offset.parse().map_err(|e| {
                FlowsyncError::configuration(format!("invalid utc offset minutes: {e}"))
            })?;
        }

        if let Ok(delay) = std::env::var("FLOWSYNC_DEFAULT_MIN_DELAY_MS") {
            config.default_min_delay_ms = delay.parse().map_err(|e| {
                FlowsyncError::configuration(format!("invalid default min delay: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("FLOWSYNC_EVENT_CAPACITY") {
            config.event_channel_capacity = capacity.parse().map_err(|e| {
                FlowsyncError::configuration(format!("invalid event capacity: {e}"))
            })?;
        }

        if let Ok(attempts) = std::env::var("FLOWSYNC_TERMINAL_PERSIST_ATTEMPTS") {
            config.terminal_persist_attempts = attempts.parse().map_err(|e| {
                FlowsyncError::configuration(format!("invalid terminal persist attempts: {e}"))
            })?;
        }

        config.relay = RelayQueueConfig::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot drive a correct engine.
    pub fn validate(&self) -> Result<()> {
        self.operating_offset()?;
        if self.terminal_persist_attempts == 0 {
            return Err(FlowsyncError::configuration(
                "terminal_persist_attempts must be at least 1",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(FlowsyncError::configuration(
                "event_channel_capacity must be at least 1",
            ));
        }
        self.relay.validate()?;
        Ok(())
    }

    /// The fixed operating timezone.
    pub fn operating_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.operating_utc_offset_minutes * 60).ok_or_else(|| {
            FlowsyncError::configuration(format!(
                "utc offset out of range: {} minutes",
                self.operating_utc_offset_minutes
            ))
        })
    }

    /// The current calendar day in the operating timezone.
    pub fn today(&self) -> Result<NaiveDate> {
        Ok(Utc::now().with_timezone(&self.operating_offset()?).date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FlowsyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.operating_utc_offset_minutes, 0);
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let config = FlowsyncConfig {
            operating_utc_offset_minutes: 100_000,
            ..FlowsyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FlowsyncError::Configuration(_))
        ));
    }

    #[test]
    fn zero_persist_attempts_is_rejected() {
        let config = FlowsyncConfig {
            terminal_persist_attempts: 0,
            ..FlowsyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn today_respects_operating_offset() {
        // +14h and -12h bracket every real timezone; both must resolve.
        let east = FlowsyncConfig {
            operating_utc_offset_minutes: 14 * 60,
            ..FlowsyncConfig::default()
        };
        let west = FlowsyncConfig {
            operating_utc_offset_minutes: -12 * 60,
            ..FlowsyncConfig::default()
        };
        let east_today = east.today().unwrap();
        let west_today = west.today().unwrap();
        assert!(east_today >= west_today);
    }
}
