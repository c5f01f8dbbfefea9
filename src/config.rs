// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Window before the scheduled start during which candidates may enter.
pub const EARLY_ENTRY_GATE_SECS: u64 = 5 * 60;
/// Fixed duration of every section.
pub const SECTION_DURATION_SECS: u64 = 25 * 60;
/// Cadence of the local answer snapshot.
pub const AUTOSAVE_INTERVAL_SECS: u64 = 5;
/// Countdown resolution.
pub const TICK_INTERVAL_MS: u64 = 1000;
pub const SUBMIT_RETRY_ATTEMPTS: u32 = 3;
pub const SUBMIT_RETRY_BASE_DELAY_MS: u64 = 1000;
/// Floors for the repeating timers; a zero period would never let time pass.
pub const MIN_AUTOSAVE_INTERVAL_SECS: u64 = 1;
pub const MIN_TICK_INTERVAL_MS: u64 = 1;

/// Attempt service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub early_entry_gate: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env_u64("JWT_EXPIRATION", 3600);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            early_entry_gate: Duration::from_secs(env_u64("EXAM_EARLY_ENTRY_SECS", EARLY_ENTRY_GATE_SECS)),
        }
    }
}

/// Timing knobs of the exam session controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub early_entry_gate: Duration,
    pub section_duration: Duration,
    pub autosave_interval: Duration,
    pub tick_interval: Duration,
    /// Total submit attempts, the first one included.
    pub submit_retry_attempts: u32,
    pub submit_retry_base_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            early_entry_gate: Duration::from_secs(EARLY_ENTRY_GATE_SECS),
            section_duration: Duration::from_secs(SECTION_DURATION_SECS),
            autosave_interval: Duration::from_secs(AUTOSAVE_INTERVAL_SECS),
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            submit_retry_attempts: SUBMIT_RETRY_ATTEMPTS,
            submit_retry_base_delay: Duration::from_millis(SUBMIT_RETRY_BASE_DELAY_MS),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `EXAM_*` environment variables.
    pub fn from_env() -> Self {
        dotenv().ok();

        let defaults = Self::default();
        Self {
            early_entry_gate: Duration::from_secs(env_u64("EXAM_EARLY_ENTRY_SECS", EARLY_ENTRY_GATE_SECS)),
            section_duration: Duration::from_secs(env_u64("EXAM_SECTION_SECS", SECTION_DURATION_SECS)),
            autosave_interval: Duration::from_secs(env_u64("EXAM_AUTOSAVE_SECS", AUTOSAVE_INTERVAL_SECS)),
            submit_retry_attempts: retry_count(env_u64("EXAM_SUBMIT_RETRIES", SUBMIT_RETRY_ATTEMPTS as u64)),
            ..defaults
        }
        .normalized()
    }

    /// Raises timer periods and the attempt count to their minimums.
    pub fn normalized(self) -> Self {
        let min_autosave = Duration::from_secs(MIN_AUTOSAVE_INTERVAL_SECS);
        let min_tick = Duration::from_millis(MIN_TICK_INTERVAL_MS);
        if self.autosave_interval < min_autosave {
            tracing::warn!("Autosave interval {:?} too short, using {:?}", self.autosave_interval, min_autosave);
        }
        Self {
            autosave_interval: self.autosave_interval.max(min_autosave),
            tick_interval: self.tick_interval.max(min_tick),
            submit_retry_attempts: self.submit_retry_attempts.max(1),
            ..self
        }
    }
}

fn retry_count(raw: u64) -> u32 {
    u32::try_from(raw)
        .unwrap_or_else(|_| {
            tracing::warn!("EXAM_SUBMIT_RETRIES={} is too large, using {}", raw, u32::MAX);
            u32::MAX
        })
        .max(1)
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.early_entry_gate, Duration::from_secs(300));
        assert_eq!(cfg.section_duration, Duration::from_secs(1500));
        assert_eq!(cfg.autosave_interval, Duration::from_secs(5));
        assert_eq!(cfg.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_normalized_clamps_zero_periods() {
        let cfg = SessionConfig {
            autosave_interval: Duration::ZERO,
            tick_interval: Duration::ZERO,
            submit_retry_attempts: 0,
            submit_retry_base_delay: Duration::ZERO,
            ..SessionConfig::default()
        }
        .normalized();
        assert_eq!(cfg.autosave_interval, Duration::from_secs(1));
        assert_eq!(cfg.tick_interval, Duration::from_millis(1));
        assert_eq!(cfg.submit_retry_attempts, 1);
        assert_eq!(cfg.submit_retry_base_delay, Duration::ZERO);
        assert_eq!(SessionConfig::default().normalized(), SessionConfig::default());
    }

    #[test]
    fn test_retry_count_saturates() {
        assert_eq!(retry_count(0), 1);
        assert_eq!(retry_count(3), 3);
        assert_eq!(retry_count(u64::from(u32::MAX) + 7), u32::MAX);
    }

    #[test]
    fn test_env_u64_falls_back() {
        assert_eq!(env_u64("EXAM_SESSION_TEST_UNSET_KEY", 42), 42);
    }
}
