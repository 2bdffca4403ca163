//! Resolved monitor settings.

use std::time::Duration;

use crate::error::ConfigError;

/// Programs whose sound puts playback on hold unless configured otherwise.
pub const DEFAULT_PROCESS_NAMES: &[&str] = &["chrome.exe", "firefox.exe", "Telegram.exe"];
/// Playback device names tried when no device is active.
pub const DEFAULT_DEVICE_NAMES: &[&str] = &["SURFACE"];
pub const DEFAULT_SESSION_REFRESH_SECS: f64 = 5.0;
pub const DEFAULT_WARMUP_SECS: f64 = 2.0;

/// Settings consumed by the monitor loop.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    /// Process names whose audio sessions are watched (exact match).
    pub process_names: Vec<String>,
    /// Preferred playback device names, in order.
    pub device_names: Vec<String>,
    /// How often the session list is re-polled.
    pub session_refresh_interval: Duration,
    /// Delay between the end of foreground sound and resuming playback.
    pub warmup_duration: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            process_names: DEFAULT_PROCESS_NAMES.iter().map(|s| s.to_string()).collect(),
            device_names: DEFAULT_DEVICE_NAMES.iter().map(|s| s.to_string()).collect(),
            session_refresh_interval: Duration::from_secs_f64(DEFAULT_SESSION_REFRESH_SECS),
            warmup_duration: Duration::from_secs_f64(DEFAULT_WARMUP_SECS),
        }
    }
}

impl MonitorConfig {
    /// Build a config from second-based intervals, validating them.
    pub fn from_secs(
        process_names: Vec<String>,
        device_names: Vec<String>,
        session_refresh_secs: f64,
        warmup_secs: f64,
    ) -> Result<Self, ConfigError> {
        let process_names: Vec<String> = process_names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if process_names.is_empty() {
            return Err(ConfigError::NoProcessNames);
        }
        if !(session_refresh_secs.is_finite() && session_refresh_secs > 0.0) {
            return Err(ConfigError::InvalidInterval {
                name: "session refresh interval",
                bound: " > 0",
                value: session_refresh_secs,
            });
        }
        if !(warmup_secs.is_finite() && warmup_secs >= 0.0) {
            return Err(ConfigError::InvalidInterval {
                name: "warmup duration",
                bound: " >= 0",
                value: warmup_secs,
            });
        }
        let session_refresh_interval = secs(session_refresh_secs, "session refresh interval")?;
        let warmup_duration = secs(warmup_secs, "warmup duration")?;

        Ok(Self {
            process_names,
            device_names: device_names
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            session_refresh_interval,
            warmup_duration,
        })
    }
}

fn secs(value: f64, name: &'static str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidInterval {
        name,
        bound: "",
        value,
    })
}
