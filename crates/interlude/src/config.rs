//! Configuration loading and merging.
//!
//! Values come from CLI flags, then the optional TOML file, then built-in
//! defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use interlude_core::MonitorConfig;
use interlude_core::config::{
    DEFAULT_DEVICE_NAMES, DEFAULT_PROCESS_NAMES, DEFAULT_SESSION_REFRESH_SECS, DEFAULT_WARMUP_SECS,
};

use crate::cli::RunArgs;

/// Config file schema.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Process names whose sessions are watched.
    pub process_names: Option<Vec<String>>,
    /// Preferred Spotify device names.
    pub device_names: Option<Vec<String>>,
    /// Seconds between session scans.
    pub session_refresh_interval: Option<f64>,
    /// Seconds to wait before resuming.
    pub warmup_duration: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<FileConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Merge CLI options over the config file and defaults, then validate.
pub fn resolve(args: &RunArgs, file: Option<&FileConfig>) -> Result<MonitorConfig> {
    let process_names = non_empty(args.process_names.clone())
        .or_else(|| file.and_then(|f| f.process_names.clone()))
        .unwrap_or_else(|| defaults(DEFAULT_PROCESS_NAMES));
    let device_names = non_empty(args.device_names.clone())
        .or_else(|| file.and_then(|f| f.device_names.clone()))
        .unwrap_or_else(|| defaults(DEFAULT_DEVICE_NAMES));
    let session_refresh = args
        .session_refresh_interval
        .or_else(|| file.and_then(|f| f.session_refresh_interval))
        .unwrap_or(DEFAULT_SESSION_REFRESH_SECS);
    let warmup = args
        .warmup_duration
        .or_else(|| file.and_then(|f| f.warmup_duration))
        .unwrap_or(DEFAULT_WARMUP_SECS);

    MonitorConfig::from_secs(process_names, device_names, session_refresh, warmup)
        .context("invalid configuration")
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() { None } else { Some(values) }
}

fn defaults(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn file(raw: &str) -> FileConfig {
        toml::from_str(raw).unwrap()
    }

    #[test]
    fn empty_inputs_resolve_to_defaults() {
        let cfg = resolve(&RunArgs::default(), None).unwrap();
        assert_eq!(cfg, MonitorConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let f = file(
            r#"
            process_names = ["zoom.exe", "Teams.exe"]
            warmup_duration = 0.5
            "#,
        );
        let cfg = resolve(&RunArgs::default(), Some(&f)).unwrap();
        assert_eq!(cfg.process_names, vec!["zoom.exe", "Teams.exe"]);
        assert_eq!(cfg.device_names, vec!["SURFACE"]);
        assert_eq!(cfg.warmup_duration, Duration::from_millis(500));
        assert_eq!(cfg.session_refresh_interval, Duration::from_secs(5));
    }

    #[test]
    fn cli_values_override_file() {
        let f = file(
            r#"
            process_names = ["zoom.exe"]
            device_names = ["Desk"]
            session_refresh_interval = 10.0
            "#,
        );
        let args = RunArgs {
            process_names: vec!["chrome.exe".to_string()],
            session_refresh_interval: Some(1.0),
            ..RunArgs::default()
        };
        let cfg = resolve(&args, Some(&f)).unwrap();
        assert_eq!(cfg.process_names, vec!["chrome.exe"]);
        assert_eq!(cfg.device_names, vec!["Desk"]);
        assert_eq!(cfg.session_refresh_interval, Duration::from_secs(1));
    }

    #[test]
    fn invalid_interval_is_rejected() {
        let args = RunArgs {
            session_refresh_interval: Some(0.0),
            ..RunArgs::default()
        };
        let err = resolve(&args, None).unwrap_err();
        assert!(format!("{err:#}").contains("session refresh interval"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("warmup = 2.0").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/interlude.toml")).unwrap_err();
        assert!(err.to_string().contains("read config"));
    }
}
