//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Filter directives applied when `RUST_LOG` is unset.
pub fn default_directives(level: &str) -> Result<String> {
    let level: LevelFilter = level
        .trim()
        .parse()
        .with_context(|| format!("invalid log level {level:?}"))?;
    let level = level.to_string().to_lowercase();
    Ok(format!("{level},interlude={level},interlude_core={level}"))
}

/// Install the global subscriber, writing to `log_file` when given.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let directives = default_directives(level)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {:?}", path))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_both_crates() {
        assert_eq!(
            default_directives("debug").unwrap(),
            "debug,interlude=debug,interlude_core=debug"
        );
        assert_eq!(
            default_directives(" WARN ").unwrap(),
            "warn,interlude=warn,interlude_core=warn"
        );
    }

    #[test]
    fn default_directives_reject_unknown_level() {
        assert!(default_directives("loud").is_err());
    }
}
