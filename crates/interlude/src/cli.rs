use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};

use crate::spotify::DEFAULT_REDIRECT_URI;

/// Public client id of the Interlude Spotify application.
pub const DEFAULT_CLIENT_ID: &str = "b28755671fa94530b587e9b8c30d1951";

#[derive(Parser, Debug)]
#[command(
    name = "interlude",
    version,
    about = "Pause Spotify while other applications play sound"
)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Options for `run` when no subcommand is given
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Args {
    /// Parse the process arguments, exiting with usage on error.
    pub fn parse_checked() -> Self {
        Self::try_parse_checked_from(std::env::args_os()).unwrap_or_else(|err| err.exit())
    }

    /// Like `try_parse_from`, but top-level `run` options combined with an
    /// explicit subcommand are rejected instead of silently ignored.
    pub fn try_parse_checked_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut cmd = <Self as CommandFactory>::command();
        let matches = cmd.try_get_matches_from_mut(itr)?;
        let args = Self::from_arg_matches(&matches).map_err(|err| err.format(&mut cmd))?;
        if let Some(sub) = matches.subcommand_name() {
            let stray = cmd
                .get_arguments()
                .filter(|arg| !arg.is_global_set())
                .find(|arg| {
                    matches.value_source(arg.get_id().as_str()) == Some(ValueSource::CommandLine)
                })
                .map(|arg| arg.get_long().unwrap_or(arg.get_id().as_str()).to_string());
            if let Some(flag) = stray {
                return Err(cmd.error(
                    ErrorKind::ArgumentConflict,
                    format!("--{flag} must follow the subcommand: `interlude {sub} --{flag} ...`"),
                ));
            }
        }
        Ok(args)
    }

    /// Selected command; `run` when none was given.
    pub fn command(self) -> Command {
        self.cmd.unwrap_or(Command::Run(self.run))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Watch audio sessions and hold Spotify while they play (default)
    Run(RunArgs),

    /// Obtain a Spotify refresh token through the browser
    Authorize(AuthorizeArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct LogArgs {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Optional config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Process name to watch, e.g. chrome.exe (repeatable)
    #[arg(long = "process", value_name = "NAME")]
    pub process_names: Vec<String>,

    /// Spotify device name to resume on when none is active (repeatable)
    #[arg(long = "device", value_name = "NAME")]
    pub device_names: Vec<String>,

    /// Seconds between audio session scans
    #[arg(long, value_name = "SECONDS")]
    pub session_refresh_interval: Option<f64>,

    /// Seconds to wait after foreground sound ends before resuming
    #[arg(long, value_name = "SECONDS")]
    pub warmup_duration: Option<f64>,

    #[command(flatten)]
    pub spotify: SpotifyArgs,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SpotifyArgs {
    #[arg(long, env = "SPOTIFY_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    #[arg(long, env = "SPOTIFY_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Refresh token printed by `interlude authorize`
    #[arg(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Fixed access token; skips the refresh flow
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AuthorizeArgs {
    #[arg(long, env = "SPOTIFY_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    #[arg(long, env = "SPOTIFY_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Redirect URI registered for the Spotify application
    #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,
}
