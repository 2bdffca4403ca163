//! Command runners.
//!
//! Wires configuration, the Spotify client and the platform audio adapter
//! into a [`Monitor`] and runs it until Ctrl-C.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;

use interlude_core::{Message, Monitor};

use crate::cli::{AuthorizeArgs, RunArgs, SpotifyArgs};
use crate::config::{self, FileConfig};
use crate::spotify::{self, Credentials, SpotifyClient};
use crate::wasapi;

/// Watch audio sessions until interrupted.
pub fn run(args: RunArgs) -> Result<()> {
    let file = args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = config::resolve(&args, file.as_ref())?;
    let credentials = credentials(&args.spotify)?;
    tracing::info!(
        processes = ?config.process_names,
        devices = ?config.device_names,
        refresh_ms = config.session_refresh_interval.as_millis() as u64,
        warmup_ms = config.warmup_duration.as_millis() as u64,
        "starting interlude"
    );

    let client = SpotifyClient::new(credentials);
    let audio = wasapi::open().context("open audio subsystem")?;
    let mut monitor = Monitor::new(audio, client, &config);
    install_ctrlc(monitor.sender())?;
    monitor.run();
    Ok(())
}

/// Walk the user through the authorization-code flow and print a refresh token.
pub fn authorize(args: AuthorizeArgs) -> Result<()> {
    let url = spotify::authorize_url(&args.client_id, &args.redirect_uri);
    println!("Open this URL in a browser and approve access:\n\n  {url}\n");
    print!("Paste the URL you were redirected to (or just the code): ");
    std::io::stdout().flush().context("flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read authorization code")?;
    let code = spotify::extract_code(&line)
        .ok_or_else(|| anyhow::anyhow!("no authorization code found in input"))?;

    let token = spotify::exchange_code(
        &args.client_id,
        &args.client_secret,
        &code,
        &args.redirect_uri,
    )
    .context("exchange authorization code")?;
    let refresh_token = token
        .refresh_token
        .ok_or_else(|| anyhow::anyhow!("spotify did not return a refresh token"))?;
    tracing::info!(scope = ?token.scope, "authorization granted");
    println!("\nSPOTIFY_REFRESH_TOKEN={refresh_token}");
    Ok(())
}

/// Pick the token source: a fixed access token wins over the refresh flow.
fn credentials(args: &SpotifyArgs) -> Result<Credentials> {
    if let Some(token) = non_blank(args.access_token.as_deref()) {
        return Ok(Credentials::AccessToken(token));
    }
    let client_secret = non_blank(args.client_secret.as_deref())
        .context("missing Spotify client secret; set SPOTIFY_SECRET or --client-secret")?;
    let refresh_token = non_blank(args.refresh_token.as_deref()).context(
        "missing Spotify refresh token; run `interlude authorize` and set SPOTIFY_REFRESH_TOKEN",
    )?;
    Ok(Credentials::RefreshToken {
        client_id: args.client_id.trim().to_string(),
        client_secret,
        refresh_token,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn install_ctrlc(tx: Sender<Message>) -> Result<()> {
    ctrlc::set_handler(move || {
        if tx.send(Message::Shutdown).is_err() {
            std::process::exit(130);
        }
    })
    .context("install Ctrl-C handler")
}
