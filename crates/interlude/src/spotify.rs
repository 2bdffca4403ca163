//! Spotify Web API playback client.
//!
//! Blocking HTTP via ureq. Responses are read as text and decoded separately
//! so the JSON handling can be tested without a server.

use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use interlude_core::error::PlaybackError;
use interlude_core::playback::{CurrentPlayback, PlaybackClient, PlaybackDevice};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
/// Scopes needed to read and control playback.
pub const SCOPES: &str = "user-modify-playback-state user-read-playback-state";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:9090";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Cached tokens are refreshed this long before Spotify expires them.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const ERROR_SNIPPET_CHARS: usize = 300;

/// How the client obtains access tokens.
#[derive(Clone)]
pub enum Credentials {
    /// A fixed access token, used until Spotify rejects it.
    AccessToken(String),
    /// Refresh-token grant against the accounts service.
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessToken(_) => f.write_str("AccessToken(..)"),
            Self::RefreshToken { client_id, .. } => f
                .debug_struct("RefreshToken")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn new(value: String, expires_in: Option<u64>, now: Instant) -> Self {
        let expires_at = expires_in
            .map(|secs| now + Duration::from_secs(secs).saturating_sub(TOKEN_EXPIRY_MARGIN));
        Self { value, expires_at }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Deserialize)]
struct PlaybackPayload {
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    device: Option<DevicePayload>,
    #[serde(default)]
    item: Option<ItemPayload>,
}

#[derive(Debug, Deserialize)]
struct DevicePayload {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct DevicesPayload {
    devices: Vec<DevicePayload>,
}

#[derive(Debug, Deserialize)]
struct ItemPayload {
    name: String,
    #[serde(default)]
    artists: Vec<ArtistPayload>,
    #[serde(default)]
    show: Option<ShowPayload>,
}

#[derive(Debug, Deserialize)]
struct ArtistPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ShowPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    /// Web API shape: `{"error": {"status": 401, "message": "..."}}`.
    /// Player endpoints add a `reason` such as `PREMIUM_REQUIRED`.
    Api {
        message: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Accounts shape: `{"error": "invalid_grant", "error_description": "..."}`.
    Code(String),
}

#[derive(Debug, Deserialize)]
struct AccountsErrorPayload {
    #[serde(default)]
    error_description: Option<String>,
}

/// Spotify Web API client implementing [`PlaybackClient`].
pub struct SpotifyClient {
    agent: ureq::Agent,
    credentials: Credentials,
    token: Option<CachedToken>,
}

impl SpotifyClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            agent: new_agent(),
            credentials,
            token: None,
        }
    }

    fn access_token(&mut self) -> Result<String, PlaybackError> {
        let now = Instant::now();
        match &mut self.credentials {
            Credentials::AccessToken(token) => Ok(token.clone()),
            Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => {
                if let Some(cached) = self.token.as_ref().filter(|t| t.is_fresh(now)) {
                    return Ok(cached.value.clone());
                }
                let token = request_token(
                    &self.agent,
                    client_id,
                    client_secret,
                    &[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token.as_str()),
                    ],
                )?;
                if let Some(rotated) = token.refresh_token {
                    tracing::debug!("spotify rotated the refresh token");
                    *refresh_token = rotated;
                }
                tracing::debug!(expires_in = ?token.expires_in, "refreshed spotify access token");
                let cached = CachedToken::new(token.access_token, token.expires_in, now);
                let value = cached.value.clone();
                self.token = Some(cached);
                Ok(value)
            }
        }
    }

    fn get(&mut self, path: &str) -> Result<(u16, String), PlaybackError> {
        let bearer = format!("Bearer {}", self.access_token()?);
        let url = format!("{API_BASE}{path}");
        let result = self
            .agent
            .get(&url)
            .header("Authorization", bearer.as_str())
            .call();
        self.finish(&url, result)
    }

    fn put(&mut self, path: &str, device_id: &str) -> Result<(u16, String), PlaybackError> {
        let bearer = format!("Bearer {}", self.access_token()?);
        let url = format!("{API_BASE}{path}");
        let result = self
            .agent
            .put(&url)
            .query("device_id", device_id)
            .header("Authorization", bearer.as_str())
            .send_empty();
        self.finish(&url, result)
    }

    fn finish(
        &mut self,
        url: &str,
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<(u16, String), PlaybackError> {
        let (status, body) = read_response(result)?;
        if status == 401 && self.token.take().is_some() {
            tracing::debug!("spotify rejected the cached access token");
        }
        if !(200..300).contains(&status) {
            let err = status_error(status, &body);
            tracing::debug!(url, status, error = %err, "spotify request failed");
            return Err(err);
        }
        Ok((status, body))
    }
}

impl PlaybackClient for SpotifyClient {
    fn current_playback(&mut self) -> Result<Option<CurrentPlayback>, PlaybackError> {
        let (status, body) = self.get("/me/player")?;
        parse_current_playback(status, &body)
    }

    fn list_devices(&mut self) -> Result<Vec<PlaybackDevice>, PlaybackError> {
        let (_, body) = self.get("/me/player/devices")?;
        parse_devices(&body)
    }

    fn pause(&mut self, device_id: &str) -> Result<(), PlaybackError> {
        self.put("/me/player/pause", device_id).map(|_| ())
    }

    fn start(&mut self, device_id: &str) -> Result<(), PlaybackError> {
        self.put("/me/player/play", device_id).map(|_| ())
    }
}

fn new_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

fn read_response(
    result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<(u16, String), PlaybackError> {
    let mut resp = result.map_err(|e| PlaybackError::Network(e.to_string()))?;
    let status = resp.status().as_u16();
    let body = resp
        .body_mut()
        .read_to_string()
        .map_err(|e| PlaybackError::Network(format!("read response body: {e}")))?;
    Ok((status, body))
}

fn request_token(
    agent: &ureq::Agent,
    client_id: &str,
    client_secret: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, PlaybackError> {
    let basic = BASE64.encode(format!("{client_id}:{client_secret}"));
    let result = agent
        .post(TOKEN_URL)
        .header("Authorization", format!("Basic {basic}").as_str())
        .send_form(form.iter().copied());
    let (status, body) = read_response(result)?;
    if !(200..300).contains(&status) {
        return Err(token_error(status, &body));
    }
    parse_token(&body)
}

/// Exchange an authorization code for tokens.
pub fn exchange_code(
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, PlaybackError> {
    request_token(
        &new_agent(),
        client_id,
        client_secret,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ],
    )
}

/// URL the user opens to grant access.
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> String {
    format!(
        "{AUTHORIZE_URL}?client_id={}&response_type=code&redirect_uri={}&scope={}",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(SCOPES),
    )
}

/// Pull the authorization code out of a pasted redirect URL or a bare code.
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let Some((_, query)) = input.split_once('?') else {
        return (!input.contains(['=', '/', ' ', '&'])).then(|| input.to_string());
    };
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "code")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
        .filter(|value| !value.is_empty())
}

pub fn parse_current_playback(
    status: u16,
    body: &str,
) -> Result<Option<CurrentPlayback>, PlaybackError> {
    if status == 204 || body.trim().is_empty() {
        return Ok(None);
    }
    let payload: PlaybackPayload = decode(body)?;
    let track = payload.item.map(|item| {
        let by = item
            .artists
            .first()
            .map(|a| a.name.clone())
            .or_else(|| item.show.map(|s| s.name));
        match by {
            Some(by) => format!("{} by {by}", item.name),
            None => item.name,
        }
    });
    Ok(Some(CurrentPlayback {
        is_playing: payload.is_playing,
        device_id: payload.device.and_then(|d| d.id),
        track,
    }))
}

/// Devices without an id cannot be controlled and are skipped.
pub fn parse_devices(body: &str) -> Result<Vec<PlaybackDevice>, PlaybackError> {
    let payload: DevicesPayload = decode(body)?;
    Ok(payload
        .devices
        .into_iter()
        .filter_map(|d| {
            d.id.map(|id| PlaybackDevice {
                id,
                name: d.name,
                is_active: d.is_active,
            })
        })
        .collect())
}

pub fn parse_token(body: &str) -> Result<TokenResponse, PlaybackError> {
    decode(body)
}

/// Map a non-success Web API response to an error.
pub fn status_error(status: u16, body: &str) -> PlaybackError {
    let message = error_message(body);
    match status {
        401 => PlaybackError::Auth(message),
        // Player restrictions are reported as 403 with a reason; scope errors carry none.
        403 if player_reason(body).is_none() => PlaybackError::Auth(message),
        404 => PlaybackError::NotFound(message),
        _ => PlaybackError::Api { status, message },
    }
}

/// Map a non-success accounts-service response to an error.
fn token_error(status: u16, body: &str) -> PlaybackError {
    let description = serde_json::from_str::<AccountsErrorPayload>(body)
        .ok()
        .and_then(|p| p.error_description);
    let message = description.unwrap_or_else(|| error_message(body));
    match status {
        400 | 401 | 403 => PlaybackError::Auth(message),
        _ => PlaybackError::Api { status, message },
    }
}

fn error_message(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorPayload>(body) {
        return match payload.error {
            ApiErrorDetail::Api { message, .. } | ApiErrorDetail::Code(message) => message,
        };
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response".to_string();
    }
    let snippet: String = trimmed.chars().take(ERROR_SNIPPET_CHARS).collect();
    if trimmed.chars().count() > ERROR_SNIPPET_CHARS {
        format!("{snippet}...")
    } else {
        snippet
    }
}

fn player_reason(body: &str) -> Option<String> {
    match serde_json::from_str::<ApiErrorPayload>(body).ok()?.error {
        ApiErrorDetail::Api { reason, .. } => reason,
        ApiErrorDetail::Code(_) => None,
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, PlaybackError> {
    serde_json::from_str(body).map_err(|e| PlaybackError::Decode(e.to_string()))
}
