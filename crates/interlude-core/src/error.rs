//! Error taxonomy shared by the core components.
//!
//! None of these errors stop the monitor loop: the registry and controller
//! log them and carry on. Only [`ConfigError`] is fatal, at startup.

use crate::audio::ProcessId;
use crate::player::PlaybackState;

/// Failures reported by the audio subsystem adapter.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No audio output device is registered with the OS.
    #[error("no audio output device registered")]
    Unavailable,
    /// The session is no longer known to the adapter.
    #[error("no audio session for pid {0}")]
    SessionNotFound(ProcessId),
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Failures reported by the remote playback client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("playback api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid playback api response: {0}")]
    Decode(String),
}

/// Failures of a player state-machine operation.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// No device matched the selection policy.
    #[error("no suitable playback device found")]
    DeviceUnavailable,
    /// The operation is not valid from the current state.
    #[error("cannot {action} while playback is {state}")]
    UnexpectedTransition {
        action: &'static str,
        state: PlaybackState,
    },
    #[error(transparent)]
    Remote(#[from] PlaybackError),
}

/// Invalid monitor configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a finite number of seconds{bound}, got {value}")]
    InvalidInterval {
        name: &'static str,
        bound: &'static str,
        value: f64,
    },
    #[error("at least one process name is required")]
    NoProcessNames,
}
