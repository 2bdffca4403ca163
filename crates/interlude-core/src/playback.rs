//! Remote playback client abstraction.
//!
//! Implementations translate playback queries and commands into calls on a
//! remote player API. All calls block the monitor thread.

use crate::error::PlaybackError;

/// Snapshot of the remote player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPlayback {
    pub is_playing: bool,
    pub device_id: Option<String>,
    /// Human-readable track label, if the player reports one.
    pub track: Option<String>,
}

/// Output device known to the remote player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackDevice {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

pub trait PlaybackClient {
    /// Current playback, or `None` when nothing is loaded on any device.
    fn current_playback(&mut self) -> Result<Option<CurrentPlayback>, PlaybackError>;
    fn list_devices(&mut self) -> Result<Vec<PlaybackDevice>, PlaybackError>;
    fn pause(&mut self, device_id: &str) -> Result<(), PlaybackError>;
    fn start(&mut self, device_id: &str) -> Result<(), PlaybackError>;
}

impl<C: PlaybackClient + ?Sized> PlaybackClient for Box<C> {
    fn current_playback(&mut self) -> Result<Option<CurrentPlayback>, PlaybackError> {
        (**self).current_playback()
    }

    fn list_devices(&mut self) -> Result<Vec<PlaybackDevice>, PlaybackError> {
        (**self).list_devices()
    }

    fn pause(&mut self, device_id: &str) -> Result<(), PlaybackError> {
        (**self).pause(device_id)
    }

    fn start(&mut self, device_id: &str) -> Result<(), PlaybackError> {
        (**self).start(device_id)
    }
}

/// Pick the device to control.
///
/// The device currently reported active wins; otherwise the first device whose
/// name is listed in `preferred` (exact match).
pub fn select_device<'a>(
    devices: &'a [PlaybackDevice],
    preferred: &[String],
) -> Option<&'a PlaybackDevice> {
    devices.iter().find(|d| d.is_active).or_else(|| {
        devices
            .iter()
            .find(|d| preferred.iter().any(|name| *name == d.name))
    })
}
