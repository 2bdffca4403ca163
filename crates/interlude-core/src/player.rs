//! Local view of the remote player.
//!
//! Wraps a [`PlaybackClient`] with the playback state machine:
//!
//! ```text
//! Off/Paused --(refresh: remote playing)--> Playing
//! Playing    --(refresh: remote stopped)--> Paused
//! Playing    --(hold: pause issued)-------> Hold
//! Warmup     --(hold: local only)---------> Hold
//! Hold       --(warmup)-------------------> Warmup
//! Warmup     --(resume: device found)-----> Playing
//! Warmup     --(resume: no device)--------> Off
//! ```
//!
//! Hold, Warmup and Off belong to this process; a refresh never changes them.

use std::fmt;

use crate::error::{PlaybackError, PlayerError};
use crate::playback::{CurrentPlayback, PlaybackClient, select_device};

/// Playback state as tracked by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No device capable of playing was found.
    #[default]
    Off,
    Playing,
    /// Paused by us because of foreground sound; will be resumed.
    Hold,
    /// Foreground sound ended; playback resumes once the warmup elapses.
    Warmup,
    /// Paused by the user; left alone.
    Paused,
}

impl PlaybackState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Playing => "playing",
            Self::Hold => "hold",
            Self::Warmup => "warmup",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback client plus the locally authoritative [`PlaybackState`].
pub struct Player<C> {
    client: C,
    preferred_devices: Vec<String>,
    state: PlaybackState,
}

impl<C: PlaybackClient> Player<C> {
    pub fn new(client: C, preferred_devices: Vec<String>) -> Self {
        Self {
            client,
            preferred_devices,
            state: PlaybackState::Off,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn set_state(&mut self, next: PlaybackState) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "playback state changed");
        }
        self.state = next;
    }

    /// Re-read remote playback and reconcile the local state.
    ///
    /// Remote "playing" always wins. A local `Playing` with nothing playing
    /// remotely means the user paused by hand.
    pub fn refresh(&mut self) -> Result<Option<CurrentPlayback>, PlaybackError> {
        let playback = self.client.current_playback()?;
        let remote_playing = playback.as_ref().is_some_and(|p| p.is_playing);
        if remote_playing {
            self.set_state(PlaybackState::Playing);
        } else if self.state == PlaybackState::Playing {
            self.set_state(PlaybackState::Paused);
        }
        Ok(playback)
    }

    /// Put playback on hold because of foreground sound.
    ///
    /// From `Warmup` nothing was resumed yet, so no remote call is made.
    /// On failure the state is left unchanged.
    pub fn hold(&mut self) -> Result<(), PlayerError> {
        match self.state {
            PlaybackState::Warmup => {
                self.set_state(PlaybackState::Hold);
                Ok(())
            }
            PlaybackState::Playing => {
                let device_id = self.device_id()?;
                self.client.pause(&device_id)?;
                self.set_state(PlaybackState::Hold);
                tracing::info!(device_id = %device_id, "playback on hold");
                Ok(())
            }
            state => Err(PlayerError::UnexpectedTransition {
                action: "hold",
                state,
            }),
        }
    }

    /// Start the warmup period.
    pub fn warmup(&mut self) -> Result<(), PlayerError> {
        match self.state {
            PlaybackState::Hold => {
                self.set_state(PlaybackState::Warmup);
                Ok(())
            }
            state => Err(PlayerError::UnexpectedTransition {
                action: "warm up",
                state,
            }),
        }
    }

    /// Resume playback once the warmup elapsed.
    ///
    /// Without a usable device, or if the start call fails, playback is
    /// considered off.
    pub fn resume(&mut self) -> Result<(), PlayerError> {
        if self.state != PlaybackState::Warmup {
            return Err(PlayerError::UnexpectedTransition {
                action: "resume",
                state: self.state,
            });
        }
        let device_id = match self.device_id() {
            Ok(id) => id,
            Err(err) => {
                self.set_state(PlaybackState::Off);
                return Err(err);
            }
        };
        if let Err(err) = self.client.start(&device_id) {
            self.set_state(PlaybackState::Off);
            return Err(err.into());
        }
        self.set_state(PlaybackState::Playing);
        tracing::info!(device_id = %device_id, "resumed playback");
        Ok(())
    }

    fn device_id(&mut self) -> Result<String, PlayerError> {
        let devices = self.client.list_devices()?;
        select_device(&devices, &self.preferred_devices)
            .map(|d| d.id.clone())
            .ok_or(PlayerError::DeviceUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ClientCall, FakeClient, device};

    fn player(client: &FakeClient) -> Player<FakeClient> {
        Player::new(client.clone(), vec!["SURFACE".to_string()])
    }

    #[test]
    fn refresh_forces_playing_when_remote_plays() {
        let client = FakeClient::playing_on(device("d1", "SURFACE", true));
        for start in [PlaybackState::Off, PlaybackState::Paused, PlaybackState::Hold] {
            let mut p = player(&client);
            p.set_state(start);
            p.refresh().unwrap();
            assert_eq!(p.state(), PlaybackState::Playing);
        }
    }

    #[test]
    fn refresh_degrades_playing_to_paused() {
        let client = FakeClient::idle();
        let mut p = player(&client);
        p.set_state(PlaybackState::Playing);
        p.refresh().unwrap();
        assert_eq!(p.state(), PlaybackState::Paused);
    }

    #[test]
    fn refresh_keeps_owned_states_when_remote_is_idle() {
        let client = FakeClient::idle();
        for owned in [PlaybackState::Hold, PlaybackState::Warmup, PlaybackState::Off] {
            let mut p = player(&client);
            p.set_state(owned);
            p.refresh().unwrap();
            assert_eq!(p.state(), owned);
        }
    }

    #[test]
    fn refresh_error_keeps_state() {
        let client = FakeClient::idle();
        client.with(|s| s.fail_current = Some(PlaybackError::Network("offline".into())));
        let mut p = player(&client);
        p.set_state(PlaybackState::Playing);
        assert!(p.refresh().is_err());
        assert_eq!(p.state(), PlaybackState::Playing);
    }

    #[test]
    fn hold_from_playing_pauses_selected_device() {
        let client = FakeClient::playing_on(device("d1", "Phone", true));
        let mut p = player(&client);
        p.set_state(PlaybackState::Playing);

        p.hold().unwrap();

        assert_eq!(p.state(), PlaybackState::Hold);
        assert_eq!(client.control_calls(), vec![ClientCall::Pause("d1".into())]);
    }

    #[test]
    fn hold_from_warmup_is_local() {
        let client = FakeClient::idle();
        let mut p = player(&client);
        p.set_state(PlaybackState::Warmup);

        p.hold().unwrap();

        assert_eq!(p.state(), PlaybackState::Hold);
        assert!(client.calls().is_empty());
    }

    #[test]
    fn hold_without_device_leaves_state() {
        let client = FakeClient::idle();
        client.set_devices(vec![device("d9", "Kitchen", false)]);
        let mut p = player(&client);
        p.set_state(PlaybackState::Playing);

        let err = p.hold().unwrap_err();

        assert!(matches!(err, PlayerError::DeviceUnavailable));
        assert_eq!(p.state(), PlaybackState::Playing);
        assert!(client.control_calls().is_empty());
    }

    #[test]
    fn hold_pause_failure_leaves_state() {
        let client = FakeClient::playing_on(device("d1", "SURFACE", true));
        client.with(|s| s.fail_pause = Some(PlaybackError::NotFound("device".into())));
        let mut p = player(&client);
        p.set_state(PlaybackState::Playing);

        assert!(matches!(p.hold(), Err(PlayerError::Remote(_))));
        assert_eq!(p.state(), PlaybackState::Playing);
    }

    #[test]
    fn hold_is_rejected_outside_playing_and_warmup() {
        let client = FakeClient::idle();
        for state in [PlaybackState::Off, PlaybackState::Hold, PlaybackState::Paused] {
            let mut p = player(&client);
            p.set_state(state);
            assert!(matches!(
                p.hold(),
                Err(PlayerError::UnexpectedTransition { action: "hold", .. })
            ));
            assert_eq!(p.state(), state);
        }
        assert!(client.calls().is_empty());
    }

    #[test]
    fn warmup_only_from_hold() {
        let client = FakeClient::idle();
        let mut p = player(&client);
        assert!(p.warmup().is_err());
        assert_eq!(p.state(), PlaybackState::Off);

        p.set_state(PlaybackState::Hold);
        p.warmup().unwrap();
        assert_eq!(p.state(), PlaybackState::Warmup);
    }

    #[test]
    fn resume_starts_preferred_device() {
        let client = FakeClient::idle();
        client.set_devices(vec![
            device("d0", "Kitchen", false),
            device("d1", "SURFACE", false),
        ]);
        let mut p = player(&client);
        p.set_state(PlaybackState::Warmup);

        p.resume().unwrap();

        assert_eq!(p.state(), PlaybackState::Playing);
        assert_eq!(client.control_calls(), vec![ClientCall::Start("d1".into())]);
    }

    #[test]
    fn resume_without_device_turns_off() {
        let client = FakeClient::idle();
        let mut p = player(&client);
        p.set_state(PlaybackState::Warmup);

        assert!(matches!(p.resume(), Err(PlayerError::DeviceUnavailable)));
        assert_eq!(p.state(), PlaybackState::Off);
        assert!(client.control_calls().is_empty());
    }

    #[test]
    fn resume_device_listing_failure_turns_off() {
        let client = FakeClient::idle();
        client.with(|s| s.fail_devices = Some(PlaybackError::Auth("expired".into())));
        let mut p = player(&client);
        p.set_state(PlaybackState::Warmup);

        assert!(matches!(p.resume(), Err(PlayerError::Remote(PlaybackError::Auth(_)))));
        assert_eq!(p.state(), PlaybackState::Off);
    }

    #[test]
    fn resume_start_failure_turns_off() {
        let client = FakeClient::idle();
        client.set_devices(vec![device("d1", "SURFACE", true)]);
        client.with(|s| s.fail_start = Some(PlaybackError::Network("reset".into())));
        let mut p = player(&client);
        p.set_state(PlaybackState::Warmup);

        assert!(p.resume().is_err());
        assert_eq!(p.state(), PlaybackState::Off);
    }

    #[test]
    fn resume_outside_warmup_is_rejected_without_mutation() {
        let client = FakeClient::playing_on(device("d1", "SURFACE", true));
        let mut p = player(&client);
        p.set_state(PlaybackState::Hold);

        assert!(matches!(
            p.resume(),
            Err(PlayerError::UnexpectedTransition { action: "resume", state: PlaybackState::Hold })
        ));
        assert_eq!(p.state(), PlaybackState::Hold);
        assert!(client.calls().is_empty());
    }
}
