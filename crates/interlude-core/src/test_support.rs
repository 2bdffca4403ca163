//! Fakes shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::audio::{AudioEvent, AudioSubsystem, Notifier, ProcessId, SessionInfo, SessionState};
use crate::error::{AudioError, PlaybackError};
use crate::playback::{CurrentPlayback, PlaybackClient, PlaybackDevice};
use crate::scheduler::Clock;
use crate::session::SessionHooks;

/// Clock that only moves when told to.
#[derive(Clone)]
pub(crate) struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

pub(crate) fn device(id: &str, name: &str, is_active: bool) -> PlaybackDevice {
    PlaybackDevice {
        id: id.to_string(),
        name: name.to_string(),
        is_active,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClientCall {
    CurrentPlayback,
    ListDevices,
    Pause(String),
    Start(String),
}

#[derive(Default)]
pub(crate) struct FakeClientState {
    pub(crate) playback: Option<CurrentPlayback>,
    pub(crate) devices: Vec<PlaybackDevice>,
    pub(crate) calls: Vec<ClientCall>,
    pub(crate) fail_current: Option<PlaybackError>,
    pub(crate) fail_devices: Option<PlaybackError>,
    pub(crate) fail_pause: Option<PlaybackError>,
    pub(crate) fail_start: Option<PlaybackError>,
}

/// Scripted playback client. Clones share state so tests can inspect calls
/// after handing a clone to the code under test.
#[derive(Clone, Default)]
pub(crate) struct FakeClient {
    state: Rc<RefCell<FakeClientState>>,
}

impl FakeClient {
    /// Nothing playing, no devices.
    pub(crate) fn idle() -> Self {
        Self::default()
    }

    /// Remote playing on `device`, which is the only device.
    pub(crate) fn playing_on(device: PlaybackDevice) -> Self {
        let client = Self::default();
        client.with(|s| {
            s.playback = Some(CurrentPlayback {
                is_playing: true,
                device_id: Some(device.id.clone()),
                track: Some("Song by Artist".to_string()),
            });
            s.devices = vec![device];
        });
        client
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut FakeClientState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub(crate) fn set_devices(&self, devices: Vec<PlaybackDevice>) {
        self.with(|s| s.devices = devices);
    }

    pub(crate) fn set_remote_playing(&self, playing: bool) {
        self.with(|s| match s.playback.as_mut() {
            Some(p) => p.is_playing = playing,
            None => {
                s.playback = Some(CurrentPlayback {
                    is_playing: playing,
                    device_id: None,
                    track: None,
                })
            }
        });
    }

    pub(crate) fn calls(&self) -> Vec<ClientCall> {
        self.with(|s| s.calls.clone())
    }

    /// Only the calls that change remote playback.
    pub(crate) fn control_calls(&self) -> Vec<ClientCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ClientCall::Pause(_) | ClientCall::Start(_)))
            .collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }
}

impl PlaybackClient for FakeClient {
    fn current_playback(&mut self) -> Result<Option<CurrentPlayback>, PlaybackError> {
        self.with(|s| {
            s.calls.push(ClientCall::CurrentPlayback);
            match &s.fail_current {
                Some(err) => Err(err.clone()),
                None => Ok(s.playback.clone()),
            }
        })
    }

    fn list_devices(&mut self) -> Result<Vec<PlaybackDevice>, PlaybackError> {
        self.with(|s| {
            s.calls.push(ClientCall::ListDevices);
            match &s.fail_devices {
                Some(err) => Err(err.clone()),
                None => Ok(s.devices.clone()),
            }
        })
    }

    fn pause(&mut self, device_id: &str) -> Result<(), PlaybackError> {
        self.with(|s| {
            s.calls.push(ClientCall::Pause(device_id.to_string()));
            if let Some(err) = &s.fail_pause {
                return Err(err.clone());
            }
            if let Some(p) = s.playback.as_mut() {
                p.is_playing = false;
            }
            Ok(())
        })
    }

    fn start(&mut self, device_id: &str) -> Result<(), PlaybackError> {
        self.with(|s| {
            s.calls.push(ClientCall::Start(device_id.to_string()));
            if let Some(err) = &s.fail_start {
                return Err(err.clone());
            }
            s.playback = Some(CurrentPlayback {
                is_playing: true,
                device_id: Some(device_id.to_string()),
                track: None,
            });
            Ok(())
        })
    }
}

#[derive(Default)]
pub(crate) struct FakeAudioState {
    pub(crate) sessions: Vec<SessionInfo>,
    pub(crate) unavailable: bool,
    pub(crate) backend_error: bool,
    pub(crate) reject_register: Vec<ProcessId>,
    pub(crate) notifiers: BTreeMap<ProcessId, Notifier>,
    pub(crate) registered: Vec<ProcessId>,
    pub(crate) unregistered: Vec<ProcessId>,
}

/// In-memory audio subsystem recording register/unregister calls.
#[derive(Clone, Default)]
pub(crate) struct FakeAudio {
    state: Rc<RefCell<FakeAudioState>>,
}

impl FakeAudio {
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut FakeAudioState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub(crate) fn add_session(&self, process_id: ProcessId, name: &str, state: SessionState) {
        self.with(|s| {
            s.sessions.push(SessionInfo {
                process_id,
                process_name: name.to_string(),
                state,
            })
        });
    }

    pub(crate) fn remove_session(&self, process_id: ProcessId) {
        self.with(|s| s.sessions.retain(|info| info.process_id != process_id));
    }

    pub(crate) fn registered(&self) -> Vec<ProcessId> {
        self.with(|s| s.registered.clone())
    }

    pub(crate) fn unregistered(&self) -> Vec<ProcessId> {
        self.with(|s| s.unregistered.clone())
    }

    pub(crate) fn clear_log(&self) {
        self.with(|s| {
            s.registered.clear();
            s.unregistered.clear();
        });
    }

    pub(crate) fn is_attached(&self, process_id: ProcessId) -> bool {
        self.with(|s| s.notifiers.contains_key(&process_id))
    }

    /// Fire a state change the way an OS callback thread would.
    pub(crate) fn emit_state(&self, process_id: ProcessId, raw_state: i32) {
        let notifier = self.with(|s| s.notifiers.get(&process_id).cloned());
        if let Some(notify) = notifier {
            notify(AudioEvent::StateChanged {
                process_id,
                raw_state,
            });
        }
    }
}

impl AudioSubsystem for FakeAudio {
    fn list_sessions(&mut self, process_names: &[String]) -> Result<Vec<SessionInfo>, AudioError> {
        self.with(|s| {
            if s.unavailable {
                return Err(AudioError::Unavailable);
            }
            if s.backend_error {
                return Err(AudioError::Backend("enumeration failed".to_string()));
            }
            Ok(s.sessions
                .iter()
                .filter(|info| process_names.contains(&info.process_name))
                .cloned()
                .collect())
        })
    }

    fn register(&mut self, process_id: ProcessId, notify: Notifier) -> Result<(), AudioError> {
        self.with(|s| {
            if s.reject_register.contains(&process_id) {
                return Err(AudioError::SessionNotFound(process_id));
            }
            s.registered.push(process_id);
            s.notifiers.insert(process_id, notify);
            Ok(())
        })
    }

    fn unregister(&mut self, process_id: ProcessId) {
        self.with(|s| {
            s.unregistered.push(process_id);
            s.notifiers.remove(&process_id);
        });
    }
}

/// Hooks that only record what they were told.
#[derive(Debug, Default)]
pub(crate) struct RecordingHooks {
    pub(crate) calls: Vec<String>,
    pub(crate) active: i64,
}

impl SessionHooks for RecordingHooks {
    fn on_discovered_active(&mut self) {
        self.active += 1;
        self.calls.push("discovered_active".to_string());
    }

    fn on_active(&mut self) {
        self.active += 1;
        self.calls.push("active".to_string());
    }

    fn on_inactive(&mut self) {
        self.active -= 1;
        self.calls.push("inactive".to_string());
    }

    fn on_expired(&mut self, last_known: SessionState) {
        if last_known == SessionState::Active {
            self.active -= 1;
        }
        self.calls.push(format!("expired:{last_known}"));
    }
}
