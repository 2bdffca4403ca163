//! OS audio-session adapter seam.
//!
//! The monitor only needs three operations from the platform: list sessions
//! for a set of process names, attach a notifier to one, and detach it.
//! Notifications are delivered from adapter-owned threads.

use std::fmt;
use std::sync::Arc;

use crate::error::AudioError;

/// OS process id owning an audio session.
pub type ProcessId = u32;

/// Audio session state as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Inactive,
    Active,
    Expired,
}

impl SessionState {
    /// Decode the platform's numeric state (`0` inactive, `1` active, `2` expired).
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Inactive),
            1 => Some(Self::Active),
            2 => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Inactive => 0,
            Self::Active => 1,
            Self::Expired => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One enumerated audio session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub process_id: ProcessId,
    pub process_name: String,
    pub state: SessionState,
}

/// Asynchronous notification from the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    /// The session changed state. `raw_state` is passed through undecoded so
    /// unknown values can be reported.
    StateChanged { process_id: ProcessId, raw_state: i32 },
    /// The session was disconnected (device removed, format change, ...).
    Disconnected { process_id: ProcessId, reason: i32 },
}

impl AudioEvent {
    pub fn process_id(&self) -> ProcessId {
        match *self {
            AudioEvent::StateChanged { process_id, .. } => process_id,
            AudioEvent::Disconnected { process_id, .. } => process_id,
        }
    }
}

/// Callback invoked by the adapter, possibly from a foreign thread.
pub type Notifier = Arc<dyn Fn(AudioEvent) + Send + Sync>;

/// Platform audio subsystem.
pub trait AudioSubsystem {
    /// List current sessions whose process name is in `process_names`.
    ///
    /// Returns [`AudioError::Unavailable`] when no output device is registered.
    fn list_sessions(&mut self, process_names: &[String]) -> Result<Vec<SessionInfo>, AudioError>;

    /// Start delivering notifications for the session owned by `process_id`.
    fn register(&mut self, process_id: ProcessId, notify: Notifier) -> Result<(), AudioError>;

    /// Stop delivering notifications. Unknown ids are ignored.
    fn unregister(&mut self, process_id: ProcessId);
}

impl<A: AudioSubsystem + ?Sized> AudioSubsystem for Box<A> {
    fn list_sessions(&mut self, process_names: &[String]) -> Result<Vec<SessionInfo>, AudioError> {
        (**self).list_sessions(process_names)
    }

    fn register(&mut self, process_id: ProcessId, notify: Notifier) -> Result<(), AudioError> {
        (**self).register(process_id, notify)
    }

    fn unregister(&mut self, process_id: ProcessId) {
        (**self).unregister(process_id)
    }
}
