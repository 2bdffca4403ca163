//! Foreground audio-session tracking.
//!
//! The registry reconciles the sessions reported by the audio subsystem with
//! the ones it already tracks, keyed by process id. Each tracked session has a
//! [`SessionCallback`] that mirrors its last known state and forwards
//! transitions to a [`SessionHooks`] implementation.

use std::collections::BTreeMap;

use crate::audio::{AudioEvent, AudioSubsystem, Notifier, ProcessId, SessionInfo, SessionState};
use crate::error::AudioError;

/// Receiver of session transitions.
pub trait SessionHooks {
    /// A session was already active when first discovered.
    fn on_discovered_active(&mut self);
    /// A session started producing sound.
    fn on_active(&mut self);
    /// A previously active session went quiet.
    fn on_inactive(&mut self);
    /// A session expired or disappeared. `last_known` is its state before that.
    fn on_expired(&mut self, last_known: SessionState);
}

/// Per-session notification state.
#[derive(Debug)]
pub struct SessionCallback {
    process_id: ProcessId,
    process_name: String,
    state: SessionState,
}

impl SessionCallback {
    /// Register with the adapter and report an already-active session.
    fn attach<A: AudioSubsystem + ?Sized>(
        info: SessionInfo,
        audio: &mut A,
        notify: Notifier,
        hooks: &mut dyn SessionHooks,
    ) -> Result<Self, AudioError> {
        audio.register(info.process_id, notify)?;
        tracing::info!(
            pid = info.process_id,
            process = %info.process_name,
            state = %info.state,
            "registered session callback"
        );
        if info.state == SessionState::Active {
            hooks.on_discovered_active();
        }
        Ok(Self {
            process_id: info.process_id,
            process_name: info.process_name,
            state: info.state,
        })
    }

    fn detach<A: AudioSubsystem + ?Sized>(self, audio: &mut A) -> SessionState {
        audio.unregister(self.process_id);
        tracing::info!(
            pid = self.process_id,
            process = %self.process_name,
            "unregistered session callback"
        );
        self.state
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Last state reported for this session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Dispatch a raw state notification, then record the new state.
    ///
    /// Unknown codes and repeats of the current state are ignored. An
    /// inactive report only counts as a transition when the session was active.
    pub fn on_state_changed(&mut self, raw_state: i32, hooks: &mut dyn SessionHooks) {
        let Some(next) = SessionState::from_raw(raw_state) else {
            tracing::warn!(
                pid = self.process_id,
                process = %self.process_name,
                raw_state,
                "unknown audio session state"
            );
            return;
        };
        if next == self.state {
            tracing::debug!(pid = self.process_id, state = %next, "duplicate session state");
            return;
        }
        tracing::info!(
            pid = self.process_id,
            process = %self.process_name,
            from = %self.state,
            to = %next,
            "session state changed"
        );
        match next {
            SessionState::Active => hooks.on_active(),
            SessionState::Inactive if self.state == SessionState::Active => hooks.on_inactive(),
            SessionState::Inactive => {}
            SessionState::Expired => hooks.on_expired(self.state),
        }
        self.state = next;
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub added: usize,
    pub removed: usize,
}

/// Tracks foreground sessions for a fixed set of process names.
pub struct SessionRegistry<A: AudioSubsystem> {
    audio: A,
    process_names: Vec<String>,
    notify: Notifier,
    sessions: BTreeMap<ProcessId, SessionCallback>,
}

impl<A: AudioSubsystem> SessionRegistry<A> {
    /// `notify` is handed to the adapter for every registered session.
    pub fn new(audio: A, process_names: Vec<String>, notify: Notifier) -> Self {
        Self {
            audio,
            process_names,
            notify,
            sessions: BTreeMap::new(),
        }
    }

    pub fn process_names(&self) -> &[String] {
        &self.process_names
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, process_id: ProcessId) -> Option<&SessionCallback> {
        self.sessions.get(&process_id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionCallback> {
        self.sessions.values()
    }

    /// Number of tracked sessions whose last known state is active.
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Active)
            .count()
    }

    /// Poll the adapter and reconcile the tracked set.
    ///
    /// Vanished sessions are unregistered first; an active one is reported
    /// to `hooks` as expired. New sessions are registered and tracked. When
    /// no output device exists the snapshot is treated as empty.
    pub fn discover(&mut self, hooks: &mut dyn SessionHooks) -> Reconciled {
        let snapshot = match self.audio.list_sessions(&self.process_names) {
            Ok(snapshot) => snapshot,
            Err(AudioError::Unavailable) => {
                tracing::error!("no audio output device registered; retrying next cycle");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "audio session listing failed; skipping cycle");
                return Reconciled::default();
            }
        };

        let mut current: BTreeMap<ProcessId, SessionInfo> = BTreeMap::new();
        for info in snapshot {
            current.entry(info.process_id).or_insert(info);
        }

        let mut summary = Reconciled::default();
        let gone: Vec<ProcessId> = self
            .sessions
            .keys()
            .filter(|pid| !current.contains_key(*pid))
            .copied()
            .collect();
        for pid in gone {
            if let Some(session) = self.sessions.remove(&pid) {
                let last_known = session.detach(&mut self.audio);
                if last_known == SessionState::Active {
                    hooks.on_expired(last_known);
                }
                summary.removed += 1;
            }
        }

        for (pid, info) in current {
            if self.sessions.contains_key(&pid) {
                continue;
            }
            match SessionCallback::attach(info, &mut self.audio, self.notify.clone(), hooks) {
                Ok(session) => {
                    self.sessions.insert(pid, session);
                    summary.added += 1;
                }
                Err(err) => {
                    tracing::warn!(pid, error = %err, "failed to register session; retrying next cycle");
                }
            }
        }

        if summary != Reconciled::default() {
            tracing::debug!(
                added = summary.added,
                removed = summary.removed,
                tracked = self.sessions.len(),
                "sessions reconciled"
            );
        }
        summary
    }

    /// Route an adapter notification to its session.
    pub fn dispatch(&mut self, event: AudioEvent, hooks: &mut dyn SessionHooks) {
        match event {
            AudioEvent::StateChanged {
                process_id,
                raw_state,
            } => match self.sessions.get_mut(&process_id) {
                Some(session) => session.on_state_changed(raw_state, hooks),
                None => {
                    tracing::debug!(pid = process_id, raw_state, "notification for untracked session")
                }
            },
            AudioEvent::Disconnected { process_id, reason } => {
                tracing::info!(pid = process_id, reason, "audio session disconnected");
            }
        }
    }

    /// Unregister every tracked session.
    pub fn release_all(&mut self) {
        let sessions = std::mem::take(&mut self.sessions);
        for (_, session) in sessions {
            session.detach(&mut self.audio);
        }
    }
}

impl<A: AudioSubsystem> Drop for SessionRegistry<A> {
    fn drop(&mut self) {
        self.release_all();
    }
}
