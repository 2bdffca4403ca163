//! Pause/resume decisions driven by foreground sound.

use std::time::Duration;

use crate::audio::SessionState;
use crate::playback::PlaybackClient;
use crate::player::{PlaybackState, Player};
use crate::scheduler::Scheduler;
use crate::session::SessionHooks;

/// Work items run by the monitor's scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Poll the audio subsystem and reconcile tracked sessions.
    Rediscover,
    /// Resume playback after the warmup elapsed.
    Resume,
}

pub const REDISCOVER_PRIORITY: i32 = 5;
pub const RESUME_PRIORITY: i32 = 10;

/// Counts active foreground sessions and drives the [`Player`].
pub struct PlaybackController<C> {
    player: Player<C>,
    scheduler: Scheduler<Task>,
    warmup: Duration,
    active_sessions: usize,
}

impl<C: PlaybackClient> PlaybackController<C> {
    pub fn new(player: Player<C>, scheduler: Scheduler<Task>, warmup: Duration) -> Self {
        Self {
            player,
            scheduler,
            warmup,
            active_sessions: 0,
        }
    }

    /// Number of tracked sessions currently producing sound.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions
    }

    pub fn state(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn player(&self) -> &Player<C> {
        &self.player
    }

    /// Foreground sound ended: start the warmup if playback is on hold.
    pub fn activate_playback(&mut self) {
        self.refresh();
        if self.player.state() != PlaybackState::Hold {
            tracing::info!(state = %self.player.state(), "playback not on hold; nothing to resume");
            return;
        }
        if let Err(err) = self.player.warmup() {
            tracing::warn!(error = %err, "failed to start warmup");
            return;
        }
        self.scheduler.enter(self.warmup, RESUME_PRIORITY, Task::Resume);
        tracing::info!(warmup_ms = self.warmup.as_millis() as u64, "resume scheduled");
    }

    /// Run a due [`Task::Resume`]. Playback restarted remotely during the
    /// warmup is left alone.
    pub fn resume(&mut self) {
        self.refresh();
        if self.player.state() == PlaybackState::Playing {
            tracing::info!("playback already resumed remotely");
            return;
        }
        if let Err(err) = self.player.resume() {
            tracing::warn!(error = %err, state = %self.player.state(), "failed to resume playback");
        }
    }

    fn refresh(&mut self) {
        match self.player.refresh() {
            Ok(Some(playback)) => tracing::debug!(
                is_playing = playback.is_playing,
                device_id = playback.device_id.as_deref().unwrap_or("-"),
                track = playback.track.as_deref().unwrap_or("-"),
                "remote playback"
            ),
            Ok(None) => tracing::debug!("no remote playback"),
            Err(err) => {
                tracing::warn!(error = %err, state = %self.player.state(), "playback refresh failed")
            }
        }
    }

    fn decrement(&mut self) {
        match self.active_sessions.checked_sub(1) {
            Some(count) => self.active_sessions = count,
            None => tracing::warn!("active session count would drop below zero"),
        }
    }

    fn cancel_resume(&mut self) -> usize {
        let cancelled = self.scheduler.cancel_where(|task| *task == Task::Resume);
        if cancelled > 0 {
            tracing::info!(cancelled, "pending resume cancelled");
        }
        cancelled
    }

    /// Resume once no foreground session is left.
    fn settle(&mut self) {
        if self.active_sessions > 0 {
            tracing::debug!(active = self.active_sessions, "foreground sound still active");
            return;
        }
        self.activate_playback();
    }
}

impl<C: PlaybackClient> SessionHooks for PlaybackController<C> {
    fn on_discovered_active(&mut self) {
        self.active_sessions += 1;
        tracing::debug!(active = self.active_sessions, "discovered active session");
        if self.cancel_resume() > 0 && self.player.state() == PlaybackState::Warmup {
            if let Err(err) = self.player.hold() {
                tracing::warn!(error = %err, "failed to put playback on hold");
            }
        }
    }

    fn on_active(&mut self) {
        self.active_sessions += 1;
        self.refresh();
        if matches!(
            self.player.state(),
            PlaybackState::Playing | PlaybackState::Warmup
        ) {
            if let Err(err) = self.player.hold() {
                tracing::warn!(error = %err, "failed to put playback on hold");
            }
        }
        self.cancel_resume();
    }

    fn on_inactive(&mut self) {
        self.decrement();
        self.settle();
    }

    fn on_expired(&mut self, last_known: SessionState) {
        if last_known == SessionState::Active {
            self.decrement();
        }
        self.settle();
    }
}
