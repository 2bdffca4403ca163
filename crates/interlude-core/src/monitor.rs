//! The monitor loop.
//!
//! Owns the scheduler, the session registry and the playback controller and
//! runs them on the calling thread. Adapter notifications and the shutdown
//! request arrive as [`Message`]s on a crossbeam channel.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::{AudioEvent, AudioSubsystem, Notifier};
use crate::config::MonitorConfig;
use crate::controller::{PlaybackController, REDISCOVER_PRIORITY, Task};
use crate::playback::PlaybackClient;
use crate::player::Player;
use crate::scheduler::{Scheduler, Wakeup};
use crate::session::SessionRegistry;

/// Input delivered to the monitor thread from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Audio(AudioEvent),
    /// Stop the loop and release every session.
    Shutdown,
}

pub struct Monitor<A: AudioSubsystem, C: PlaybackClient> {
    scheduler: Scheduler<Task>,
    registry: SessionRegistry<A>,
    controller: PlaybackController<C>,
    refresh_interval: Duration,
    inbox: Receiver<Message>,
    outbox: Sender<Message>,
}

impl<A: AudioSubsystem, C: PlaybackClient> Monitor<A, C> {
    pub fn new(audio: A, client: C, config: &MonitorConfig) -> Self {
        Self::with_scheduler(audio, client, config, Scheduler::new())
    }

    pub fn with_scheduler(
        audio: A,
        client: C,
        config: &MonitorConfig,
        scheduler: Scheduler<Task>,
    ) -> Self {
        let (outbox, inbox) = crossbeam_channel::unbounded();
        let tx = outbox.clone();
        let notify: Notifier = Arc::new(move |event: AudioEvent| {
            if tx.send(Message::Audio(event)).is_err() {
                tracing::debug!(pid = event.process_id(), "monitor gone; dropping audio event");
            }
        });
        let registry = SessionRegistry::new(audio, config.process_names.clone(), notify);
        let player = Player::new(client, config.device_names.clone());
        let controller =
            PlaybackController::new(player, scheduler.clone(), config.warmup_duration);
        Self {
            scheduler,
            registry,
            controller,
            refresh_interval: config.session_refresh_interval,
            inbox,
            outbox,
        }
    }

    /// Handle for other threads, e.g. a Ctrl-C handler sending [`Message::Shutdown`].
    pub fn sender(&self) -> Sender<Message> {
        self.outbox.clone()
    }

    pub fn controller(&self) -> &PlaybackController<C> {
        &self.controller
    }

    pub fn registry(&self) -> &SessionRegistry<A> {
        &self.registry
    }

    /// Block until [`Message::Shutdown`] arrives, then release all sessions.
    pub fn run(&mut self) {
        tracing::info!(
            processes = ?self.registry.process_names(),
            refresh_ms = self.refresh_interval.as_millis() as u64,
            "monitoring audio sessions"
        );
        self.scheduler
            .enter(Duration::ZERO, REDISCOVER_PRIORITY, Task::Rediscover);
        let scheduler = self.scheduler.clone();
        let inbox = self.inbox.clone();
        scheduler.run(&inbox, |wakeup| self.handle(wakeup));
        self.shutdown();
    }

    /// Process one task or message on the monitor thread.
    pub fn handle(&mut self, wakeup: Wakeup<Task, Message>) -> ControlFlow<()> {
        match wakeup {
            Wakeup::Task(Task::Rediscover) => self.rediscover(),
            Wakeup::Task(Task::Resume) => self.controller.resume(),
            Wakeup::Message(Message::Audio(event)) => {
                self.registry.dispatch(event, &mut self.controller)
            }
            Wakeup::Message(Message::Shutdown) => {
                tracing::info!("shutdown requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn rediscover(&mut self) {
        self.registry.discover(&mut self.controller);
        self.scheduler
            .enter(self.refresh_interval, REDISCOVER_PRIORITY, Task::Rediscover);
    }

    /// Drop pending tasks and unregister every tracked session.
    pub fn shutdown(&mut self) {
        let dropped = self.scheduler.cancel_where(|_| true);
        self.registry.release_all();
        tracing::info!(dropped_tasks = dropped, "monitor stopped");
    }
}
