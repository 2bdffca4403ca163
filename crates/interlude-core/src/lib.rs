//! Interlude core: pause remote playback while foreground applications make sound.
//!
//! The [`monitor::Monitor`] polls an [`audio::AudioSubsystem`] for sessions of
//! watched processes, tracks their state through [`session::SessionRegistry`]
//! and lets [`controller::PlaybackController`] hold or resume a
//! [`playback::PlaybackClient`]. Everything runs on one thread driven by
//! [`scheduler::Scheduler`].

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod playback;
pub mod player;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::MonitorConfig;
pub use monitor::{Message, Monitor};
