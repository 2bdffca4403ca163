//! Interlude: pause Spotify while other applications play sound.
//!
//! The binary wires [`interlude_core`] to the Spotify Web API and, on
//! Windows, to WASAPI audio sessions.

pub mod cli;
pub mod config;
pub mod logging;
pub mod runtime;
pub mod spotify;
pub mod wasapi;
