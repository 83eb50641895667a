//! Audio playback controller for the "recent favorite" player view.
//!
//! [`PlayerMachine`] is the whole state machine: one `handle` call per event,
//! returning the [`Effect`]s to perform. [`spawn_player`] runs it on a tokio
//! task that owns the session and talks to the outside world through two
//! seams, a [`TrackLoader`] that fetches the resource and a [`MediaElement`]
//! that plays it.

use std::future::Future;
use thiserror::Error;

mod loader;
mod machine;
mod worker;

pub use loader::HttpTrackLoader;
pub use machine::{AudioSession, Effect, PlayerEvent, PlayerMachine, PlayerState};
pub use worker::{PlayerHandle, spawn_player};

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("failed to load audio: {0}")]
    Load(#[from] reqwest::Error),

    #[error("audio source returned no data")]
    EmptyTrack,

    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),

    #[error("player has been torn down")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub source_url: String,
    // every start and loop restart seeks here
    pub start_offset_secs: f64,
    pub default_volume: f32,
    pub start_muted: bool,
    // start loading and playing when the view scrolls into sight
    pub autoplay: bool,
}

impl PlayerConfig {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            start_offset_secs: 30.0,
            default_volume: 0.5,
            start_muted: true,
            autoplay: true,
        }
    }
}

/// Fetched audio, owned by the element once attached.
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub source_url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub trait TrackLoader: Send + Sync + 'static {
    fn load(&self, url: &str) -> impl Future<Output = Result<LoadedTrack, PlayerError>> + Send;
}

/// The playable output. Only `play` is async since starting playback can be
/// refused by the platform.
pub trait MediaElement: Send + 'static {
    fn attach(&mut self, track: LoadedTrack);
    fn seek(&mut self, position_secs: f64);
    fn set_volume(&mut self, volume: f32);
    fn play(&mut self) -> impl Future<Output = Result<(), PlayerError>> + Send;
    fn pause(&mut self);
    // drop the attached track and anything derived from it
    fn release(&mut self);
}
