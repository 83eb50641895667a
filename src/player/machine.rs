use serde::Serialize;
use tracing::{debug, warn};

use super::PlayerConfig;

/// Lifecycle of the single audio resource behind a player view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlayerState {
    Unloaded,
    Loading,
    Ready { playing: bool },
}

/// Everything that can happen to a player: user controls, viewport and media
/// callbacks, and completions of async work the machine asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    RequestPlay,
    TogglePlayPause,
    SetVolume(f32),
    ToggleMute,
    ViewportEntered,
    Ended,
    LoadSucceeded,
    LoadFailed(String),
    PlaybackStarted,
    PlaybackRejected(String),
    Teardown,
}

/// Side effects the driver must carry out, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartLoad,
    CancelLoad,
    // hand the fetched track to the media element
    Attach,
    // drop a track that finished loading after it stopped being wanted
    Discard,
    ApplyVolume(f32),
    Seek(f64),
    Play,
    Pause,
    Release,
}

/// Observable view of a player session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSession {
    #[serde(flatten)]
    pub state: PlayerState,
    pub is_playing: bool,
    pub is_loaded: bool,
    pub volume: f32,
    pub is_muted: bool,
    pub playback_position_seconds: f64,
    pub last_error: Option<String>,
}

impl AudioSession {
    // output level actually sent to the element
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted { 0.0 } else { self.volume }
    }
}

pub struct PlayerMachine {
    state: PlayerState,
    volume: f32,
    muted: bool,
    start_offset: f64,
    default_volume: f32,
    autoplay: bool,
    last_error: Option<String>,
}

impl PlayerMachine {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            state: PlayerState::Unloaded,
            volume: clamp_volume(config.default_volume),
            muted: config.start_muted,
            start_offset: config.start_offset_secs,
            default_volume: clamp_volume(config.default_volume),
            autoplay: config.autoplay,
            last_error: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn snapshot(&self) -> AudioSession {
        AudioSession {
            state: self.state,
            is_playing: matches!(self.state, PlayerState::Ready { playing: true }),
            is_loaded: matches!(self.state, PlayerState::Ready { .. }),
            volume: self.volume,
            is_muted: self.muted,
            playback_position_seconds: self.start_offset,
            last_error: self.last_error.clone(),
        }
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    // every start goes back to the fixed offset, including loop restarts
    fn start_from_offset(&self) -> Vec<Effect> {
        vec![Effect::Seek(self.start_offset), Effect::Play]
    }

    /// Applies one event and returns the effects it requires.
    pub fn handle(&mut self, event: PlayerEvent) -> Vec<Effect> {
        use PlayerState::*;

        debug!(?event, state = ?self.state, "player event");

        match (self.state, event) {
            (Unloaded, PlayerEvent::RequestPlay | PlayerEvent::TogglePlayPause) => {
                self.state = Loading;
                self.last_error = None;
                vec![Effect::StartLoad]
            }
            // already fetching
            (Loading, PlayerEvent::RequestPlay | PlayerEvent::TogglePlayPause) => Vec::new(),
            (Ready { playing: false }, PlayerEvent::RequestPlay | PlayerEvent::TogglePlayPause) => {
                self.start_from_offset()
            }
            (Ready { playing: true }, PlayerEvent::RequestPlay) => Vec::new(),
            (Ready { playing: true }, PlayerEvent::TogglePlayPause) => {
                self.state = Ready { playing: false };
                vec![Effect::Pause]
            }

            (Unloaded, PlayerEvent::ViewportEntered) if self.autoplay => {
                self.handle(PlayerEvent::RequestPlay)
            }
            (_, PlayerEvent::ViewportEntered) => Vec::new(),

            (Loading, PlayerEvent::LoadSucceeded) => {
                self.state = Ready { playing: false };
                let mut effects = vec![Effect::Attach, Effect::ApplyVolume(self.effective_volume())];
                effects.extend(self.start_from_offset());
                effects
            }
            (_, PlayerEvent::LoadSucceeded) => vec![Effect::Discard],
            (Loading, PlayerEvent::LoadFailed(reason)) => {
                warn!("Audio failed to load: {reason}");
                self.state = Unloaded;
                self.last_error = Some(reason);
                Vec::new()
            }
            (_, PlayerEvent::LoadFailed(_)) => Vec::new(),

            (Ready { .. }, PlayerEvent::PlaybackStarted) => {
                self.state = Ready { playing: true };
                Vec::new()
            }
            (_, PlayerEvent::PlaybackStarted) => Vec::new(),
            (state, PlayerEvent::PlaybackRejected(reason)) => {
                // autoplay policy or a network hiccup, the next toggle retries
                warn!("Playback blocked: {reason}");
                if let Ready { .. } = state {
                    self.state = Ready { playing: false };
                }
                Vec::new()
            }

            (Ready { playing: true }, PlayerEvent::Ended) => self.start_from_offset(),
            (_, PlayerEvent::Ended) => Vec::new(),

            (state, PlayerEvent::SetVolume(v)) => {
                self.volume = clamp_volume(v);
                self.muted = self.volume == 0.0;
                self.apply_volume_if_ready(state)
            }
            (state, PlayerEvent::ToggleMute) => {
                if self.muted {
                    if self.volume == 0.0 {
                        self.volume = self.default_volume;
                    }
                    self.muted = false;
                } else {
                    self.muted = true;
                }
                self.apply_volume_if_ready(state)
            }

            (Unloaded, PlayerEvent::Teardown) => Vec::new(),
            (Loading, PlayerEvent::Teardown) => {
                self.state = Unloaded;
                vec![Effect::CancelLoad]
            }
            (Ready { playing }, PlayerEvent::Teardown) => {
                self.state = Unloaded;
                if playing {
                    vec![Effect::Pause, Effect::Release]
                } else {
                    vec![Effect::Release]
                }
            }
        }
    }

    fn apply_volume_if_ready(&self, state: PlayerState) -> Vec<Effect> {
        match state {
            PlayerState::Ready { .. } => vec![Effect::ApplyVolume(self.effective_volume())],
            _ => Vec::new(),
        }
    }
}

fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
