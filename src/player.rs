use std::io;
use std::sync::mpsc::SyncSender;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::types::BgEvent;

pub type PlayerId = u64;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{0} stdout unavailable")]
    NoStdout(&'static str),
    #[error("{program} output is not valid UTF-8")]
    Encoding { program: &'static str },
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum ResizeMode {
    /// Fill the area, cropping overflow.
    #[default]
    Cover,
    /// Fit inside the area, letterboxing the rest.
    Contain,
}

impl ResizeMode {
    pub fn toggled(self) -> Self {
        match self {
            ResizeMode::Cover => ResizeMode::Contain,
            ResizeMode::Contain => ResizeMode::Cover,
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub struct BufferConfig {
    pub min_buffer_ms: u64,
    pub max_buffer_ms: u64,
    pub buffer_for_playback_ms: u64,
    pub buffer_for_playback_after_rebuffer_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_buffer_ms: 15_000,
            max_buffer_ms: 50_000,
            buffer_for_playback_ms: 2_500,
            buffer_for_playback_after_rebuffer_ms: 5_000,
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(5_000),
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct PlayerOptions {
    pub muted: bool,
    pub repeat: bool,
    pub resize_mode: ResizeMode,
    pub buffer: BufferConfig,
    pub retry: RetryPolicy,
    pub progress_interval: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            muted: false,
            repeat: true,
            resize_mode: ResizeMode::Cover,
            buffer: BufferConfig::default(),
            retry: RetryPolicy::default(),
            progress_interval: Duration::from_millis(250),
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug, Default)]
pub struct LoadMetadata {
    pub duration: f64,
    pub width: usize,
    pub height: usize,
}

/// Everything a player reports back to the surface that owns it.
#[derive(PartialEq, Clone, Debug)]
pub enum PlaybackSignal {
    LoadStart,
    Load(LoadMetadata),
    Progress { current_time: f64 },
    Buffer { is_buffering: bool },
    Error(String),
    End,
}

/// Grayscale frame sized to the player's viewport.
#[derive(Clone, Debug, Default)]
pub struct VideoFrame {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty() || self.width == 0 || self.height == 0
    }
}

/// The surface a media component exposes to the coordinators.
///
/// Players start paused. Signals travel through the [`BgEvent`] channel
/// tagged with the player id and session, and come back through
/// [`MediaPlayer::handle_signal`] before anything else sees them so the
/// player can absorb its own retries and loops.
pub trait MediaPlayer {
    fn id(&self) -> PlayerId;
    fn session(&self) -> u64;
    fn set_paused(&mut self, paused: bool);
    fn is_paused(&self) -> bool;
    fn seek(&mut self, offset_seconds: f64);
    fn current_time(&self) -> f64;
    fn set_viewport(&mut self, width: u16, height: u16);
    fn set_resize_mode(&mut self, mode: ResizeMode);
    fn frame(&self) -> Option<VideoFrame>;
    fn tick(&mut self, now: Instant);
    fn handle_signal(&mut self, signal: PlaybackSignal, now: Instant) -> Option<PlaybackSignal>;
    fn stop(&mut self);
}

pub trait PlayerFactory {
    fn create(
        &mut self,
        source: &str,
        options: PlayerOptions,
        tx: SyncSender<BgEvent>,
    ) -> Box<dyn MediaPlayer>;
}
