use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::player::ResizeMode;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON catalog file to browse instead of the built-in one
    #[arg(long, env = "REEL_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// URL serving a JSON catalog; takes precedence over --catalog
    #[arg(long, env = "REEL_CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// UI language (en, ko, ja); falls back to $LANG
    #[arg(long, env = "REEL_LOCALE")]
    pub locale: Option<String>,

    #[arg(long, env = "REEL_LOG_FILE", default_value = "reel-tui.log")]
    pub log_file: PathBuf,

    /// Delay between pressing Play and switching to the shorts feed
    #[arg(long, env = "REEL_HANDOFF_DELAY_MS", default_value_t = 500)]
    pub handoff_delay_ms: u64,

    #[arg(long, value_enum, default_value_t = ResizeMode::Cover)]
    pub resize_mode: ResizeMode,
}

/// UI timing knobs for the hero and the feed.
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct Timings {
    /// Poster stays up this long after the home tab mounts.
    pub reveal_delay: Duration,
    pub fade: Duration,
    /// Must exceed `reveal_delay + fade` so a refocused hero never plays mid-fade.
    pub refocus_delay: Duration,
    pub handoff_delay: Duration,
    pub seek_delay: Duration,
    /// Added to a handed-off offset so the already seen frame is skipped.
    pub seek_lead: f64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reveal_delay: Duration::from_millis(3_000),
            fade: Duration::from_millis(500),
            refocus_delay: Duration::from_millis(3_500),
            handoff_delay: Duration::from_millis(500),
            seek_delay: Duration::from_millis(1_000),
            seek_lead: 0.3,
        }
    }
}

impl Timings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            handoff_delay: Duration::from_millis(cli.handoff_delay_ms),
            ..Self::default()
        }
    }
}
