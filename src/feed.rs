//! Shorts feed: which item may play, and when.
//!
//! Playback eligibility is never stored per item. It is derived from
//! `active_index` and `screen_paused` on every read, so two items can never
//! both believe they are active.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::VideoItem;
use crate::config::Timings;
use crate::navigation::RouteParams;
use crate::player::PlaybackSignal;
use crate::scheduler::{Scheduler, TimerHandle};

pub const HERO_ITEM_ID: &str = "hero-video";

/// Video identity and offset carried from the home hero into the feed.
#[derive(PartialEq, Clone, Debug)]
pub struct HandoffPayload {
    pub video_url: String,
    pub current_time: f64,
}

impl HandoffPayload {
    /// Missing or blank URLs mean plain catalog browsing. A missing, negative
    /// or non-finite offset is read as the start of the video.
    pub fn from_params(params: Option<&RouteParams>) -> Option<Self> {
        let url = params?.video_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        let current_time = params
            .and_then(|p| p.current_time)
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(0.0);

        Some(Self {
            video_url: url.to_string(),
            current_time,
        })
    }

    pub fn to_params(&self) -> RouteParams {
        RouteParams {
            video_url: Some(self.video_url.clone()),
            current_time: Some(self.current_time),
        }
    }

    pub fn hero_item(&self) -> VideoItem {
        VideoItem {
            id: HERO_ITEM_ID.to_string(),
            video_url: self.video_url.clone(),
            current_time: Some(self.current_time),
            title: None,
            description: None,
        }
    }
}

/// Handoff item first, then the catalog minus anything with the same URL.
pub fn build_items(catalog: &[VideoItem], handoff: Option<&HandoffPayload>) -> Vec<VideoItem> {
    let Some(handoff) = handoff else {
        return catalog.to_vec();
    };

    std::iter::once(handoff.hero_item())
        .chain(
            catalog
                .iter()
                .filter(|v| v.video_url != handoff.video_url)
                .cloned(),
        )
        .collect()
}

#[derive(PartialEq, Clone, Copy, Debug, Default)]
pub enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Ready,
}

/// Load and buffer progress of one item. Only drives the spinner.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct ItemPlayback {
    pub phase: LoadPhase,
    pub buffering: bool,
    pub position: f64,
    pub duration: f64,
}

impl ItemPlayback {
    pub fn shows_spinner(&self) -> bool {
        self.phase != LoadPhase::Ready || self.buffering
    }

    fn apply(mut self, signal: &PlaybackSignal) -> Self {
        match signal {
            PlaybackSignal::LoadStart => self.phase = LoadPhase::Loading,
            PlaybackSignal::Load(meta) => {
                self.phase = LoadPhase::Ready;
                self.duration = meta.duration;
            }
            PlaybackSignal::Buffer { is_buffering } => self.buffering = *is_buffering,
            PlaybackSignal::Progress { current_time } => self.position = *current_time,
            // Errors leave the item where it was; a stuck spinner is the only trace.
            PlaybackSignal::Error(_) | PlaybackSignal::End => {}
        }
        self
    }
}

#[derive(PartialEq, Clone, Debug, Default)]
pub struct FeedState {
    pub items: Vec<VideoItem>,
    pub active_index: usize,
    pub screen_paused: bool,
    pub playback: HashMap<String, ItemPlayback>,
}

impl FeedState {
    pub fn new(items: Vec<VideoItem>, screen_paused: bool) -> Self {
        Self {
            items,
            active_index: 0,
            screen_paused,
            playback: HashMap::new(),
        }
    }

    pub fn should_play(&self, index: usize) -> bool {
        index < self.items.len() && index == self.active_index && !self.screen_paused
    }

    pub fn playing_index(&self) -> Option<usize> {
        self.should_play(self.active_index)
            .then_some(self.active_index)
    }

    pub fn playback(&self, item_id: &str) -> ItemPlayback {
        self.playback.get(item_id).cloned().unwrap_or_default()
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum FeedEvent {
    /// Positions at or above the visibility threshold, in list order.
    ViewableItemsChanged(Vec<usize>),
    Focus,
    Blur,
    Playback {
        item_id: String,
        signal: PlaybackSignal,
    },
}

pub fn reduce(mut state: FeedState, event: &FeedEvent) -> FeedState {
    match event {
        FeedEvent::ViewableItemsChanged(viewable) => {
            if let Some(&first) = viewable.first()
                && first < state.items.len()
            {
                state.active_index = first;
            }
        }
        FeedEvent::Focus => state.screen_paused = false,
        FeedEvent::Blur => state.screen_paused = true,
        FeedEvent::Playback { item_id, signal } => {
            if state.items.iter().any(|v| &v.id == item_id) {
                let current = state.playback.remove(item_id).unwrap_or_default();
                state.playback.insert(item_id.clone(), current.apply(signal));
            }
        }
    }
    state
}

#[derive(PartialEq, Clone, Debug)]
pub enum FeedEffect {
    /// Items were rebuilt; every player the surface holds is stale.
    Rebuilt,
    ScrollToIndex(usize),
    Seek { item_id: String, offset: f64 },
}

#[derive(Debug)]
enum FeedTask {
    Seek { item_id: String, offset: f64 },
}

/// Owns the [`FeedState`] and the feed's timers.
#[derive(Debug)]
pub struct FeedCoordinator {
    catalog: Vec<VideoItem>,
    state: FeedState,
    seek_delay: Duration,
    seek_lead: f64,
    scheduler: Scheduler<FeedTask>,
    mounted: HashMap<String, Option<TimerHandle>>,
}

impl FeedCoordinator {
    pub fn new(catalog: Vec<VideoItem>, timings: &Timings) -> Self {
        let state = FeedState::new(catalog.clone(), false);
        Self {
            catalog,
            state,
            seek_delay: timings.seek_delay,
            seek_lead: timings.seek_lead,
            scheduler: Scheduler::new(),
            mounted: HashMap::new(),
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn should_play(&self, index: usize) -> bool {
        self.state.should_play(index)
    }

    /// Rebuilds the list from fresh navigation params.
    pub fn receive_params(&mut self, params: Option<&RouteParams>) -> Vec<FeedEffect> {
        let handoff = HandoffPayload::from_params(params);
        let items = build_items(&self.catalog, handoff.as_ref());

        self.scheduler.cancel_all();
        self.mounted.clear();
        self.state = FeedState::new(items, self.state.screen_paused);

        let mut effects = vec![FeedEffect::Rebuilt];
        if let Some(handoff) = handoff {
            info!(
                url = %handoff.video_url,
                current_time = handoff.current_time,
                items = self.state.items.len(),
                "feed rebuilt from handoff"
            );
            if !self.state.items.is_empty() {
                self.state.active_index = 0;
                effects.push(FeedEffect::ScrollToIndex(0));
            }
        }
        effects
    }

    pub fn dispatch(&mut self, event: FeedEvent) {
        if let FeedEvent::Playback {
            item_id,
            signal: PlaybackSignal::Error(reason),
        } = &event
        {
            warn!(item = %item_id, error = %reason, "video error");
        }
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, &event);
    }

    pub fn on_focus(&mut self) {
        self.dispatch(FeedEvent::Focus);
    }

    pub fn on_blur(&mut self) {
        self.dispatch(FeedEvent::Blur);
    }

    pub fn on_viewable_items(&mut self, viewable: Vec<usize>) {
        let before = self.state.active_index;
        self.dispatch(FeedEvent::ViewableItemsChanged(viewable));
        if self.state.active_index != before {
            debug!(from = before, to = self.state.active_index, "active item changed");
        }
    }

    pub fn on_playback(&mut self, item_id: &str, signal: PlaybackSignal) {
        self.dispatch(FeedEvent::Playback {
            item_id: item_id.to_string(),
            signal,
        });
    }

    /// Items that should own a live player: the active one and its neighbours.
    pub fn mount_window(&self) -> Vec<&VideoItem> {
        let items = &self.state.items;
        let start = self.state.active_index.saturating_sub(1).min(items.len());
        let end = (self.state.active_index + 2).min(items.len());
        items[start..end].iter().collect()
    }

    pub fn on_item_mounted(&mut self, item_id: &str, now: Instant) {
        if self.mounted.contains_key(item_id) {
            return;
        }
        let seek = self
            .state
            .items
            .iter()
            .find(|v| v.id == item_id)
            .and_then(|v| v.current_time)
            .filter(|t| *t > 0.0)
            .map(|t| {
                self.scheduler.schedule(
                    now,
                    self.seek_delay,
                    FeedTask::Seek {
                        item_id: item_id.to_string(),
                        offset: t + self.seek_lead,
                    },
                )
            });
        self.mounted.insert(item_id.to_string(), seek);
    }

    pub fn on_item_unmounted(&mut self, item_id: &str) {
        if let Some(Some(handle)) = self.mounted.remove(item_id) {
            self.scheduler.cancel(handle);
        }
    }

    #[cfg(test)]
    pub fn is_mounted(&self, item_id: &str) -> bool {
        self.mounted.contains_key(item_id)
    }

    pub fn tick(&mut self, now: Instant) -> Vec<FeedEffect> {
        let mut effects = Vec::new();
        for task in self.scheduler.take_due(now) {
            match task {
                FeedTask::Seek { item_id, offset } => match self.mounted.get_mut(&item_id) {
                    Some(handle) => {
                        *handle = None;
                        effects.push(FeedEffect::Seek { item_id, offset });
                    }
                    None => debug!(item = %item_id, "seek target gone"),
                },
            }
        }
        effects
    }

    #[cfg(test)]
    pub fn has_pending_timers(&self) -> bool {
        !self.scheduler.is_empty()
    }

    pub fn teardown(&mut self) {
        self.scheduler.cancel_all();
        self.mounted.clear();
    }
}
