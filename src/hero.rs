//! Home hero: poster, delayed cross-fade into a muted preview, and the
//! handoff of the preview's position to the shorts feed.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::HeroFeature;
use crate::config::Timings;
use crate::feed::HandoffPayload;
use crate::player::PlaybackSignal;
use crate::scheduler::{Scheduler, TimerHandle};

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum HeroPhase {
    Poster,
    Fading { started: Instant },
    Video,
}

#[derive(PartialEq, Clone, Debug)]
pub enum HeroEffect {
    /// Hand the payload to the feed ahead of the transition.
    PreloadParams(HandoffPayload),
    Navigate(HandoffPayload),
}

#[derive(Debug)]
enum HeroTask {
    Reveal,
    Reactivate,
    Navigate(HandoffPayload),
}

#[derive(Debug)]
pub struct HeroController {
    feature: HeroFeature,
    timings: Timings,
    scheduler: Scheduler<HeroTask>,
    phase: HeroPhase,
    playing: bool,
    focused: bool,
    loading: bool,
    current_time: f64,
    reactivate: Option<TimerHandle>,
    navigate: Option<TimerHandle>,
}

impl HeroController {
    pub fn new(feature: HeroFeature, timings: Timings) -> Self {
        Self {
            feature,
            timings,
            scheduler: Scheduler::new(),
            phase: HeroPhase::Poster,
            playing: false,
            focused: false,
            loading: true,
            current_time: 0.0,
            reactivate: None,
            navigate: None,
        }
    }

    pub fn mount(&mut self, now: Instant, focused: bool) {
        self.focused = focused;
        self.scheduler
            .schedule(now, self.timings.reveal_delay, HeroTask::Reveal);
    }

    pub fn feature(&self) -> &HeroFeature {
        &self.feature
    }

    pub fn phase(&self) -> HeroPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn should_play(&self) -> bool {
        self.focused && self.playing
    }

    pub fn on_blur(&mut self) {
        self.focused = false;
        self.playing = false;
        if let Some(handle) = self.reactivate.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn on_focus(&mut self, now: Instant) {
        self.focused = true;
        if let Some(handle) = self.reactivate.take() {
            self.scheduler.cancel(handle);
        }
        self.reactivate = Some(self.scheduler.schedule(
            now,
            self.timings.refocus_delay,
            HeroTask::Reactivate,
        ));
    }

    pub fn on_playback(&mut self, signal: &PlaybackSignal) {
        match signal {
            PlaybackSignal::Progress { current_time } => self.current_time = *current_time,
            PlaybackSignal::LoadStart => {
                debug!("hero load start");
                self.loading = true;
            }
            PlaybackSignal::Load(meta) => {
                debug!(
                    duration = meta.duration,
                    width = meta.width,
                    height = meta.height,
                    "hero loaded"
                );
                self.loading = false;
            }
            PlaybackSignal::Buffer { is_buffering } => debug!(is_buffering, "hero buffer"),
            PlaybackSignal::Error(reason) => warn!(error = %reason, "hero video error"),
            PlaybackSignal::End => {}
        }
    }

    /// Captures the preview position now; the actual switch happens after
    /// the handoff delay.
    pub fn trigger_handoff(&mut self, now: Instant) -> Vec<HeroEffect> {
        let payload = HandoffPayload {
            video_url: self.feature.video_url.clone(),
            current_time: self.current_time,
        };
        info!(current_time = payload.current_time, "hero handoff requested");

        if let Some(handle) = self.navigate.take() {
            self.scheduler.cancel(handle);
        }
        self.navigate = Some(self.scheduler.schedule(
            now,
            self.timings.handoff_delay,
            HeroTask::Navigate(payload.clone()),
        ));
        vec![HeroEffect::PreloadParams(payload)]
    }

    pub fn tick(&mut self, now: Instant) -> Vec<HeroEffect> {
        if let HeroPhase::Fading { started } = self.phase
            && now.saturating_duration_since(started) >= self.timings.fade
        {
            self.phase = HeroPhase::Video;
        }

        let mut effects = Vec::new();
        for task in self.scheduler.take_due(now) {
            match task {
                HeroTask::Reveal => {
                    self.phase = HeroPhase::Fading { started: now };
                    if self.focused {
                        self.playing = true;
                    }
                }
                HeroTask::Reactivate => {
                    self.reactivate = None;
                    self.playing = true;
                }
                HeroTask::Navigate(payload) => {
                    self.navigate = None;
                    effects.push(HeroEffect::Navigate(payload));
                    self.playing = false;
                }
            }
        }
        effects
    }

    /// `(poster, video)` opacity in `0.0..=1.0`.
    pub fn opacity(&self, now: Instant) -> (f32, f32) {
        match self.phase {
            HeroPhase::Poster => (1.0, 0.0),
            HeroPhase::Video => (0.0, 1.0),
            HeroPhase::Fading { started } => {
                let fade = self.timings.fade.as_secs_f32();
                let t = if fade > 0.0 {
                    (now.saturating_duration_since(started).as_secs_f32() / fade).min(1.0)
                } else {
                    1.0
                };
                (1.0 - t, t)
            }
        }
    }

    #[cfg(test)]
    pub fn has_pending_timers(&self) -> bool {
        !self.scheduler.is_empty()
    }

    pub fn teardown(&mut self) {
        self.scheduler.cancel_all();
        self.reactivate = None;
        self.navigate = None;
        self.playing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::LoadMetadata;
    use std::time::Duration;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn hero() -> HeroController {
        HeroController::new(
            HeroFeature {
                poster: "poster.jpg".into(),
                video_url: "hero.mp4".into(),
            },
            Timings::default(),
        )
    }

    #[test]
    fn poster_fades_into_video_after_delay() {
        let t0 = Instant::now();
        let mut h = hero();
        h.mount(t0, true);

        h.tick(t0 + ms(2999));
        assert_eq!(h.phase(), HeroPhase::Poster);
        assert_eq!(h.opacity(t0 + ms(2999)), (1.0, 0.0));
        assert!(!h.should_play());

        h.tick(t0 + ms(3000));
        assert!(matches!(h.phase(), HeroPhase::Fading { .. }));
        assert!(h.should_play());
        let (poster, video) = h.opacity(t0 + ms(3250));
        assert!((poster - 0.5).abs() < 1e-3);
        assert!((video - 0.5).abs() < 1e-3);

        h.tick(t0 + ms(3500));
        assert_eq!(h.phase(), HeroPhase::Video);
        assert_eq!(h.opacity(t0 + ms(3500)), (0.0, 1.0));
    }

    #[test]
    fn reveal_while_unfocused_fades_without_playing() {
        let t0 = Instant::now();
        let mut h = hero();
        h.mount(t0, true);
        h.on_blur();

        h.tick(t0 + ms(3000));
        assert!(matches!(h.phase(), HeroPhase::Fading { .. }));
        assert!(!h.should_play());
    }

    #[test]
    fn blur_stops_at_once_and_focus_resumes_late() {
        let t0 = Instant::now();
        let mut h = hero();
        h.mount(t0, true);
        h.tick(t0 + ms(3000));
        assert!(h.should_play());

        h.on_blur();
        assert!(!h.should_play());

        let back = t0 + ms(10_000);
        h.on_focus(back);
        h.tick(back + ms(3499));
        assert!(!h.should_play());
        h.tick(back + ms(3500));
        assert!(h.should_play());
    }

    #[test]
    fn blur_cancels_pending_reactivation() {
        let t0 = Instant::now();
        let mut h = hero();
        h.mount(t0, false);
        h.tick(t0 + ms(3000));

        h.on_focus(t0 + ms(4000));
        h.on_blur();
        h.tick(t0 + ms(20_000));
        assert!(!h.should_play());
        assert!(!h.has_pending_timers());
    }

    #[test]
    fn handoff_captures_position_at_press_time() {
        let t0 = Instant::now();
        let mut h = hero();
        h.mount(t0, true);
        h.tick(t0 + ms(3000));
        h.on_playback(&PlaybackSignal::Progress { current_time: 42.0 });

        let press = t0 + ms(8000);
        let effects = h.trigger_handoff(press);
        let expected = HandoffPayload {
            video_url: "hero.mp4".into(),
            current_time: 42.0,
        };
        assert_eq!(effects, vec![HeroEffect::PreloadParams(expected.clone())]);

        h.on_playback(&PlaybackSignal::Progress { current_time: 42.4 });
        assert!(h.tick(press + ms(499)).is_empty());
        assert!(h.should_play());

        assert_eq!(
            h.tick(press + ms(500)),
            vec![HeroEffect::Navigate(expected)]
        );
        assert!(!h.should_play());
    }

    #[test]
    fn repeated_press_replaces_pending_handoff() {
        let t0 = Instant::now();
        let mut h = hero();
        h.on_playback(&PlaybackSignal::Progress { current_time: 1.0 });
        h.trigger_handoff(t0);
        h.on_playback(&PlaybackSignal::Progress { current_time: 2.0 });
        h.trigger_handoff(t0 + ms(300));

        assert!(h.tick(t0 + ms(500)).is_empty());
        let effects = h.tick(t0 + ms(800));
        assert_eq!(effects.len(), 1);
        assert!(matches!(
            &effects[0],
            HeroEffect::Navigate(p) if p.current_time == 2.0
        ));
    }

    #[test]
    fn load_signals_toggle_loading_indicator() {
        let mut h = hero();
        assert!(h.is_loading());
        h.on_playback(&PlaybackSignal::Load(LoadMetadata::default()));
        assert!(!h.is_loading());
        h.on_playback(&PlaybackSignal::LoadStart);
        assert!(h.is_loading());
        h.on_playback(&PlaybackSignal::Error("gone".into()));
        assert!(h.is_loading());
    }

    #[test]
    fn teardown_cancels_all_timers() {
        let t0 = Instant::now();
        let mut h = hero();
        h.mount(t0, true);
        h.on_focus(t0);
        h.trigger_handoff(t0);
        h.teardown();

        assert!(!h.has_pending_timers());
        assert!(h.tick(t0 + ms(10_000)).is_empty());
        assert_eq!(h.phase(), HeroPhase::Poster);
    }
}
