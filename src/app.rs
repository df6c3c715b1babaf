use crate::catalog::Catalog;
use crate::config::Timings;
use crate::feed::{FeedCoordinator, FeedEffect, HandoffPayload};
use crate::hero::{HeroController, HeroEffect};
use crate::navigation::{NavEvent, Navigator};
use crate::player::{
    MediaPlayer, PlaybackSignal, PlayerFactory, PlayerId, PlayerOptions, ResizeMode, VideoFrame,
};
use crate::types::{BgEvent, Tab};
use crate::ui;
use crate::viewport::{PagedViewport, VisibilityReporter};
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::layout::Rect;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::time::Instant;
use tracing::{debug, info};

pub struct App {
    pub navigator: Navigator,
    pub hero: HeroController,
    hero_player: Box<dyn MediaPlayer>,

    /// Mounted on first focus of the shorts tab.
    pub feed: Option<FeedCoordinator>,
    feed_players: HashMap<String, Box<dyn MediaPlayer>>,
    pub viewport: PagedViewport,

    pub catalog: Catalog,
    pub rail_cursor: Option<usize>,
    pub resize_mode: ResizeMode,

    timings: Timings,
    factory: Box<dyn PlayerFactory>,
    tx: SyncSender<BgEvent>,
    rx: Receiver<BgEvent>,
    feed_area: Rect,
}

impl App {
    pub fn new(
        catalog: Catalog,
        timings: Timings,
        resize_mode: ResizeMode,
        mut factory: Box<dyn PlayerFactory>,
        now: Instant,
    ) -> Self {
        let (tx, rx) = mpsc::sync_channel(64);

        let hero_player = factory.create(
            &catalog.hero.video_url,
            PlayerOptions {
                muted: true,
                resize_mode,
                ..PlayerOptions::default()
            },
            tx.clone(),
        );

        let navigator = Navigator::new(Tab::Home);
        let mut hero = HeroController::new(catalog.hero.clone(), timings);
        hero.mount(now, navigator.is_focused(Tab::Home));

        info!(
            entries = catalog.continue_watching.len(),
            "App initialized"
        );

        Self {
            navigator,
            hero,
            hero_player,
            feed: None,
            feed_players: HashMap::new(),
            viewport: PagedViewport::new(0),
            catalog,
            rail_cursor: None,
            resize_mode,
            timings,
            factory,
            tx,
            rx,
            feed_area: Rect::default(),
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        let areas = ui::areas(Rect::new(0, 0, width, height));
        let hero_area = ui::home_areas(areas.content).hero;
        self.feed_area = areas.content;

        self.hero_player
            .set_viewport(hero_area.width, hero_area.height);
        self.viewport.set_page_height(self.feed_area.height);
        for player in self.feed_players.values_mut() {
            player.set_viewport(self.feed_area.width, self.feed_area.height);
        }
        self.report_visibility();
    }

    pub fn handle_events(&mut self, now: Instant) {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                BgEvent::Playback {
                    player,
                    session,
                    signal,
                } => self.route_signal(player, session, signal, now),
            }
        }
    }

    fn route_signal(
        &mut self,
        player: PlayerId,
        session: u64,
        signal: PlaybackSignal,
        now: Instant,
    ) {
        if player == self.hero_player.id() {
            if session != self.hero_player.session() {
                return;
            }
            if let Some(signal) = self.hero_player.handle_signal(signal, now) {
                self.hero.on_playback(&signal);
            }
            return;
        }

        let Some((item_id, target)) = self
            .feed_players
            .iter_mut()
            .find(|(_, p)| p.id() == player)
        else {
            debug!(player, "signal from unmounted player");
            return;
        };
        if session != target.session() {
            return;
        }
        let item_id = item_id.clone();
        if let Some(signal) = target.handle_signal(signal, now)
            && let Some(feed) = self.feed.as_mut()
        {
            feed.on_playback(&item_id, signal);
        }
    }

    pub fn tick(&mut self, now: Instant) {
        let effects = self.hero.tick(now);
        self.apply_hero_effects(effects, now);

        if self.viewport.advance(now) {
            self.report_visibility();
        }

        let effects = self
            .feed
            .as_mut()
            .map(|feed| feed.tick(now))
            .unwrap_or_default();
        self.apply_feed_effects(effects, now);

        self.sync_feed_players(now);
        self.sync_playback();

        self.hero_player.tick(now);
        for player in self.feed_players.values_mut() {
            player.tick(now);
        }
    }

    /// Returns true when the app should quit.
    pub fn on_key(&mut self, key: KeyCode, modifiers: KeyModifiers, now: Instant) -> bool {
        match key {
            KeyCode::Char('q') => return true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char(c @ '1'..='4') => {
                let tab = Tab::ALL[(c as usize) - ('1' as usize)];
                self.go_to(tab, now);
            }
            KeyCode::Tab => self.go_to(self.navigator.current().next(), now),
            _ => match self.navigator.current() {
                Tab::Home => self.on_home_key(key, now),
                Tab::Shorts => self.on_feed_key(key, now),
                Tab::Reward | Tab::Profile => {}
            },
        }
        false
    }

    fn on_home_key(&mut self, key: KeyCode, now: Instant) {
        let cards = self.catalog.continue_watching.len();
        match key {
            KeyCode::Enter | KeyCode::Char('p') => match self.rail_cursor {
                Some(index) => self.open_card(index, now),
                None => {
                    let effects = self.hero.trigger_handoff(now);
                    self.apply_hero_effects(effects, now);
                }
            },
            KeyCode::Right | KeyCode::Char('l') if cards > 0 => {
                self.rail_cursor = Some(self.rail_cursor.map_or(0, |i| (i + 1).min(cards - 1)));
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.rail_cursor = self.rail_cursor.and_then(|i| i.checked_sub(1));
            }
            KeyCode::Esc => self.rail_cursor = None,
            _ => {}
        }
    }

    fn on_feed_key(&mut self, key: KeyCode, now: Instant) {
        let len = self.feed_len();
        match key {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::PageDown => {
                self.viewport.next_page(len, now)
            }
            KeyCode::Char('k') | KeyCode::Up | KeyCode::PageUp => self.viewport.prev_page(len, now),
            KeyCode::Char('m') => {
                self.resize_mode = self.resize_mode.toggled();
                let mode = self.resize_mode;
                info!(?mode, "resize mode changed");
                self.hero_player.set_resize_mode(mode);
                for player in self.feed_players.values_mut() {
                    player.set_resize_mode(mode);
                }
            }
            _ => {}
        }
    }

    fn go_to(&mut self, tab: Tab, now: Instant) {
        let events = self.navigator.navigate(tab, None);
        self.process_nav_events(events, now);
    }

    fn open_card(&mut self, index: usize, now: Instant) {
        let Some(entry) = self.catalog.continue_watching.get(index) else {
            return;
        };
        let payload = HandoffPayload {
            video_url: entry.video_url.clone(),
            current_time: 0.0,
        };
        info!(id = %entry.id, "opening card in shorts");
        let events = self
            .navigator
            .navigate(Tab::Shorts, Some(payload.to_params()));
        self.process_nav_events(events, now);
    }

    fn apply_hero_effects(&mut self, effects: Vec<HeroEffect>, now: Instant) {
        for effect in effects {
            let events = match effect {
                HeroEffect::PreloadParams(payload) => {
                    self.navigator.set_params(Tab::Shorts, payload.to_params())
                }
                HeroEffect::Navigate(payload) => {
                    info!(current_time = payload.current_time, "handing off to shorts");
                    let params = payload.to_params();
                    // The preload already rebuilt the feed from this payload.
                    let fresh = (self.navigator.params(Tab::Shorts) != Some(&params))
                        .then_some(params);
                    self.navigator.navigate(Tab::Shorts, fresh)
                }
            };
            self.process_nav_events(events, now);
        }
    }

    fn process_nav_events(&mut self, events: Vec<NavEvent>, now: Instant) {
        for event in events {
            debug!(?event, "navigation");
            match event {
                NavEvent::ParamsChanged(Tab::Shorts) => {
                    let params = self.navigator.params(Tab::Shorts).cloned();
                    if let Some(feed) = self.feed.as_mut() {
                        let effects = feed.receive_params(params.as_ref());
                        self.apply_feed_effects(effects, now);
                    }
                }
                NavEvent::Blur(Tab::Home) => self.hero.on_blur(),
                NavEvent::Focus(Tab::Home) => self.hero.on_focus(now),
                NavEvent::Blur(Tab::Shorts) => {
                    if let Some(feed) = self.feed.as_mut() {
                        feed.on_blur();
                    }
                }
                NavEvent::Focus(Tab::Shorts) => self.focus_feed(now),
                _ => {}
            }
        }
        // Focus changes take effect on the players right away, not on the next tick.
        self.sync_playback();
    }

    fn focus_feed(&mut self, now: Instant) {
        if self.feed.is_none() {
            let mut feed = FeedCoordinator::new(self.catalog.feed_items(), &self.timings);
            let params = self.navigator.params(Tab::Shorts).cloned();
            let effects = feed.receive_params(params.as_ref());
            self.feed = Some(feed);
            info!("feed mounted");
            self.apply_feed_effects(effects, now);
        }
        if let Some(feed) = self.feed.as_mut() {
            feed.on_focus();
        }
    }

    fn apply_feed_effects(&mut self, effects: Vec<FeedEffect>, now: Instant) {
        if effects.is_empty() {
            return;
        }
        let len = self.feed_len();
        for effect in effects {
            match effect {
                FeedEffect::Rebuilt => {
                    for (_, mut player) in self.feed_players.drain() {
                        player.stop();
                    }
                    if self.viewport.target_page() >= len {
                        self.viewport
                            .scroll_to_index(len.saturating_sub(1), len, now, false);
                    }
                }
                FeedEffect::ScrollToIndex(index) => {
                    self.viewport.scroll_to_index(index, len, now, false)
                }
                FeedEffect::Seek { item_id, offset } => match self.feed_players.get_mut(&item_id) {
                    Some(player) => {
                        info!(item = %item_id, offset, "seeking handed-off video");
                        player.seek(offset);
                    }
                    None => debug!(item = %item_id, "seek target not mounted"),
                },
            }
        }
        self.report_visibility();
    }

    fn report_visibility(&mut self) {
        if let Some(feed) = self.feed.as_mut() {
            let viewable = self.viewport.viewable_items(feed.state().items.len());
            feed.on_viewable_items(viewable);
        }
    }

    fn sync_feed_players(&mut self, now: Instant) {
        let Some(feed) = self.feed.as_mut() else {
            return;
        };
        let window: Vec<(String, String)> = feed
            .mount_window()
            .iter()
            .map(|v| (v.id.clone(), v.video_url.clone()))
            .collect();

        let stale: Vec<String> = self
            .feed_players
            .keys()
            .filter(|id| !window.iter().any(|(w, _)| w == *id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(mut player) = self.feed_players.remove(&id) {
                player.stop();
            }
            feed.on_item_unmounted(&id);
        }

        for (id, url) in window {
            if self.feed_players.contains_key(&id) {
                continue;
            }
            let options = PlayerOptions {
                resize_mode: self.resize_mode,
                ..PlayerOptions::default()
            };
            let mut player = self.factory.create(&url, options, self.tx.clone());
            player.set_viewport(self.feed_area.width, self.feed_area.height);
            debug!(item = %id, player = player.id(), "feed item mounted");
            self.feed_players.insert(id.clone(), player);
            feed.on_item_mounted(&id, now);
        }
    }

    fn sync_playback(&mut self) {
        self.hero_player.set_paused(!self.hero.should_play());

        if let Some(feed) = &self.feed {
            for (index, item) in feed.state().items.iter().enumerate() {
                if let Some(player) = self.feed_players.get_mut(&item.id) {
                    player.set_paused(!feed.should_play(index));
                }
            }
        }
    }

    fn feed_len(&self) -> usize {
        self.feed.as_ref().map_or(0, |f| f.state().items.len())
    }

    pub fn hero_frame(&self) -> Option<VideoFrame> {
        self.hero_player.frame()
    }

    pub fn feed_frame(&self, item_id: &str) -> Option<VideoFrame> {
        self.feed_players.get(item_id).and_then(|p| p.frame())
    }

    pub fn feed_player_time(&self, item_id: &str) -> Option<f64> {
        self.feed_players.get(item_id).map(|p| p.current_time())
    }

    pub fn shutdown(&mut self) {
        info!("shutting down");
        self.hero.teardown();
        self.hero_player.stop();
        if let Some(feed) = self.feed.as_mut() {
            feed.teardown();
        }
        for player in self.feed_players.values_mut() {
            player.stop();
        }
    }

    #[cfg(test)]
    fn sender(&self) -> SyncSender<BgEvent> {
        self.tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, HeroFeature};
    use crate::feed::HERO_ITEM_ID;
    use crate::player::fake::{Call, FakeFactory, Shared};
    use crate::player::LoadMetadata;
    use std::rc::Rc;
    use std::time::Duration;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn entry(id: &str, url: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            title: format!("Title {id}"),
            cover: String::new(),
            video_url: url.to_string(),
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            hero: HeroFeature {
                poster: "poster.jpg".into(),
                video_url: "hero.mp4".into(),
            },
            continue_watching: vec![
                entry("a", "a.mp4"),
                entry("b", "hero.mp4"),
                entry("c", "c.mp4"),
            ],
        }
    }

    fn app(t0: Instant) -> (App, FakeFactory) {
        let factory = FakeFactory::default();
        let mut app = App::new(
            catalog(),
            Timings::default(),
            ResizeMode::Cover,
            Box::new(factory.clone()),
            t0,
        );
        app.resize(80, 24);
        (app, factory)
    }

    fn paused(record: &Shared) -> bool {
        record.borrow().paused
    }

    fn feed_ids(app: &App) -> Vec<String> {
        app.feed
            .as_ref()
            .map(|f| f.state().items.iter().map(|v| v.id.clone()).collect())
            .unwrap_or_default()
    }

    fn press(app: &mut App, key: KeyCode, now: Instant) {
        assert!(!app.on_key(key, KeyModifiers::NONE, now));
    }

    #[test]
    fn hero_handoff_resumes_in_the_feed() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        let hero_player = factory.by_source("hero.mp4")[0].clone();
        assert_eq!(
            hero_player.borrow().options.as_ref().map(|o| o.muted),
            Some(true)
        );

        app.tick(t0);
        assert!(paused(&hero_player));
        app.tick(t0 + ms(3000));
        assert!(!paused(&hero_player));

        app.sender()
            .send(BgEvent::Playback {
                player: 1,
                session: 1,
                signal: PlaybackSignal::Progress { current_time: 42.0 },
            })
            .unwrap();
        app.handle_events(t0 + ms(5000));

        press(&mut app, KeyCode::Enter, t0 + ms(5000));
        app.tick(t0 + ms(5499));
        assert_eq!(app.navigator.current(), Tab::Home);

        app.tick(t0 + ms(5500));
        assert_eq!(app.navigator.current(), Tab::Shorts);
        assert!(paused(&hero_player));
        assert_eq!(feed_ids(&app), vec![HERO_ITEM_ID, "a", "c"]);

        let short = factory.live("hero.mp4").unwrap();
        assert!(!Rc::ptr_eq(&short, &hero_player));
        assert!(!paused(&short));

        app.tick(t0 + ms(6499));
        assert!(!short.borrow().calls.iter().any(|c| matches!(c, Call::Seek(_))));
        app.tick(t0 + ms(6500));
        assert!(
            short
                .borrow()
                .calls
                .iter()
                .any(|c| matches!(c, Call::Seek(o) if (o - 42.3).abs() < 1e-9))
        );
    }

    #[test]
    fn scrolling_moves_playback_to_the_next_item() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Char('2'), t0);
        app.tick(t0);

        assert_eq!(feed_ids(&app), vec!["a", "b", "c"]);
        let a = factory.live("a.mp4").unwrap();
        let b = factory.live("hero.mp4").unwrap();
        assert!(!paused(&a));
        assert!(paused(&b));
        assert!(factory.live("c.mp4").is_none());

        press(&mut app, KeyCode::Char('j'), t0);
        app.tick(t0 + ms(200));

        assert_eq!(app.feed.as_ref().unwrap().state().active_index, 1);
        assert!(paused(&a));
        assert!(!paused(&b));
        assert!(factory.live("c.mp4").is_some());
    }

    #[test]
    fn leaving_and_returning_to_shorts() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Char('2'), t0);
        app.tick(t0 + ms(4000));
        let a = factory.live("a.mp4").unwrap();
        let hero_player = factory.by_source("hero.mp4")[0].clone();
        assert!(!paused(&a));
        assert!(paused(&hero_player));

        press(&mut app, KeyCode::Char('1'), t0 + ms(5000));
        assert!(paused(&a));
        assert!(app.feed.as_ref().unwrap().state().screen_paused);

        app.tick(t0 + ms(8499));
        assert!(paused(&hero_player));
        app.tick(t0 + ms(8500));
        assert!(!paused(&hero_player));

        press(&mut app, KeyCode::Tab, t0 + ms(9000));
        assert_eq!(app.navigator.current(), Tab::Shorts);
        assert!(!paused(&a));
        assert!(paused(&hero_player));
    }

    #[test]
    fn rail_card_opens_from_the_start() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Right, t0);
        press(&mut app, KeyCode::Right, t0);
        assert_eq!(app.rail_cursor, Some(1));
        press(&mut app, KeyCode::Left, t0);
        press(&mut app, KeyCode::Enter, t0);

        assert_eq!(app.navigator.current(), Tab::Shorts);
        assert_eq!(feed_ids(&app), vec![HERO_ITEM_ID, "b", "c"]);
        app.tick(t0 + ms(5000));
        let card = factory.live("a.mp4").unwrap();
        assert!(!card.borrow().calls.iter().any(|c| matches!(c, Call::Seek(_))));
    }

    #[test]
    fn second_handoff_rebuilds_and_scrolls_to_top() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Char('2'), t0);
        app.tick(t0);
        press(&mut app, KeyCode::Char('j'), t0);
        press(&mut app, KeyCode::Char('1'), t0 + ms(300));
        app.tick(t0 + ms(300));
        assert_eq!(app.viewport.target_page(), 1);
        let before = factory.count();

        press(&mut app, KeyCode::Enter, t0 + ms(400));
        app.tick(t0 + ms(900));

        assert_eq!(app.navigator.current(), Tab::Shorts);
        assert_eq!(app.viewport.target_page(), 0);
        assert_eq!(app.feed.as_ref().unwrap().state().active_index, 0);
        assert_eq!(feed_ids(&app)[0], HERO_ITEM_ID);
        assert!(factory.count() > before);
    }

    #[test]
    fn stale_sessions_are_ignored() {
        let t0 = Instant::now();
        let (mut app, _factory) = app(t0);
        let tx = app.sender();
        tx.send(BgEvent::Playback {
            player: 1,
            session: 99,
            signal: PlaybackSignal::Load(LoadMetadata::default()),
        })
        .unwrap();
        app.handle_events(t0);
        assert!(app.hero.is_loading());

        tx.send(BgEvent::Playback {
            player: 1,
            session: 1,
            signal: PlaybackSignal::Load(LoadMetadata::default()),
        })
        .unwrap();
        app.handle_events(t0);
        assert!(!app.hero.is_loading());
    }

    #[test]
    fn resize_mode_toggle_reaches_every_player() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Char('2'), t0);
        app.tick(t0);
        press(&mut app, KeyCode::Char('m'), t0);

        assert_eq!(app.resize_mode, ResizeMode::Contain);
        let a = factory.live("a.mp4").unwrap();
        assert!(a.borrow().calls.contains(&Call::Resize(ResizeMode::Contain)));
    }

    #[test]
    fn reopening_the_same_card_returns_to_the_top() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Right, t0);
        press(&mut app, KeyCode::Enter, t0);
        app.tick(t0);
        press(&mut app, KeyCode::Char('j'), t0);
        app.tick(t0 + ms(200));
        assert_eq!(app.feed.as_ref().unwrap().state().active_index, 1);

        press(&mut app, KeyCode::Char('1'), t0 + ms(300));
        press(&mut app, KeyCode::Enter, t0 + ms(400));
        assert_eq!(app.navigator.current(), Tab::Shorts);
        assert_eq!(app.viewport.target_page(), 0);
        assert_eq!(app.feed.as_ref().unwrap().state().active_index, 0);

        app.tick(t0 + ms(400));
        assert_eq!(feed_ids(&app), vec![HERO_ITEM_ID, "b", "c"]);
        assert!(!paused(&factory.live("a.mp4").unwrap()));
    }

    #[test]
    fn replaying_the_hero_with_an_unchanged_position_returns_to_the_top() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Enter, t0);
        app.tick(t0 + ms(500));
        assert_eq!(app.navigator.current(), Tab::Shorts);
        press(&mut app, KeyCode::Char('j'), t0 + ms(500));
        app.tick(t0 + ms(700));
        assert_eq!(app.feed.as_ref().unwrap().state().active_index, 1);

        press(&mut app, KeyCode::Char('1'), t0 + ms(800));
        press(&mut app, KeyCode::Enter, t0 + ms(900));
        app.tick(t0 + ms(1400));

        assert_eq!(app.navigator.current(), Tab::Shorts);
        assert_eq!(app.viewport.target_page(), 0);
        assert_eq!(app.feed.as_ref().unwrap().state().active_index, 0);
        let short = factory.live("hero.mp4").unwrap();
        assert_eq!(short.borrow().options.as_ref().map(|o| o.muted), Some(false));
        assert!(!paused(&short));
    }

    #[test]
    fn quit_and_shutdown_stop_players() {
        let t0 = Instant::now();
        let (mut app, factory) = app(t0);
        press(&mut app, KeyCode::Char('2'), t0);
        app.tick(t0);

        assert!(app.on_key(KeyCode::Char('q'), KeyModifiers::NONE, t0));
        app.shutdown();
        assert!(factory.live("a.mp4").is_none());
        assert!(factory.by_source("hero.mp4").iter().all(|r| r.borrow().stopped));
        assert!(!app.hero.has_pending_timers());
    }
}
