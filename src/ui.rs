use crate::app::App;
use crate::feed::FeedCoordinator;
use crate::hero::HeroPhase;
use crate::i18n::t;
use crate::player::{ResizeMode, VideoFrame};
use crate::types::Tab;
use crate::utils::{display_name, format_clock, truncate_to_width};
use chrono::Local;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::time::Instant;

const CARD_WIDTH: u16 = 22;
const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];
const RAMP: &[u8] = b" .:-=+*#%@";

#[derive(PartialEq, Clone, Copy, Debug)]
pub struct AppAreas {
    pub tabs: Rect,
    pub content: Rect,
    pub hints: Rect,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub struct HomeAreas {
    pub hero: Rect,
    pub controls: Rect,
    pub rail: Rect,
}

pub fn areas(size: Rect) -> AppAreas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);
    AppAreas {
        tabs: chunks[0],
        content: chunks[1],
        hints: chunks[2],
    }
}

pub fn home_areas(content: Rect) -> HomeAreas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),
            Constraint::Length(3),
            Constraint::Length(6),
        ])
        .split(content);
    HomeAreas {
        hero: chunks[0],
        controls: chunks[1],
        rail: chunks[2],
    }
}

pub fn draw(f: &mut Frame, app: &App, now: Instant) {
    let areas = areas(f.area());

    render_tabs(f, app, areas.tabs);
    match app.navigator.current() {
        Tab::Home => render_home(f, app, areas.content, now),
        Tab::Shorts => render_shorts(f, app, areas.content),
        Tab::Reward => render_placeholder(f, areas.content, t!("placeholder.reward")),
        Tab::Profile => render_placeholder(f, areas.content, t!("placeholder.profile")),
    }
    render_hints(f, app, areas.hints);
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let current = app.navigator.current();
    let mut spans = Vec::with_capacity(Tab::ALL.len() * 2);
    for tab in Tab::ALL {
        let label = format!(" {} {} ", tab.index() + 1, t!(tab.label_key()));
        let style = if tab == current {
            Style::default().bg(Color::Blue).fg(Color::Black).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(label, style));
        spans.push(Span::raw(" "));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).bg(Color::DarkGray),
        area,
    );
}

fn render_hints(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
        .split(area);

    let hints = match app.navigator.current() {
        Tab::Home => t!("hints.home"),
        Tab::Shorts => t!("hints.shorts"),
        Tab::Reward | Tab::Profile => t!("hints.other"),
    };
    f.render_widget(
        Paragraph::new(hints).bg(Color::Black).fg(Color::Gray),
        chunks[0],
    );

    if app.navigator.current() == Tab::Shorts {
        let mode = match app.resize_mode {
            ResizeMode::Cover => "[COVER]",
            ResizeMode::Contain => "[CONTAIN]",
        };
        f.render_widget(
            Paragraph::new(Span::styled(mode, Style::default().fg(Color::Magenta).bold()))
                .alignment(Alignment::Right)
                .bg(Color::Black),
            chunks[1],
        );
    }
}

fn render_home(f: &mut Frame, app: &App, area: Rect, now: Instant) {
    let home = home_areas(area);
    render_hero(f, app, home.hero, now);
    render_hero_controls(f, app, home.controls);
    render_rail(f, app, home.rail);
}

fn render_hero(f: &mut Frame, app: &App, area: Rect, now: Instant) {
    let (poster_opacity, video_opacity) = app.hero.opacity(now);

    match app.hero_frame() {
        Some(frame) if video_opacity > 0.0 => {
            render_frame(f, &frame, area, 0, video_opacity);
        }
        _ => f.render_widget(Block::default().bg(Color::Black), area),
    }

    if poster_opacity > 0.0 {
        let style = if poster_opacity >= 0.5 {
            Style::default().fg(Color::White).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let poster = Paragraph::new(vec![
            Line::from(Span::styled(t!("home.featured"), style)),
            Line::from(Span::styled(display_name(&app.hero.feature().poster), style)),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(style));
        f.render_widget(poster, centered(area, 40, 4));
    }

    if app.hero.phase() != HeroPhase::Poster && area.height > 1 {
        f.render_widget(
            Paragraph::new(Span::styled(
                format!("{} ", format_clock(app.hero.current_time())),
                Style::default().fg(Color::Gray),
            ))
            .alignment(Alignment::Right),
            Rect::new(area.x, area.bottom() - 1, area.width, 1),
        );
    }

    if app.hero.is_loading() && app.hero.phase() != HeroPhase::Poster {
        let spinner = Span::styled(
            format!("{} {}", spinner_frame(), t!("ui.loading")),
            Style::default().fg(Color::Cyan),
        );
        f.render_widget(
            Paragraph::new(spinner).alignment(Alignment::Right),
            Rect::new(area.x, area.y, area.width, area.height.min(1)),
        );
    }
}

fn render_hero_controls(f: &mut Frame, app: &App, area: Rect) {
    let play_focused = app.rail_cursor.is_none();
    let play_style = if play_focused {
        Style::default().bg(Color::White).fg(Color::Black).bold()
    } else {
        Style::default().fg(Color::White)
    };
    let dots = (0..3)
        .map(|i| if i == 0 { "●" } else { "○" })
        .collect::<Vec<_>>()
        .join(" ");

    let lines = vec![
        Line::from(Span::styled(t!("home.tags"), Style::default().fg(Color::Gray))),
        Line::from(Span::styled(format!(" ▶ {} ", t!("home.play")), play_style)),
        Line::from(Span::styled(dots, Style::default().fg(Color::DarkGray))),
    ];
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn render_rail(f: &mut Frame, app: &App, area: Rect) {
    if area.height == 0 {
        return;
    }
    f.render_widget(
        Paragraph::new(Span::styled(
            t!("home.continue_watching"),
            Style::default().fg(Color::White).bold(),
        )),
        Rect::new(area.x, area.y, area.width, 1),
    );

    let cards_area = Rect::new(
        area.x,
        area.y + 1,
        area.width,
        area.height.saturating_sub(1),
    );
    let visible = (cards_area.width / CARD_WIDTH).max(1) as usize;
    let selected = app.rail_cursor.unwrap_or(0);
    let first = (selected + 1).saturating_sub(visible);

    for (slot, (index, entry)) in app
        .catalog
        .continue_watching
        .iter()
        .enumerate()
        .skip(first)
        .take(visible)
        .enumerate()
    {
        let x = cards_area.x + slot as u16 * CARD_WIDTH;
        let width = CARD_WIDTH.min(cards_area.right().saturating_sub(x));
        if width < 4 {
            break;
        }
        let border = if app.rail_cursor == Some(index) {
            Style::default().fg(Color::Yellow).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let inner = width.saturating_sub(2) as usize;
        let card = Paragraph::new(vec![
            Line::from(Span::styled(
                truncate_to_width(&entry.title, inner),
                Style::default().bold(),
            )),
            Line::from(Span::styled(
                truncate_to_width(&display_name(&entry.cover), inner),
                Style::default().fg(Color::Gray),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).border_style(border));
        f.render_widget(card, Rect::new(x, cards_area.y, width, cards_area.height));
    }
}

fn render_shorts(f: &mut Frame, app: &App, area: Rect) {
    let Some(feed) = &app.feed else {
        render_placeholder(f, area, t!("ui.loading"));
        return;
    };
    if feed.state().items.is_empty() {
        render_placeholder(f, area, t!("feed.empty"));
        return;
    }

    let page = area.height as i32;
    for index in 0..feed.state().items.len() {
        let top = area.y as i32 + app.viewport.item_top(index).round() as i32;
        let vis_top = top.max(area.y as i32);
        let vis_bottom = (top + page).min(area.bottom() as i32);
        if vis_top >= vis_bottom {
            continue;
        }
        let visible = Rect::new(
            area.x,
            vis_top as u16,
            area.width,
            (vis_bottom - vis_top) as u16,
        );
        let item_rows = ItemRows {
            top,
            visible,
            height: page,
        };
        render_short(f, app, feed, index, item_rows);
    }
}

/// Placement of one feed item, which may be partly scrolled off.
#[derive(Clone, Copy)]
struct ItemRows {
    top: i32,
    visible: Rect,
    height: i32,
}

impl ItemRows {
    /// Row `offset` of the item, if it is on screen. Negative offsets count from the bottom.
    fn row(&self, offset: i32) -> Option<Rect> {
        let offset = if offset < 0 { self.height + offset } else { offset };
        let y = self.top + offset;
        (y >= self.visible.y as i32 && y < self.visible.bottom() as i32)
            .then(|| Rect::new(self.visible.x, y as u16, self.visible.width, 1))
    }
}

fn render_short(
    f: &mut Frame,
    app: &App,
    feed: &FeedCoordinator,
    index: usize,
    rows: ItemRows,
) {
    let item = &feed.state().items[index];
    let playback = feed.state().playback(&item.id);
    let skip = (rows.visible.y as i32 - rows.top).max(0) as usize;

    match app.feed_frame(&item.id) {
        Some(frame) => render_frame(f, &frame, rows.visible, skip, 1.0),
        None => f.render_widget(Block::default().bg(Color::Black), rows.visible),
    }

    if playback.shows_spinner()
        && let Some(row) = rows.row(rows.height / 2)
    {
        f.render_widget(
            Paragraph::new(Span::styled(
                format!("{} {}", spinner_frame(), t!("ui.buffering")),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
            row,
        );
    }

    let icons = [
        ("♥", t!("feed.like")),
        ("✉", t!("feed.comment")),
        ("↗", t!("feed.share")),
    ];
    for (i, (icon, label)) in icons.iter().enumerate() {
        if let Some(row) = rows.row(rows.height / 2 + 2 + i as i32 * 2) {
            f.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::styled(*icon, Style::default().fg(Color::White).bold()),
                    Span::raw(" "),
                    Span::styled(label.to_string(), Style::default().fg(Color::Gray)),
                ]))
                .alignment(Alignment::Right),
                row,
            );
        }
    }

    let title = item
        .title
        .clone()
        .unwrap_or_else(|| display_name(&item.video_url));
    if let Some(row) = rows.row(-4) {
        f.render_widget(
            Paragraph::new(Span::styled(
                format!(" {}", truncate_to_width(&title, row.width.saturating_sub(2) as usize)),
                Style::default().fg(Color::White).bold(),
            )),
            row,
        );
    }
    if let Some(description) = &item.description
        && let Some(row) = rows.row(-3)
    {
        f.render_widget(
            Paragraph::new(Span::styled(
                format!(" {description}"),
                Style::default().fg(Color::Gray),
            )),
            row,
        );
    }

    if let Some(row) = rows.row(-2) {
        let current = app.feed_player_time(&item.id).unwrap_or(playback.position);
        let playing = feed.state().playing_index() == Some(index);
        render_progress(f, row, current, playback.duration, playing);
    }
}

fn render_progress(f: &mut Frame, area: Rect, current: f64, total: f64, playing: bool) {
    let time_str = format!(" {}/{} ", format_clock(current), format_clock(total));
    let progress_width = (area.width as usize).saturating_sub(time_str.len() + 4);
    let progress = if total > 0.0 {
        (current / total * progress_width as f64).round() as usize
    } else {
        0
    };
    let progress = progress.min(progress_width);

    let filled = "━".repeat(progress);
    let empty = " ".repeat(progress_width.saturating_sub(progress));
    let state = if playing { "▶" } else { "⏸" };

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(format!(" {state} "), Style::default().fg(Color::White)),
            Span::styled(format!("{filled}{empty}"), Style::default().fg(Color::Green)),
            Span::styled(time_str, Style::default().fg(Color::Cyan)),
        ])),
        area,
    );
}

/// Draws a grayscale frame as shaded characters, skipping the first
/// `skip_rows` rows of the picture and dimming by `opacity`.
fn render_frame(f: &mut Frame, frame: &VideoFrame, area: Rect, skip_rows: usize, opacity: f32) {
    let term_w = area.width as usize;
    let term_h = area.height as usize;
    if frame.is_empty() || term_w == 0 {
        return;
    }
    let (src_w, src_h) = (frame.width, frame.height);
    let full_h = term_h + skip_rows;

    let mut lines = Vec::with_capacity(term_h);
    for y in skip_rows..full_h {
        let sy = (y * src_h / full_h.max(1)).min(src_h - 1);
        let mut spans = Vec::with_capacity(term_w);
        for x in 0..term_w {
            let sx = (x * src_w / term_w).min(src_w - 1);
            let raw = frame.pixels[(sy * src_w + sx).min(frame.pixels.len() - 1)];
            let brightness = (raw as f32 * opacity.clamp(0.0, 1.0)) as u8;

            let (fg, bg, modifier) = match brightness {
                0..=30 => (Color::Black, Color::Black, Modifier::empty()),
                31..=100 => (Color::DarkGray, Color::Black, Modifier::DIM),
                101..=200 => (Color::White, Color::Black, Modifier::empty()),
                201..=255 => (Color::Black, Color::White, Modifier::BOLD),
            };
            if fg == Color::Black && bg == Color::Black {
                spans.push(Span::raw(" "));
                continue;
            }
            let ch = RAMP[brightness as usize * (RAMP.len() - 1) / 255] as char;
            spans.push(Span::styled(
                ch.to_string(),
                Style::default().fg(fg).bg(bg).add_modifier(modifier),
            ));
        }
        lines.push(Line::from(spans));
    }
    f.render_widget(Paragraph::new(lines), area);
}

fn render_placeholder(f: &mut Frame, area: Rect, text: impl Into<String>) {
    let text: String = text.into();
    f.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .fg(Color::Gray)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
            ),
        area,
    );
}

fn spinner_frame() -> &'static str {
    let ticks = Local::now().timestamp_millis().unsigned_abs() as usize;
    SPINNER[(ticks / 120) % SPINNER.len()]
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}
