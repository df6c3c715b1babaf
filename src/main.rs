mod app;
mod catalog;
mod config;
mod feed;
mod hero;
mod i18n;
mod logging;
mod navigation;
mod player;
mod scheduler;
mod types;
mod ui;
mod utils;
mod video;
mod viewport;

rust_i18n::i18n!("locales", fallback = "en");

use anyhow::{Context, Result};
use app::App;
use catalog::{Catalog, CatalogProvider, FileCatalog, RemoteCatalog, StaticCatalog};
use clap::Parser;
use config::{Cli, Timings};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tracing::info;
use video::FfmpegFactory;

type Term = Terminal<CrosstermBackend<Stdout>>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_file)?;
    let locale = i18n::init_locale(cli.locale.as_deref());
    info!(locale, "starting reel-tui");

    let catalog = load_catalog(&cli)?;
    let timings = Timings::from_cli(&cli);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(
        catalog,
        timings,
        cli.resize_mode,
        Box::new(FfmpegFactory::default()),
        Instant::now(),
    );
    let result = run(&mut terminal, &mut app);

    app.shutdown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    result
}

fn run(terminal: &mut Term, app: &mut App) -> Result<()> {
    let size = terminal.size()?;
    app.resize(size.width, size.height);

    loop {
        let now = Instant::now();
        app.handle_events(now);
        app.tick(now);

        terminal.draw(|f| ui::draw(f, app, now))?;

        if event::poll(Duration::from_millis(10))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.on_key(key.code, key.modifiers, Instant::now()) {
                        return Ok(());
                    }
                }
                Event::Resize(width, height) => app.resize(width, height),
                _ => {}
            }
        }
    }
}

fn load_catalog(cli: &Cli) -> Result<Catalog> {
    let provider: Box<dyn CatalogProvider> = if let Some(url) = &cli.catalog_url {
        info!(%url, "using remote catalog");
        Box::new(RemoteCatalog::new(url.clone()).context("failed to set up catalog client")?)
    } else if let Some(path) = &cli.catalog {
        info!(path = %path.display(), "using catalog file");
        Box::new(FileCatalog::new(path))
    } else {
        Box::new(StaticCatalog::builtin())
    };
    provider.load().context("failed to load catalog")
}
