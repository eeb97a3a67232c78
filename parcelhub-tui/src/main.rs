//! Terminal UI for parcelhub that lets users pick carriers, search drop-off points and
//! inspect carrier services.

// Linked for their carrier registrations.
extern crate parcelhub_carrier_counter;
extern crate parcelhub_carrier_gateway;

mod app;
mod input;
mod settings;
mod ui;

use std::{
    env,
    fs::File,
    io,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use parcelhub_core::{DEFAULT_SHOP_LIMIT, MemoryCache, ParcelHub, PluginRegistry};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{App, parse_location};
use crate::input::Action;
use crate::settings::{LOG_PATH_VAR, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let settings = Settings::load()?;
    let registry = Arc::new(PluginRegistry::discover().context("carrier registration")?);
    let hub = ParcelHub::new(registry, settings.carriers, Arc::new(MemoryCache::new()))
        .with_settings(settings.dispatch);

    for (uid, problems) in hub.validate_configuration(None)? {
        for problem in problems {
            warn!(%uid, %problem, "carrier configuration problem");
        }
    }

    let app = App::new(Arc::new(hub));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = run(&mut terminal, app).await;

    // Runs even when the loop failed, so the shell is usable again.
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    outcome
}

/// Log to the file named by `PARCELHUB_LOG`; without it nothing is logged.
fn init_logging() -> Result<()> {
    let Some(path) = env::var_os(LOG_PATH_VAR) else {
        return Ok(());
    };
    let file = File::create(&path)
        .with_context(|| format!("cannot open log file {}", path.to_string_lossy()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    info!("logging initialized");
    Ok(())
}

type Term = Terminal<CrosstermBackend<io::Stdout>>;

async fn run(terminal: &mut Term, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        if !event::poll(StdDuration::from_millis(100))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };

        match input::handle_key_event(key, &mut app) {
            Action::Quit => return Ok(()),
            Action::None => {}
            Action::SearchShops => search(terminal, &mut app).await?,
            Action::OpenCurrentShop => {
                app.error_message = app.open_current_shop().err().map(|err| err.to_string());
            }
        }
    }
}

/// Query the selected carriers for the typed location; the screen shows progress meanwhile.
async fn search(terminal: &mut Term, app: &mut App) -> Result<()> {
    let location = match parse_location(&app.location_input) {
        Ok(location) => location,
        Err(err) => {
            app.error_message = Some(err.to_string());
            return Ok(());
        }
    };

    app.is_loading = true;
    app.error_message = None;
    terminal.draw(|frame| ui::draw(frame, app))?;

    let outcome = app
        .hub
        .shops(&location, DEFAULT_SHOP_LIMIT, app.selected_carriers.as_deref())
        .await;
    app.is_loading = false;

    match outcome {
        Ok(results) => app.apply_shop_results(results),
        Err(err) => {
            info!(error = %err, "shop search failed");
            app.clear_results();
            app.error_message = Some(format!("Search failed: {err}"));
        }
    }
    Ok(())
}
