//! TUI runtime
//!
//! One thread owns the terminal and the [`App`]. Fetches run on the tokio
//! runtime and report back over an mpsc channel drained once per frame.

use crate::app::messages::BackgroundMessage;
use crate::app::{background, input, RuntimeContext};
use crate::sources::Sources;
use crate::ui;
use crate::ui::App;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::info;

/// Run the dashboard until the user quits
pub async fn run_tui(mut app: App, sources: Sources) -> Result<()> {
    // Set up terminal
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &sources);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Main event loop with background message handling
fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, sources: &Sources) -> Result<()> {
    let (tx, rx) = mpsc::channel::<BackgroundMessage>();
    let ctx = RuntimeContext {
        sources,
        tx: &tx,
    };
    let mut rng = rand::thread_rng();

    info!(panels = app.dashboard.panels().len(), "dashboard started");
    ctx.dispatch(app.dashboard.start());

    loop {
        app.clear_expired_toast();

        // Simulated progress for loading panels
        app.dashboard.tick(Instant::now(), &mut rng);

        // Check for background messages (non-blocking)
        background::drain_messages(app, &rx);

        // Render
        terminal.draw(|f| ui::render(f, app))?;

        // Poll for events with fast timeout (smooth progress bars)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                input::handle_key_event(app, key, &ctx);
            }
        }

        if app.should_quit {
            info!("quit requested");
            return Ok(());
        }
    }
}
