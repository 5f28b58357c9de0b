use std::{fs::File, io::stdout, path::PathBuf};

use anyhow::Result;
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{LevelFilter, WriteLogger};

// Use modules from the library crate
use pageturn::inputs::KeyboardEventSource;
use pageturn::main_app::{App, run_app_with_event_source};
use pageturn::panic_handler;
use pageturn::reader::FileIntake;
use pageturn::settings;

fn main() -> Result<()> {
    // Initialize panic handler first, before any other setup
    panic_handler::initialize_panic_handler();

    // Initialize logging with html5ever DEBUG logs filtered out
    WriteLogger::init(
        LevelFilter::Debug,
        simplelog::ConfigBuilder::new()
            .set_max_level(LevelFilter::Debug)
            .add_filter_ignore_str("html5ever")
            .build(),
        File::create("pageturn.log")?,
    )?;

    info!("Starting pageturn");

    // Load settings from ~/.pageturn_settings.yaml (or $PAGETURN_SETTINGS)
    settings::load_settings();

    let mut app = App::new();
    if let Some(path) = std::env::args_os().nth(1) {
        app.queue_intake(FileIntake::Picked(PathBuf::from(path)));
    }

    // Terminal initialization. Bracketed paste turns file drops into a
    // single paste event.
    enable_raw_mode()?;
    let mut stdout = stdout();

    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut event_source = KeyboardEventSource;
    let res = run_app_with_event_source(&mut terminal, &mut app, &mut event_source);

    // Release the book before the terminal goes back to normal.
    app.reader_mut().close();

    // Restore terminal state
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {err:?}");
        println!("{err:?}");
    }

    info!("Shutting down pageturn");
    Ok(())
}
