use std::io::stdout;
use std::panic;

use crossterm::{
    event::DisableBracketedPaste,
    execute,
    terminal::{LeaveAlternateScreen, disable_raw_mode},
};
use log::error;

/// Leaves raw mode and the alternate screen so the report is readable.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(stdout(), LeaveAlternateScreen, DisableBracketedPaste);
}

/// Installs the panic hook: a detailed backtrace in debug builds, a
/// human-panic crash report in release builds.
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        let handler = better_panic::Settings::auto()
            .most_recent_first(false)
            .lineno_suffix(true)
            .create_panic_handler();
        panic::set_hook(Box::new(move |panic_info| {
            restore_terminal();
            error!("Panic: {panic_info}");
            handler(panic_info);
        }));
    } else {
        let metadata =
            human_panic::Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        panic::set_hook(Box::new(move |panic_info| {
            restore_terminal();
            error!("Panic: {panic_info}");
            let report = human_panic::handle_dump(&metadata, panic_info);
            let _ = human_panic::print_msg(report, &metadata);
            std::process::exit(1);
        }));
    }
}
