//! FinSight - a terminal client for the FinanzasGo personal finance API.
//!
//! Signs the user in, keeps the session across restarts, and shows the
//! ledger summary on a dashboard that is only reachable while signed in.

mod app;
mod cli;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use finsight_core::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file name inside the data directory
const LOG_FILE_NAME: &str = "finsight.log";

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Logging for one-shot commands goes to stderr
fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// The TUI owns the terminal, so it logs to a file in the data directory.
/// Returns the guard that flushes the writer on drop.
fn init_file_tracing(config: &Config) -> Option<WorkerGuard> {
    let dir = config.data_dir().ok()?;
    std::fs::create_dir_all(&dir).ok()?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config_result = Config::load();
    let args: Vec<String> = std::env::args().skip(1).collect();

    if let Some(command) = args.first() {
        init_stderr_tracing();
        let config = config_result?;
        return match (command.as_str(), args.get(1)) {
            ("status", None) => cli::status(&config),
            ("logout", None) => cli::logout(&config),
            ("login", Some(email)) => cli::login(&config, email).await,
            ("-h" | "--help" | "help", None) => {
                println!("{}", cli::USAGE);
                Ok(())
            }
            _ => {
                eprintln!("{}", cli::USAGE);
                std::process::exit(2);
            }
        };
    }

    let config = match config_result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {:#}. Using default settings.", e);
            Config::default()
        }
    };

    // Initialize logging
    let _log_guard = init_file_tracing(&config);
    info!(api = config.api_base(), "FinSight starting");

    // Create app before touching the terminal so setup errors print normally
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // First frame shows the pending placeholder, then restore the session
    terminal.draw(|f| render(f, &app))?;
    app.boot();

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        warn!(error = %e, "Main loop failed");
        eprintln!("Error: {}", e);
    }

    info!("FinSight shutting down");
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Apply finished background tasks and re-check the access guard
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
