use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use portal_core::config::APP_DIR;
use portal_core::session::SessionEvents;
use portal_core::theme::FilePreferences;
use portal_core::watchdog;
use portal_core::{Config, LoginOutcome, Scenario, SessionEvent, SimulatedEngine, ThemeStore};

mod app;
mod handler;
mod landing;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui, TICK_RATE};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Terminal front end for talking to a real-time voice agent")]
struct Cli {
    /// How the simulated agent behaves (healthy, no-agent, stalled-agent, no-camera)
    #[arg(long, default_value = "healthy", value_parser = parse_scenario)]
    scenario: Scenario,

    /// Seconds to wait for the agent before ending the session
    #[arg(long)]
    watchdog_secs: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_scenario(s: &str) -> Result<Scenario, String> {
    Scenario::from_str(s).ok_or_else(|| {
        let names: Vec<_> = Scenario::all().iter().map(|s| s.as_str()).collect();
        format!("unknown scenario '{}', expected one of: {}", s, names.join(", "))
    })
}

fn init_logging() -> Result<PathBuf> {
    let log_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join(APP_DIR);
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("portal.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;

    // The terminal belongs to the UI, so logs only go to the file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = init_logging()?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => Config::load_or_create().unwrap_or_else(|e| {
            tracing::warn!("using default config: {}", e);
            Config::new()
        }),
    };
    if let Some(secs) = cli.watchdog_secs {
        config.watchdog_secs = secs;
    }

    let theme = ThemeStore::load(FilePreferences::new(Config::config_dir()?.join("preferences.json")));
    let engine = Arc::new(SimulatedEngine::new(cli.scenario));

    tracing::info!(
        scenario = cli.scenario.as_str(),
        watchdog_secs = config.watchdog_secs,
        log = %log_path.display(),
        "starting portal"
    );

    tracing::warn!("login uses a single fixed credential pair and is not meant for production");

    let mut app = App::new(&config, theme, engine);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    app.shutdown().await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let deadline = app.session.watchdog_deadline();
        // Session events go before the deadline so a queued ready state wins
        tokio::select! {
            biased;
            event = next_session_event(&mut app.session_events) => app.on_session_event(event).await,
            _ = watchdog::sleep_until(deadline) => app.on_watchdog_expired().await,
            Some(event) = events.next() => handler::handle_event(app, event).await?,
            outcome = join_login(&mut app.login_task) => app.on_login_finished(outcome).await,
        }

        app.drain_device_errors();
    }

    Ok(())
}

async fn next_session_event(events: &mut Option<SessionEvents>) -> Option<SessionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn join_login(task: &mut Option<JoinHandle<LoginOutcome>>) -> LoginOutcome {
    let Some(handle) = task.as_mut() else {
        return std::future::pending().await;
    };
    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("login attempt failed: {}", e);
            LoginOutcome::Failure
        }
    };
    *task = None;
    outcome
}
