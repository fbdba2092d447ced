//! Paperclip application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Open the SQLite store in the data directory
//! 3. Build the coordinator (detector, context store, orchestrator, responses)
//! 4. `run`: feed NDJSON events from stdin and focused-window changes into
//!    the coordinator, printing every assistant message as a JSON line
//!
//! Logs go to stderr so stdout stays machine-readable.

mod cli;
mod input;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use paperclip_action::{Capabilities, CapabilityKind};
use paperclip_context::{platform_provider, WindowMonitor};
use paperclip_core::{
    Clock, DeletionEvent, DomainEvent, ErrorEvent, EventKind, PaperclipConfig, Persistence,
    SystemClock,
};
use paperclip_engine::{Coordinator, EventBus};
use paperclip_storage::{Database, SqliteStore};

use cli::{CliArgs, Command};
use input::InputEvent;

/// Time allowed for one focused-window query.
const WINDOW_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

const WINDOW_CHANNEL_CAPACITY: usize = 32;

const LAST_HEALTH_CHECK_KEY: &str = "last_health_check";

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!(error = %e, "Failed to encode output line"),
    }
}

/// Apply one line of input. Malformed lines are logged and skipped.
async fn handle_line(coordinator: &Coordinator, clock: &dyn Clock, line: &str) {
    let event = match InputEvent::parse(line) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, line, "Ignoring malformed input line");
            return;
        }
    };

    match event {
        InputEvent::Error {
            message,
            application,
            timestamp,
        } => {
            let event = ErrorEvent::new(message, application, timestamp.unwrap_or_else(|| clock.now()));
            coordinator.record_error(event).await;
        }
        InputEvent::Deletion {
            characters,
            timestamp,
        } => {
            let event = DeletionEvent::new(characters.get(), timestamp.unwrap_or_else(|| clock.now()));
            coordinator.record_deletion(event).await;
        }
        InputEvent::Productive => coordinator.record_productive_activity(),
        InputEvent::Say { text } => {
            if let Some(message) = coordinator.process_user_input(&text) {
                print_json(&message);
            }
        }
    }
}

async fn run(
    coordinator: Coordinator,
    config: &PaperclipConfig,
    clock: Arc<dyn Clock>,
    monitor: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    coordinator.subscribe(
        EventKind::MessageReady,
        Arc::new(|event: &DomainEvent, _: &EventBus| {
            if let DomainEvent::MessageReady { message, .. } = event {
                print_json(message);
            }
            Ok(())
        }),
    );

    let cancel = CancellationToken::new();
    let (window_tx, mut window_rx) = mpsc::channel(WINDOW_CHANNEL_CAPACITY);
    if monitor {
        match platform_provider(WINDOW_QUERY_TIMEOUT) {
            Some(provider) => {
                let window_monitor = WindowMonitor::new(config.monitor.clone(), provider);
                let token = cancel.clone();
                tokio::spawn(async move {
                    window_monitor.run(window_tx, token).await;
                });
            }
            None => tracing::info!("No window provider for this platform"),
        }
    } else {
        drop(window_tx);
    }

    coordinator.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut windows_open = true;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        handle_line(&coordinator, clock.as_ref(), line).await;
                    }
                }
                Ok(None) => {
                    tracing::info!("Input closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read input");
                    break;
                }
            },
            change = window_rx.recv(), if windows_open => match change {
                Some(context) => coordinator.update_browser_context(context),
                None => windows_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    cancel.cancel();
    coordinator.shutdown();
    Ok(())
}

async fn health(coordinator: &Coordinator, store: &SqliteStore, clock: &dyn Clock) -> bool {
    let mut all_healthy = true;
    for kind in [
        CapabilityKind::Filesystem,
        CapabilityKind::Terminal,
        CapabilityKind::Browser,
    ] {
        let healthy = coordinator.orchestrator().check_capability_health(kind).await;
        all_healthy &= healthy;
        print_json(&serde_json::json!({ "capability": kind.to_string(), "healthy": healthy }));
    }
    if let Err(e) = store.set_preference(LAST_HEALTH_CHECK_KEY, &clock.now().0.to_string()) {
        tracing::warn!(error = %e, "Failed to record health check time");
    }
    all_healthy
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = PaperclipConfig::load_or_default(&config_file);
    if let Some(dir) = &args.data_dir {
        config.general.data_dir = dir.to_string_lossy().to_string();
    }
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Paperclip v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = config.general.resolved_data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db = Arc::new(Database::open_in_dir(&data_dir)?);
    let store = Arc::new(SqliteStore::new(db));
    tracing::info!(path = %data_dir.display(), "SQLite database opened");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let coordinator = Coordinator::from_config(
        &config,
        Capabilities::local(&config.actions),
        Some(store.clone() as Arc<dyn Persistence>),
        clock.clone(),
    );

    match args.command() {
        Command::Run { no_monitor } => {
            run(coordinator, &config, clock, !no_monitor).await?;
        }
        Command::Health => {
            if !health(&coordinator, &store, clock.as_ref()).await {
                std::process::exit(1);
            }
        }
        Command::Wipe => {
            store.delete_all_data()?;
            tracing::info!("All stored data deleted");
        }
    }

    Ok(())
}
