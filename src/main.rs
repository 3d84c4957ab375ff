use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use tokio::sync::Mutex;

use metanotes::{App, Cli, Commands, Config, NoteStorage, Result};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("Application shutting down");
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(notes_dir) = cli.notes_dir {
        config.notes_dir = notes_dir;
    }
    // Watch needs the refresh scheduler regardless of the configured default
    if matches!(cli.command, Commands::Watch) {
        config.auto_refresh = true;
    }

    let storage = Arc::new(Mutex::new(NoteStorage::new(config.clone())));
    {
        let mut guard = storage.lock().await;
        guard.initialize(Arc::clone(&storage)).await?;
    }

    let app = App::new(Arc::clone(&storage), config, cli.config, cli.verbose);
    let outcome = app.run(cli.command).await;

    // Shut down cleanly even when the command failed
    if let Err(e) = storage.lock().await.shutdown().await {
        warn!("Shutdown reported errors: {}", e);
    }

    outcome
}
