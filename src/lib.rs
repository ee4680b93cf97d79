pub mod cli;
pub mod clipboard;
pub mod codec;
pub mod commands;
pub mod console;
pub mod error;
pub mod history;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod settings;
pub mod transfer;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use cli::Cli;
use clipboard::ArboardClipboard;
use commands::Commands;
use history::HistoryStore;
use monitor::{CaptureCycle, MonitorController, MonitorState};
use notify::{ChannelNotifier, Fanout, LogNotifier, Notifier};
use settings::{Settings, SettingsStore};
use transfer::ssh::KeyFile;
use transfer::TransferSession;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => settings::default_settings_path()?,
    };
    let store = SettingsStore::new(path)?;

    if cli.init_config {
        return init_config(&store);
    }

    let mut settings = store.settings();
    cli.apply(&mut settings);
    settings
        .validate()
        .with_context(|| format!("invalid settings (file: {})", store.path().display()))?;

    let passphrase = read_passphrase(&settings)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = runtime.block_on(serve(settings, passphrase));
    // Bounded wait for a clipboard cycle still running on the blocking pool.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

fn init_config(store: &SettingsStore) -> Result<()> {
    if store.exists() {
        println!("{} already exists, leaving it untouched", store.path().display());
        return Ok(());
    }
    store.persist()?;
    println!("wrote settings template to {}", store.path().display());
    Ok(())
}

/// Prompts only when the key on disk is encrypted.
fn read_passphrase(settings: &Settings) -> Result<Option<SecretString>> {
    let key_path = settings.key_path();
    let key = KeyFile::load(&key_path)?;
    if !key.is_encrypted() {
        return Ok(None);
    }
    let prompt = format!("Passphrase for {}: ", key_path.display());
    let passphrase = rpassword::prompt_password(prompt).context("Failed to read passphrase")?;
    Ok(Some(SecretString::new(passphrase)))
}

async fn serve(settings: Settings, passphrase: Option<SecretString>) -> Result<()> {
    let credentials = settings.credentials(passphrase);
    let target = credentials.describe();
    let policy = settings.retry_policy();

    info!("connecting to {target}");
    let session = tokio::task::spawn_blocking(move || TransferSession::connect(credentials, policy))
        .await
        .context("connect task failed to join")??;
    info!("connected to {target}, uploading into {}", session.remote_dir());

    let clipboard = ArboardClipboard::new()?.shared();
    let history = Arc::new(HistoryStore::new());
    let state = Arc::new(MonitorState::new(
        settings.capture.start_monitoring,
        settings.capture.auto_copy,
    ));

    let (channel, notices) = ChannelNotifier::new();
    let notifier: Arc<dyn Notifier> =
        Arc::new(Fanout(vec![Box::new(channel), Box::new(LogNotifier)]));

    let cycle = Arc::new(CaptureCycle::new(
        Arc::clone(&state),
        Arc::clone(&history),
        Arc::clone(&clipboard),
        Box::new(session),
        notifier,
        settings.cycle_config(),
    ));

    let shutdown = CancellationToken::new();
    let mut controller = MonitorController::new();
    controller.start(cycle, settings.poll_interval(), shutdown.child_token())?;

    let commands = Commands::new(state, Arc::clone(&history), clipboard, shutdown.clone());
    println!("{}", console::HELP);
    println!("{}", console::execute(&commands, console::ConsoleCommand::Status));

    console::run_console(
        commands,
        console::spawn_stdin_reader(),
        notices,
        history.subscribe(),
        shutdown,
    )
    .await;

    if let Err(err) = controller.stop().await {
        warn!("monitor did not stop cleanly: {err:#}");
    }
    info!("bye");
    Ok(())
}
