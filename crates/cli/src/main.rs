use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crossfade_core::{
    load_config, load_config_or_default, validate_config, AppleMusicClient,
    CachedCredentialProvider, Config, CredentialProvider, DestinationCatalog, JwtTokenSource,
    MemorySyncStore, SanitizedConfig, SourceCatalog, SpotifyClient, SqliteSyncStore,
    StaticCredentialProvider, SyncOrchestrator, SyncRequest, SyncStore, SyncTask,
};

mod metrics;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file read when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "crossfade.toml";

/// How often a running sync is polled for progress
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(author, version, about = "Copy playlists from Spotify to Apple Music", long_about = None)]
struct Args {
    /// The config file to use [default: crossfade.toml, if present]
    #[arg(short, long, env = "CROSSFADE_CONFIG")]
    config: Option<PathBuf>,

    /// User the sync runs on behalf of
    #[arg(short, long, default_value = "local", global = true)]
    user: String,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the user's Spotify playlists
    Playlists {
        /// Spotify OAuth access token
        #[arg(long, env = "CROSSFADE_SPOTIFY_TOKEN", hide_env_values = true)]
        spotify_token: String,
    },
    /// Sync a Spotify playlist into Apple Music and wait for the result
    Sync {
        /// Spotify playlist ID
        playlist_id: String,

        /// Name for the Apple Music playlist
        #[arg(short, long)]
        name: Option<String>,

        /// Reuse an existing Apple Music playlist with the same name
        #[arg(long)]
        reuse: bool,

        /// Spotify OAuth access token
        #[arg(long, env = "CROSSFADE_SPOTIFY_TOKEN", hide_env_values = true)]
        spotify_token: String,

        /// Apple Music user token
        #[arg(long, env = "CROSSFADE_APPLE_MUSIC_USER_TOKEN", hide_env_values = true)]
        apple_music_user_token: String,
    },
    /// Show a task snapshot (requires a database)
    Status {
        /// Task ID printed by `sync`
        task_id: String,
    },
    /// Show the user's recent syncs, newest first
    History,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = read_config(args.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;
    init_logging(config.logging.json);

    info!("crossfade {} starting", VERSION);
    info!(
        "Configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let source: Arc<dyn SourceCatalog> = Arc::new(
        SpotifyClient::new(config.spotify.clone()).context("Failed to create Spotify client")?,
    );

    let result = execute(args.command, &args.user, &config, source).await;
    if args.metrics {
        eprint!("{}", metrics::encode_metrics()?);
    }
    result
}

async fn execute(
    command: Commands,
    user: &str,
    config: &Config,
    source: Arc<dyn SourceCatalog>,
) -> Result<()> {
    match command {
        Commands::Playlists { spotify_token } => {
            let playlists = source
                .list_playlists(&spotify_token)
                .await
                .context("Failed to list Spotify playlists")?;
            print_json(&playlists)
        }
        Commands::Sync {
            playlist_id,
            name,
            reuse,
            spotify_token,
            apple_music_user_token,
        } => {
            let mut orchestrator = build_orchestrator(config, source)?;
            let mut request =
                SyncRequest::new(user, playlist_id, spotify_token, apple_music_user_token)
                    .with_create_new(!reuse);
            if let Some(name) = name {
                request = request.with_destination_name(name);
            }

            let task_id = orchestrator.start_sync(request).await?;
            info!("Sync task {} queued", task_id);

            let finished = tokio::select! {
                task = wait_for_task(&orchestrator, &task_id) => Some(task?),
                _ = shutdown_signal() => None,
            };

            match finished {
                Some(task) => {
                    orchestrator.shutdown().await;
                    print_json(&task)
                }
                None => {
                    // Workers are not drained; the in-flight task is abandoned.
                    warn!("Interrupted, task {} left unfinished", task_id);
                    print_json(&orchestrator.get_status(&task_id)?)
                }
            }
        }
        Commands::Status { task_id } => {
            let store = open_store(config)?;
            match store.get_task(&task_id)? {
                Some(task) => print_json(&task),
                None => bail!("Task {} not found", task_id),
            }
        }
        Commands::History => {
            let store = open_store(config)?;
            let history = store.list_history(user, config.orchestrator.history_limit)?;
            print_json(&history)
        }
    }
}

/// Load the config file named by `--config`, or the default file if it
/// exists. Environment overrides apply either way.
fn read_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => load_config_or_default(Path::new(DEFAULT_CONFIG_PATH))
            .context("Failed to load configuration"),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn open_store(config: &Config) -> Result<Arc<dyn SyncStore>> {
    match &config.database.path {
        Some(path) => {
            info!("Using task database at {:?}", path);
            let store = SqliteSyncStore::new(path)
                .with_context(|| format!("Failed to open database {:?}", path))?;
            Ok(Arc::new(store))
        }
        None => {
            info!("No database configured, tasks are kept in memory");
            Ok(Arc::new(MemorySyncStore::new()))
        }
    }
}

/// Sign developer tokens when a MusicKit key is configured, otherwise serve
/// the pre-issued token.
fn developer_credentials(config: &Config) -> Result<Arc<dyn CredentialProvider>> {
    let apple = &config.apple_music;
    if let Some(key) = apple.signing_key() {
        info!("Signing Apple Music developer tokens with key {}", key.key_id);
        let source = JwtTokenSource::from_key_file(key.key_id, key.team_id, key.private_key_path)
            .context("Failed to load Apple Music signing key")?;
        return Ok(Arc::new(CachedCredentialProvider::new(Arc::new(source))));
    }

    let developer_token = apple
        .developer_token
        .clone()
        .filter(|t| !t.is_empty())
        .context(
            "apple_music.developer_token or key_id/team_id/private_key_path must be configured",
        )?;
    Ok(Arc::new(StaticCredentialProvider::new(developer_token)))
}

fn build_orchestrator(config: &Config, source: Arc<dyn SourceCatalog>) -> Result<SyncOrchestrator> {
    let destination: Arc<dyn DestinationCatalog> = Arc::new(
        AppleMusicClient::new(config.apple_music.clone(), developer_credentials(config)?)
            .context("Failed to create Apple Music client")?,
    );

    Ok(SyncOrchestrator::new(
        source,
        destination,
        open_store(config)?,
        config.resolver.clone(),
        config.orchestrator.clone(),
    ))
}

/// Poll until the task is terminal, logging progress changes.
async fn wait_for_task(orchestrator: &SyncOrchestrator, task_id: &str) -> Result<SyncTask> {
    let mut last_progress = None;
    loop {
        let task = orchestrator.get_status(task_id)?;
        if task.status.is_terminal() {
            info!(
                "Task {} {}: {}/{} tracks synced",
                task.id, task.status, task.synced_tracks, task.total_tracks
            );
            return Ok(task);
        }
        if last_progress != Some(task.progress) {
            info!("Task {}: {}% ({})", task.id, task.progress, task.status);
            last_progress = Some(task.progress);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
