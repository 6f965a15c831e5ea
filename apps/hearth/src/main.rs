//! `hearth`: queue, install and inspect games through the engine.

mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hearth_engine::{Logger, SessionManager};
use hearth_protocol::{Cave, Game, GameId, Upload, UploadId};
use hearth_queue::{GameQueue, MemoryCaveStore, QueueDecision};
use hearth_tasks::{TaskOutcome, TaskRunner};

use config::HearthConfig;
use console::ConsoleDispatch;

#[derive(Debug, Parser)]
#[command(name = "hearth", about = "Install or launch games through the engine", version, long_about = None)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the game, launch it, or pick which installation to launch.
    Queue {
        #[arg(long)]
        game_id: GameId,
        #[arg(long)]
        title: String,
        /// API key for downloads (overrides the configured one).
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Queue a fresh install without looking for existing ones.
    Install {
        #[arg(long)]
        game_id: GameId,
        #[arg(long)]
        title: String,
        #[arg(long)]
        upload_id: Option<UploadId>,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Print a game's installations as JSON.
    Caves {
        #[arg(long)]
        game_id: GameId,
    },
    /// Write the effective configuration, defaults included, to disk.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hearth=debug")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => HearthConfig::load_from(path)?,
        None => HearthConfig::load()?,
    };
    info!(engine = %cfg.effective_engine().display(), "hearth starting");

    let (launch_tx, mut launch_rx) = mpsc::unbounded_channel::<Cave>();
    let dispatch = Arc::new(ConsoleDispatch::stdin(launch_tx));
    let logger = Logger::new("hearth");
    let sessions = Arc::new(SessionManager::with_process(cfg.engine_config()));
    let tasks = Arc::new(TaskRunner::new(dispatch, logger.clone()));
    // Starts empty on every run. It only keeps installs queued by this
    // process apart; folders left by earlier runs are caught by the disk
    // check in `reserve_install_folder`.
    let store = Arc::new(MemoryCaveStore::new());

    let build_queue = |api_key: Option<String>| {
        let queue = GameQueue::new(
            sessions.clone(),
            tasks.clone(),
            store.clone(),
            cfg.preferences(),
            logger.clone(),
        );
        match cfg.credentials(api_key) {
            Some(credentials) => queue.with_credentials(credentials),
            None => queue,
        }
    };

    match cli.command {
        Command::InitConfig => {
            cfg.save()?;
            info!("configuration written");
        }
        Command::Caves { game_id } => {
            let queue = build_queue(None);
            let caves = queue.fetch_caves(game_id).await?;
            println!("{}", serde_json::to_string_pretty(&caves)?);
        }
        Command::Install {
            game_id,
            title,
            upload_id,
            api_key,
        } => {
            let queue = build_queue(api_key);
            let upload = upload_id.map(|id| Upload {
                id,
                filename: String::new(),
                display_name: None,
                size: None,
                upload_type: None,
                platforms: None,
            });
            let location = queue
                .queue_game_install(&Game::new(game_id, title), upload)
                .await?;
            info!(cave_id = %location.id, folder = %location.install_folder, "install queued");
        }
        Command::Queue {
            game_id,
            title,
            api_key,
        } => {
            let queue = Arc::new(build_queue(api_key));
            let decision = queue.queue_game(&Game::new(game_id, title)).await?;
            if let QueueDecision::Install(location) = &decision {
                info!(cave_id = %location.id, "install queued");
            }

            // Launches requested while deciding are run here.
            while let Ok(cave) = launch_rx.try_recv() {
                let outcome = run_launch(queue.clone(), cave).await;
                if outcome == TaskOutcome::Failed {
                    anyhow::bail!("launch failed");
                }
            }
        }
    }

    Ok(())
}

/// Runs one launch; Ctrl-C aborts it.
async fn run_launch(queue: Arc<GameQueue>, cave: Cave) -> TaskOutcome {
    let game_id = cave.game.id;
    let abort = tokio::spawn({
        let queue = queue.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(game_id, "interrupted, aborting launch");
                queue.abort(game_id);
            }
        }
    });

    let outcome = queue.queue_launch(cave).await;
    abort.abort();
    info!(game_id, ?outcome, "launch finished");
    outcome
}
