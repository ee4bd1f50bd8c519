use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noteweave_index::{IndexEngine, run_ingestion, run_watcher};
use noteweave_server::server;
use noteweave_server::state::AppState;

/// Capacity of the watcher -> ingestion channel.
const CHANGE_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = noteweave_core::Config::load()?;

    // RUST_LOG wins over the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = config.index_settings();
    let watch = settings.watch;
    let debounce = Duration::from_millis(settings.watch_debounce_ms);
    let trash_folder = settings.trash_folder.clone();

    let engine = Arc::new(IndexEngine::open(settings).await?);
    info!(root = %engine.root().display(), "notes root opened");
    engine.initialize().await?;

    match engine.purge_trash().await {
        Ok(purged) if !purged.is_empty() => {
            info!("Purged {} expired trash items", purged.len());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to purge trash: {}", e),
    }

    let watcher_task = if watch {
        let (tx, rx) = mpsc::channel(CHANGE_QUEUE);
        tokio::spawn(run_ingestion(Arc::clone(&engine), rx));
        let root = engine.root().to_path_buf();
        Some(tokio::spawn(async move {
            if let Err(e) = run_watcher(root, trash_folder, debounce, tx).await {
                tracing::error!("Notes watcher stopped: {}", e);
            }
        }))
    } else {
        info!("Filesystem watcher disabled (set notes.watch = true to enable)");
        None
    };

    let host = &config.settings.server.host;
    if host != "127.0.0.1" && host != "localhost" {
        tracing::warn!(
            "Binding to non-localhost address: {}. This may expose the notes API to remote access.",
            host
        );
    }

    let bind_addr = config.bind_addr();
    info!("Starting noteweave server on {}", bind_addr);
    let state = Arc::new(AppState::new(engine));
    let server_result = server::run(state, &bind_addr).await;

    if let Some(task) = watcher_task {
        task.abort();
    }

    server_result
}
