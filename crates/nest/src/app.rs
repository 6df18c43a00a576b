use std::time::Duration;

use nest_server::{AppState, Server, ServerError};
use nest_store::{MemoryStore, SqliteStore, Store, StoreError};
use nest_video::{ingest::spawn_udp_receiver, FrameCache, IngestMode, VideoConfigError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{NestConfig, StorageKind};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid video settings: {0}")]
    Video(#[from] VideoConfigError),
    #[error("could not open storage: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("could not wait for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

pub async fn run(config: NestConfig) -> Result<(), AppError> {
    config.video.validate()?;
    match config.storage.kind {
        StorageKind::Memory => {
            warn!("using in-memory storage, nothing survives a restart");
            serve(config, MemoryStore::new()).await
        }
        StorageKind::Sqlite => {
            info!("opening sqlite storage at {}", config.storage.path.display());
            let store = SqliteStore::open(&config.storage.path)?;
            serve(config, store).await
        }
    }
}

async fn serve<S: Store>(config: NestConfig, store: S) -> Result<(), AppError> {
    let cancel = CancellationToken::new();
    let frames = FrameCache::new();
    let state = AppState::new(store, frames.clone(), &config.video);
    let server = Server::try_build(&config.server, state, cancel.clone())?;

    let mut tasks = vec![("http server", server.handle)];
    match config.video.ingest {
        IngestMode::Udp => tasks.push((
            "udp receiver",
            spawn_udp_receiver(
                &config.video.udp,
                config.video.codec(),
                frames,
                cancel.clone(),
            ),
        )),
        mode => info!("frame ingestion over {mode:?}"),
    }

    let signal = tokio::signal::ctrl_c().await;
    info!("shutting down ...");
    shutdown(
        &cancel,
        tasks,
        Duration::from_millis(config.shutdown_timeout_ms),
    )
    .await;
    signal.map_err(AppError::from)
}

///Cancels every background task, then gives each one `grace` to finish. Tasks still running after
///that are left behind. Returns whether all of them stopped in time.
pub(crate) async fn shutdown(
    cancel: &CancellationToken,
    tasks: Vec<(&str, JoinHandle<()>)>,
    grace: Duration,
) -> bool {
    cancel.cancel();
    let mut all_stopped = true;
    for (name, handle) in tasks {
        all_stopped &= join_within(handle, grace, name).await;
    }
    all_stopped
}

async fn join_within(handle: JoinHandle<()>, grace: Duration, name: &str) -> bool {
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(())) => {
            info!("{name} stopped.");
            true
        }
        Ok(Err(err)) => {
            warn!("{name} task failed: {err}");
            true
        }
        Err(_) => {
            warn!("{name} did not stop within {grace:?}, abandoning it");
            false
        }
    }
}
