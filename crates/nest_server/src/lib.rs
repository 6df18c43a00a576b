pub mod error;
pub(crate) mod server;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use nest_store::Store;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use crate::error::{ApiError, ServerError};
pub use crate::server::{router, state::AppState};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
        }
    }
}

pub struct Server {
    pub handle: JoinHandle<()>,
    pub local_addr: SocketAddr,
}

impl Server {
    ///Binds the listener and starts serving. Cancelling `cancel` stops accepting connections and
    ///lets in-flight requests finish. Open MJPEG streams are dropped along with the runtime.
    pub fn try_build<S: Store>(
        cfg: &ServerConfig,
        state: AppState<S>,
        cancel: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = SocketAddr::new(cfg.bind, cfg.port);
        let server = axum::Server::try_bind(&addr)
            .map_err(|source| ServerError::Bind { addr, source })?
            .serve(router(state).into_make_service());
        let local_addr = server.local_addr();
        info!("http server listening on {local_addr}");

        let handle = tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(err) = server.with_graceful_shutdown(shutdown).await {
                error!("http server exited with an error: {err}");
            }
        });

        Ok(Server { handle, local_addr })
    }
}
