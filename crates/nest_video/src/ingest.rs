//!Push-style frame ingestion.
//!
//!Push transports have nobody to report a bad frame to, so undecodable input is logged and dropped.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use serde::Deserialize;
use tokio::{net::UdpSocket, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{codec::Codec, frame::FrameCache};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("could not bind udp socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UdpConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub recv_buffer: usize,
    pub recv_timeout_ms: u64,
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            recv_buffer: 1024 * 1024,
            recv_timeout_ms: 1000,
        }
    }
}

impl UdpConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

///Decodes one pushed image on the blocking pool and publishes it. Returns whether a frame was
///published.
pub async fn push_frame(
    codec: &Codec,
    cache: &FrameCache,
    bytes: impl AsRef<[u8]> + Send + 'static,
    origin: &str,
) -> bool {
    let len = bytes.as_ref().len();
    match codec.decode_blocking(bytes).await {
        Ok(frame) => {
            cache.publish(frame);
            true
        }
        Err(err) => {
            warn!("dropping {len} byte frame from {origin}: {err}");
            false
        }
    }
}

///Receives one JPEG per datagram.
pub struct UdpReceiver {
    socket: UdpSocket,
    recv_buffer: usize,
    recv_timeout: Duration,
}

impl UdpReceiver {
    pub async fn bind(cfg: &UdpConfig) -> Result<Self, IngestError> {
        let addr = cfg.addr();
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| IngestError::Bind { addr, source })?;
        Ok(Self {
            socket,
            recv_buffer: cfg.recv_buffer.max(1),
            recv_timeout: Duration::from_millis(cfg.recv_timeout_ms.max(1)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    ///Runs until `cancel` fires. A receive timeout is routine; it just gives the loop a chance to
    ///look at the token. The socket is released when this returns.
    pub async fn run(self, codec: Codec, cache: FrameCache, cancel: CancellationToken) {
        let mut buf = vec![0u8; self.recv_buffer];
        info!("udp receiver listening on {:?}", self.local_addr());

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                res = timeout(self.recv_timeout, self.socket.recv_from(&mut buf)) => res,
            };
            match received {
                Err(_elapsed) => continue,
                Ok(Err(err)) => {
                    warn!("udp receive error: {err}");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Ok(Ok((0, _))) => continue,
                Ok(Ok((len, peer))) => {
                    let origin = peer.to_string();
                    if push_frame(&codec, &cache, buf[..len].to_vec(), &origin).await {
                        debug!("udp frame from {peer} ({len} bytes)");
                    }
                }
            }
        }
        info!("udp receiver stopped.");
    }
}

///Binds and runs the receiver as a background task. A bind failure ends only this task.
pub fn spawn_udp_receiver(
    cfg: &UdpConfig,
    codec: Codec,
    cache: FrameCache,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let cfg = cfg.clone();
    tokio::spawn(async move {
        match UdpReceiver::bind(&cfg).await {
            Ok(receiver) => receiver.run(codec, cache, cancel).await,
            Err(err) => error!("udp receiver not started: {err}"),
        }
    })
}
