use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::net::UdpSocket;

use crate::core::Filter;
use crate::pipeline::process_datagram;

/// EDNS0 payloads can exceed the classic 512-byte DNS-over-UDP ceiling;
/// 4096 bytes matches common modern resolver practice.
const RECV_BUFFER_SIZE: usize = 4096;

/// Owns the bound UDP socket and spawns one independent pipeline task per
/// received datagram; never blocks waiting on a task it spawned.
pub struct Listener {
    socket: Arc<UdpSocket>,
    upstream_addr: SocketAddr,
    upstream_timeout: Duration,
    plugins: Arc<Vec<Box<dyn Filter>>>,
}

impl Listener {
    pub async fn bind(
        local_addr: SocketAddr,
        upstream_addr: SocketAddr,
        upstream_timeout: Duration,
        plugins: Arc<Vec<Box<dyn Filter>>>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(local_addr).await?;
        info!("listening on {local_addr}, forwarding residual questions to {upstream_addr}");
        Ok(Self {
            socket: Arc::new(socket),
            upstream_addr,
            upstream_timeout,
            plugins,
        })
    }

    /// Accepts datagrams until `shutdown` resolves, dispatching each to its
    /// own task. Returns once no new datagrams are accepted; in-flight
    /// tasks are not awaited here — callers that need a grace period should
    /// wait separately before exiting the process.
    pub async fn run(&self, shutdown: impl std::future::Future<Output = ()>) {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("listener shutting down, no longer accepting datagrams");
                    return;
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (len, client_addr) = match received {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("recv_from failed: {e}");
                            continue;
                        }
                    };
                    let datagram = buf[..len].to_vec();
                    let socket = Arc::clone(&self.socket);
                    let plugins = Arc::clone(&self.plugins);
                    let upstream_addr = self.upstream_addr;
                    let upstream_timeout = self.upstream_timeout;
                    tokio::spawn(async move {
                        process_datagram(
                            &datagram,
                            client_addr,
                            &plugins,
                            upstream_addr,
                            upstream_timeout,
                            &socket,
                        )
                        .await;
                    });
                }
            }
        }
    }
}
