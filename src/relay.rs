//! UDP relay: receive loop, bounded worker pool and shared sender.
//!
//! One task owns the listen socket. Every datagram that passes the source
//! filter takes a permit from a fixed-size semaphore and is translated in
//! its own task; when no permit is free the datagram is dropped rather than
//! queued. All workers send through a single connected socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::pipeline::{DropReason, Pipeline, decode};
use crate::stats::RelayStats;

/// Receive buffer size. Longer datagrams are truncated.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// How long shutdown waits for in-flight datagrams.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Default number of datagrams processed concurrently.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// State shared between the receive loop and its workers.
struct Shared {
    pipeline: Pipeline,
    sender: UdpSocket,
    target: SocketAddr,
    stats: Arc<RelayStats>,
}

/// A bound relay, ready to run.
pub struct Relay {
    socket: UdpSocket,
    shared: Arc<Shared>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl Relay {
    /// Bind the listen socket and connect the sender using `config`.
    pub async fn from_config(config: &Config, stats: Arc<RelayStats>) -> Result<Self> {
        let pipeline = Pipeline::from_config(config)?;
        Self::bind(
            &config.listen_addr(),
            &config.target_addr(),
            pipeline,
            stats,
            config.max_in_flight,
        )
        .await
    }

    /// Bind `listen` and connect an outbound socket to `target`.
    ///
    /// Failing to bind or to resolve the target is a startup error.
    pub async fn bind(
        listen: &str,
        target: &str,
        pipeline: Pipeline,
        stats: Arc<RelayStats>,
        max_in_flight: usize,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(listen)
            .await
            .with_context(|| format!("Failed to bind listen socket on {}", listen))?;

        let target = resolve(target).await?;
        let sender = connect_sender(target).await?;

        let max_in_flight = max_in_flight.max(1);

        Ok(Self {
            socket,
            shared: Arc::new(Shared {
                pipeline,
                sender,
                target,
                stats,
            }),
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        })
    }

    /// Address the listen socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Resolved forwarding target.
    pub fn target(&self) -> SocketAddr {
        self.shared.target
    }

    /// Receive and relay datagrams until `cancel` fires.
    ///
    /// After cancellation no further datagrams are read, and in-flight ones
    /// get [`SHUTDOWN_GRACE`] to finish.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Relaying {} -> {} ({} workers)",
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".to_string()),
            self.shared.target,
            self.max_in_flight
        );

        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Receive loop cancelled");
                    break;
                }

                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, source)) => self.dispatch(&buf[..len], source),
                    Err(e) => error!("Receive error: {}", e),
                },
            }
        }

        self.drain().await;
    }

    /// Hand one datagram to a worker, or drop it.
    fn dispatch(&self, payload: &[u8], source: SocketAddr) {
        let received = Instant::now();
        let stats = &self.shared.stats;
        stats.record_datagram(payload.len());
        debug!("Received {} bytes from {}", payload.len(), source);

        if !self.shared.pipeline.accepts(source) {
            stats.record_source_rejected();
            debug!("Rejected datagram from {}", source);
            return;
        }

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                stats.record_overloaded();
                warn!(
                    "Worker pool saturated ({} in flight), dropping datagram from {}",
                    self.max_in_flight, source
                );
                return;
            }
        };

        let shared = Arc::clone(&self.shared);
        let payload = payload.to_vec();
        tokio::spawn(async move {
            let _permit = permit;
            shared.handle(&payload, source, received).await;
        });
    }

    /// Wait for workers to return their permits, up to the grace period.
    async fn drain(&self) {
        let in_flight = self.max_in_flight - self.permits.available_permits();
        if in_flight > 0 {
            debug!("Waiting for {} in-flight datagrams", in_flight);
        }

        let all = u32::try_from(self.max_in_flight).unwrap_or(u32::MAX);
        match timeout(SHUTDOWN_GRACE, self.permits.acquire_many(all)).await {
            Ok(_) => debug!("All workers finished"),
            Err(_) => warn!(
                "Shutdown grace period elapsed with {} datagrams in flight",
                self.max_in_flight - self.permits.available_permits()
            ),
        }
        info!("Relay stopped");
    }
}

impl Shared {
    /// Translate one accepted datagram and send the result.
    async fn handle(&self, payload: &[u8], source: SocketAddr, received: Instant) {
        let translated = match self.pipeline.translate(&decode(payload)) {
            Ok(translated) => translated,
            Err(DropReason::Parse(e)) => {
                self.stats.record_parse_failure(e.dialect());
                debug!("Dropped datagram from {}: {}", source, e);
                return;
            }
            Err(e) => {
                self.stats.record_serialize_failure();
                error!("Dropped datagram from {}: {}", source, e);
                return;
            }
        };

        match self.sender.send(translated.xml.as_bytes()).await {
            Ok(bytes) => {
                self.stats
                    .record_relayed(translated.dialect, &translated.record, received.elapsed());
                let record = &translated.record;
                info!(
                    bytes,
                    %source,
                    target_addr = %self.target,
                    call = %record.callsign,
                    band = record.band.as_deref().unwrap_or(""),
                    mode = record.mode.as_deref().unwrap_or(""),
                    "Relayed {} contact",
                    translated.dialect
                );
            }
            Err(e) => {
                self.stats.record_send_failure();
                error!("Failed to send to {}: {}", self.target, e);
            }
        }
    }
}

/// Resolve `addr` (`host:port`) to its first socket address.
pub async fn resolve(addr: &str) -> Result<SocketAddr> {
    lookup_host(addr)
        .await
        .with_context(|| format!("Failed to resolve {}", addr))?
        .next()
        .with_context(|| format!("No addresses found for {}", addr))
}

/// An ephemeral UDP socket connected to `target`.
async fn connect_sender(target: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if target.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let sender = UdpSocket::bind(local)
        .await
        .context("Failed to bind outbound socket")?;
    sender
        .connect(target)
        .await
        .with_context(|| format!("Failed to connect outbound socket to {}", target))?;
    Ok(sender)
}
