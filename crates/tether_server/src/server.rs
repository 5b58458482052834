//! WebSocket server loop
//!
//! One cooperative loop owns the registry and the broadcast channel. Socket
//! handshakes and per-viewer pumps run as separate tasks that only own their
//! socket and outbound queue; a handshaken viewer is handed back to the loop
//! for registration and catch-up.

use std::future::Future;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

use crate::broadcast::{outbound_queue, BroadcastChannel, PendingViewer};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::registry::ObjectRegistry;

/// Authoritative simulation server
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    registry: ObjectRegistry,
    channel: BroadcastChannel,
}

impl Server {
    /// Validate the config, build the world and bind the listener
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let registry = ObjectRegistry::from_config(&config)?;
        let listener = TcpListener::bind(&config.bind_address).await?;
        log::info!("Listening on ws://{}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            registry,
            channel: BroadcastChannel::new(),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The live object registry
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` completes
    pub async fn run_until<F>(mut self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let (joined_tx, mut joined_rx) = mpsc::unbounded_channel::<PendingViewer>();

        let mut spawn_timer = time::interval_at(
            Instant::now() + self.config.spawn_delay(),
            self.config.spawn_interval(),
        );
        let mut step_timer = time::interval(self.config.step_interval());
        step_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_timer = time::interval(self.config.broadcast_interval());
        broadcast_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_step = Instant::now();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutting down");
                    break;
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("Accepted TCP connection from {}", peer);
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            self.config.max_population,
                            joined_tx.clone(),
                        ));
                    }
                    Err(e) => log::warn!("Accept failed: {}", e),
                },

                Some(pending) = joined_rx.recv() => {
                    let live = self.registry.live_bodies();
                    self.channel.on_connect(pending, &live);
                }

                _ = spawn_timer.tick() => {
                    if let Err(e) = self.registry.spawn_on_timer(&mut self.channel) {
                        log::error!("Spawn failed: {}", e);
                    }
                }

                _ = step_timer.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_step).as_secs_f32();
                    last_step = now;
                    let steps = self.registry.advance(elapsed);
                    log::trace!("Stepped {} substeps for {:.4}s", steps, elapsed);
                }

                _ = broadcast_timer.tick() => {
                    let snapshot = self.registry.snapshot();
                    self.channel.broadcast_poses(&snapshot);
                }
            }
        }

        let stats = self.registry.stats();
        let sent = self.channel.stats();
        log::info!(
            "Session totals: {} spawned, {} evicted, {} frames ({} bytes) to {} viewers",
            stats.spawned,
            stats.evicted,
            sent.frames_sent,
            sent.bytes_sent,
            sent.viewers_connected
        );
        self.channel.disconnect_all();
        Ok(())
    }
}

/// Completes on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Handshake, hand the viewer to the loop, then pump its queue
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    max_population: usize,
    joined: mpsc::UnboundedSender<PendingViewer>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            log::warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = outbound_queue(max_population);
    if joined.send(PendingViewer::new(peer, outbound_tx)).is_err() {
        return;
    }

    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        log::debug!("Send to {} failed: {}", peer, e);
                        break;
                    }
                }
                // Channel dropped the viewer
                None => break,
            },

            inbound = read.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Text(text))) => {
                    log::trace!("Discarding {} byte frame from {}", text.len(), peer);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::debug!("Read from {} failed: {}", peer, e);
                    break;
                }
            },
        }
    }

    let _ = write.close().await;
    log::debug!("Connection to {} closed", peer);
}
