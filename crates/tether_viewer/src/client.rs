//! WebSocket client loop
//!
//! Connects to the server and drives the mirror from one cooperative loop:
//! inbound frames, the local step timer and a periodic status report.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::config::ViewerConfig;
use crate::dispatch::{handle_binary, handle_frame};
use crate::error::{ViewerError, ViewerResult};
use crate::mirror::ClientMirror;

/// Headless viewer session
pub struct ViewerClient {
    config: ViewerConfig,
    mirror: ClientMirror,
}

impl ViewerClient {
    pub fn new(config: ViewerConfig) -> ViewerResult<Self> {
        config.validate()?;
        let mirror = ClientMirror::new(config.mirror_config())?;
        Ok(Self { config, mirror })
    }

    pub fn mirror(&self) -> &ClientMirror {
        &self.mirror
    }

    /// Run until Ctrl-C or the server closes the connection
    pub async fn run(self) -> ViewerResult<ClientMirror> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` completes or the server closes the connection.
    /// Returns the mirror as it stood at the end of the session.
    pub async fn run_until<F>(mut self, shutdown: F) -> ViewerResult<ClientMirror>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        log::debug!("Connecting to {}", self.config.server_url);
        let (ws, _response) = connect_async(self.config.server_url.as_str())
            .await
            .map_err(|e| ViewerError::Connect(format!("{}: {}", self.config.server_url, e)))?;
        log::info!("Connected to {}", self.config.server_url);

        let (mut write, mut read) = ws.split();

        let mut frame_timer = time::interval(self.config.frame_interval());
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let report_every = self.config.report_interval();
        let mut report_timer = time::interval_at(Instant::now() + report_every, report_every);

        let mut last_frame = Instant::now();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Disconnecting");
                    let _ = write.close().await;
                    break;
                }

                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&mut self.mirror, &text);
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        handle_binary(&mut self.mirror, &bytes);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },

                _ = frame_timer.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;
                    self.mirror.local_step(elapsed);
                }

                _ = report_timer.tick() => self.report(),
            }
        }

        self.report();
        Ok(self.mirror)
    }

    fn report(&self) {
        let stats = self.mirror.stats();
        log::info!(
            "{} shadows | adds {} (dup {}) | removes {} (ignored {}) | poses {} (skipped {}, rejected {}) | bad frames {}",
            self.mirror.len(),
            stats.adds_applied,
            stats.duplicate_adds,
            stats.removes_applied,
            stats.removes_ignored,
            stats.poses_merged,
            stats.poses_skipped,
            stats.poses_rejected,
            stats.malformed_frames + stats.unknown_messages
        );
    }
}

/// Completes on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
