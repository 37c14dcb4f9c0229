// Unix socket server: accepts connections and hands each one to a session.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UnixStream;
use tracing::{debug, error, info, warn};

use crate::cpupower::PowerControl;
use crate::lock::LockQueue;
use crate::session::Session;
use crate::shutdown::GracefulShutdown;
use crate::transport;

/// Accept loop over the daemon socket.
pub struct Server {
    socket: String,
    mode: u32,
    queue: Arc<LockQueue>,
    power: Arc<dyn PowerControl>,
    gsh: GracefulShutdown,
    is_server_alive: Arc<AtomicBool>,
}

impl Server {
    pub fn new(
        socket: impl Into<String>,
        mode: u32,
        queue: Arc<LockQueue>,
        power: Arc<dyn PowerControl>,
        gsh: GracefulShutdown,
    ) -> Self {
        Self {
            socket: socket.into(),
            mode,
            queue,
            power,
            gsh,
            is_server_alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true while the server is accepting connections.
    pub fn is_alive(&self) -> bool {
        self.is_server_alive.load(Ordering::Relaxed)
    }

    /// Binds the socket and serves until shutdown. An accept failure ends
    /// the server with an error.
    pub async fn listen_and_serve(&self) -> Result<()> {
        let listener = transport::bind(&self.socket, self.mode)
            .with_context(|| format!("listening on {}", self.socket))?;

        info!(
            component = "server",
            event = "listening",
            socket = %self.socket,
            mode = %format_args!("{:o}", self.mode),
            "accepting connections"
        );
        self.is_server_alive.store(true, Ordering::Relaxed);

        let token = self.gsh.token();
        let result = loop {
            tokio::select! {
                _ = token.cancelled() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => self.spawn_session(stream),
                    Err(e) => {
                        error!(
                            component = "server",
                            event = "accept_failed",
                            error = %e,
                            "accept failed"
                        );
                        break Err(anyhow::Error::new(e).context("accepting connection"));
                    }
                },
            }
        };

        self.is_server_alive.store(false, Ordering::Relaxed);
        drop(listener);

        if let Err(e) = transport::unlink(&self.socket) {
            warn!(
                component = "server",
                event = "unlink_failed",
                socket = %self.socket,
                error = %e,
                "failed to remove socket"
            );
        }

        result
    }

    fn spawn_session(&self, stream: UnixStream) {
        debug!(component = "server", event = "accepted", "new connection");

        let session = Session::new(self.queue.clone(), self.power.clone(), self.gsh.token());
        let guard = self.gsh.guard();
        tokio::spawn(async move {
            session.serve(stream).await;
            drop(guard);
        });
    }
}
