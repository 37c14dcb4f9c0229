// Daemon application wiring.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::cpupower::{PowerControl, SysfsPower};
use crate::lock::LockQueue;
use crate::shutdown::GracefulShutdown;

use super::server::Server;

/// Encapsulates the daemon state: one lock queue shared by every session.
pub struct App {
    queue: Arc<LockQueue>,
    server: Arc<Server>,
    gsh: GracefulShutdown,
}

impl App {
    /// Creates the daemon with CPU frequency control through sysfs.
    pub fn new(cfg: &Config, gsh: GracefulShutdown) -> Self {
        let power = Arc::new(SysfsPower::new(cfg.sysfs_dir()));
        Self::with_power(cfg, gsh, power)
    }

    /// Creates the daemon over an arbitrary power backend.
    pub fn with_power(cfg: &Config, gsh: GracefulShutdown, power: Arc<dyn PowerControl>) -> Self {
        let queue = Arc::new(LockQueue::new());
        let server = Arc::new(Server::new(
            cfg.socket(),
            cfg.socket_mode(),
            queue.clone(),
            power,
            gsh.clone(),
        ));
        Self { queue, server, gsh }
    }

    pub fn queue(&self) -> &Arc<LockQueue> {
        &self.queue
    }

    pub fn is_alive(&self) -> bool {
        self.server.is_alive()
    }

    /// Serves until shutdown. A server failure cancels the whole daemon.
    pub async fn serve(&self) -> Result<()> {
        info!(component = "app", event = "started", "application lifecycle");

        let result = self.server.listen_and_serve().await;
        if let Err(e) = &result {
            error!(
                component = "app",
                scope = "server",
                event = "serve_failed",
                error = %e,
                "server failed to serve"
            );
        }

        self.close();
        result
    }

    /// Stops the daemon; live sessions restore and release on their way out.
    pub fn close(&self) {
        self.gsh.token().cancel();
        info!(component = "app", event = "stopped", "application lifecycle");
    }
}
