// In-process daemon bootstrap for integration tests.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::sysfs::FakeSysfs;
use crate::app::App;
use crate::client::Client;
use crate::config::{self, ConfigTrait};
use crate::lock::LockQueue;
use crate::shutdown::GracefulShutdown;

/// Frequencies of the fake CPUs, in kHz.
pub const FREQS: [u64; 4] = [800_000, 1_200_000, 1_600_000, 2_000_000];

/// A daemon serving a temporary socket over a fake sysfs tree.
pub struct TestDaemon {
    socket: String,
    sysfs: FakeSysfs,
    app: Arc<App>,
    gsh: GracefulShutdown,
    handle: JoinHandle<anyhow::Result<()>>,
    _dir: TempDir,
}

impl TestDaemon {
    /// Starts a daemon over two CPUs sharing one frequency domain.
    pub async fn start() -> Self {
        let sysfs = FakeSysfs::new();
        sysfs.add_cpu(0, Some("0-1"), FREQS[0], FREQS[3], &FREQS);
        sysfs.add_cpu(1, Some("0-1"), FREQS[0], FREQS[3], &FREQS);
        Self::start_with(sysfs).await
    }

    pub async fn start_with(sysfs: FakeSysfs) -> Self {
        let dir = tempfile::tempdir().expect("create socket dir");
        let socket = dir.path().join("perflock.socket").to_string_lossy().into_owned();

        let cfg = config::new_test_config(&socket, sysfs.root());
        let gsh = GracefulShutdown::new(CancellationToken::new(), cfg.shutdown_timeout());
        let app = Arc::new(App::new(&cfg, gsh.clone()));

        let handle = tokio::spawn({
            let app = app.clone();
            async move { app.serve().await }
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !app.is_alive() {
            assert!(!handle.is_finished(), "daemon exited during start-up");
            assert!(tokio::time::Instant::now() < deadline, "daemon did not start");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        Self {
            socket,
            sysfs,
            app,
            gsh,
            handle,
            _dir: dir,
        }
    }

    pub fn socket(&self) -> &str {
        &self.socket
    }

    pub fn sysfs(&self) -> &FakeSysfs {
        &self.sysfs
    }

    pub fn queue(&self) -> &Arc<LockQueue> {
        self.app.queue()
    }

    pub async fn client(&self) -> Client {
        Client::connect(&self.socket).await.expect("connect to test daemon")
    }

    /// Polls until the queue drains, or panics after a few seconds.
    pub async fn wait_for_empty_queue(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !self.queue().is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "queue did not drain: {:?}", self.queue().snapshot());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Shuts the daemon down and returns how the server ended.
    pub async fn stop(self) -> anyhow::Result<()> {
        self.gsh.cancel_and_await_with_timeout().await?;
        self.handle.await.expect("daemon task panicked")
    }
}
