use super::{Config, Daemon, Governor, Logs, PerflockBox, Shutdown};
use std::path::Path;
use std::time::Duration;

/// Creates a new test configuration serving `socket` with governor control
/// rooted at `sysfs_dir`.
pub fn new_test_config(socket: &str, sysfs_dir: &Path) -> Config {
    Config {
        perflock: PerflockBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            daemon: Some(Daemon {
                socket: Some(socket.to_string()),
                socket_mode: Some("0700".to_string()),
            }),
            governor: Some(Governor {
                sysfs_dir: Some(sysfs_dir.to_path_buf()),
                percent: None,
            }),
            metrics: None,
            shutdown: Some(Shutdown {
                timeout: Some(Duration::from_secs(2)),
            }),
            socket_mode: 0o700,
        },
    }
}
