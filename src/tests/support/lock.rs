//! Global test lock for tests that touch process-wide state.
//!
//! Runner tests spawn child processes and signal the test binary itself; a
//! signal sent by one of them must not reach another's command.

use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};

static GLOBAL_TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Holds the global test lock until the guard is dropped.
pub async fn global_lock() -> MutexGuard<'static, ()> {
    GLOBAL_TEST_LOCK.get_or_init(|| Mutex::new(())).lock().await
}
