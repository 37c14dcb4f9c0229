// Shared test support code for unit and integration tests.

pub mod harness;
pub mod lock;
pub mod power;
pub mod sysfs;

pub use harness::{TestDaemon, FREQS};
pub use lock::global_lock;
pub use power::{MemoryDomain, MemoryPower};
pub use sysfs::FakeSysfs;
