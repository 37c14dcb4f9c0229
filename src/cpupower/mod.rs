//! Linux CPU frequency scaling control.
//!
//! [`PowerControl`] and [`PowerDomain`] describe the hardware collaborator;
//! [`SysfsPower`] implements them on top of `/sys/devices/system/cpu`.

pub mod api;
pub mod error;
pub mod io;
pub mod sysfs;


pub use api::{AvailableRange, PowerControl, PowerDomain};
pub use error::PowerError;
pub use sysfs::{SysfsDomain, SysfsPower, DEFAULT_ROOT};
