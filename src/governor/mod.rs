//! CPU governor override scoped to one exclusive lock hold.

pub mod controller;

#[cfg(test)]
mod controller_test;

pub use controller::{target_frequency, GovernorController, GovernorError};
