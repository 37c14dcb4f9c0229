pub mod app;
pub mod client;
pub mod config;
pub mod cpupower;
pub mod governor;
pub mod lock;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod session;
pub mod shutdown;
pub mod transport;

#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;
