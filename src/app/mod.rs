// Daemon application: lock state, governor backend and the socket server.

#[allow(clippy::module_inception)]
mod app;
mod server;

pub use app::App;
pub use server::Server;
