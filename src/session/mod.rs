//! Per-connection protocol state machine.
//!
//! Each connection gets a [`Session`]. A receive task decodes requests from
//! the socket while the dispatch loop waits on whichever comes first: the
//! next request, the lock grant, or daemon shutdown. Whatever ends the
//! connection, the session restores any governor override and then leaves
//! the lock queue.

pub mod error;
pub mod identity;


pub use error::{ProtocolError, SessionError};

use chrono::Local;
use futures::{SinkExt, StreamExt};
use std::mem;
use std::sync::Arc;
use tokio::net::unix::OwnedReadHalf;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cpupower::PowerControl;
use crate::governor::GovernorController;
use crate::lock::{Abandoned, LockQueue, Waiter};
use crate::protocol::{self, Action, Response, WireError};

/// Label timestamp, e.g. `Jan  2 15:04:05`.
const LABEL_TIME_FORMAT: &str = "%b %e %H:%M:%S";

enum State {
    Idle,
    Acquiring(Waiter),
    Holding(Waiter),
}

impl State {
    fn is_acquiring(&self) -> bool {
        matches!(self, State::Acquiring(_))
    }

    fn holds_exclusive(&self) -> bool {
        matches!(self, State::Holding(w) if !w.is_shared())
    }
}

enum Event {
    Request(Option<Action>),
    Granted(Result<(), Abandoned>),
    Shutdown,
}

pub struct Session {
    user: String,
    queue: Arc<LockQueue>,
    governor: GovernorController,
    state: State,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(queue: Arc<LockQueue>, power: Arc<dyn PowerControl>, shutdown: CancellationToken) -> Self {
        Self {
            user: identity::UNKNOWN_USER.to_string(),
            queue,
            governor: GovernorController::new(power),
            state: State::Idle,
            shutdown,
        }
    }

    /// Serves one connection until it closes. Held resources are released
    /// when the session is dropped at the end.
    pub async fn serve(mut self, stream: UnixStream) {
        crate::metrics::session_opened();

        match self.run(stream).await {
            Ok(()) => debug!(
                component = "session",
                event = "closed",
                user = %self.user,
                "connection closed"
            ),
            Err(SessionError::Protocol(e)) => {
                crate::metrics::add_protocol_error();
                warn!(
                    component = "session",
                    event = "protocol_error",
                    user = %self.user,
                    error = %e,
                    "dropping connection"
                );
            }
            Err(e) => warn!(
                component = "session",
                event = "connection_failed",
                user = %self.user,
                error = %e,
                "dropping connection"
            ),
        }

        crate::metrics::session_closed();
    }

    async fn run(&mut self, stream: UnixStream) -> Result<(), SessionError> {
        self.user = identity::peer_user_name(&stream).map_err(SessionError::Credentials)?;

        let (read, write) = stream.into_split();
        let mut requests = receive(FramedRead::new(read, protocol::lines()));
        let mut responses = FramedWrite::new(write, protocol::lines());

        loop {
            let event = tokio::select! {
                request = requests.recv() => Event::Request(request),
                granted = grant(&mut self.state), if self.state.is_acquiring() => Event::Granted(granted),
                _ = self.shutdown.cancelled() => Event::Shutdown,
            };

            let response = match event {
                Event::Request(None) => return Ok(()),
                Event::Shutdown => {
                    info!(
                        component = "session",
                        event = "shutdown",
                        user = %self.user,
                        "closing connection on shutdown"
                    );
                    return Ok(());
                }
                Event::Granted(granted) => {
                    granted?;
                    self.on_granted()
                }
                Event::Request(Some(action)) => match self.dispatch(action)? {
                    Some(response) => response,
                    None => continue,
                },
            };

            let line = protocol::encode(&response)?;
            responses.send(line).await.map_err(WireError::from)?;
        }
    }

    /// Handles one request. `None` means the response is deferred until the
    /// lock is granted.
    fn dispatch(&mut self, action: Action) -> Result<Option<Response>, SessionError> {
        if self.state.is_acquiring() {
            return Err(ProtocolError::MessageWhileAcquiring.into());
        }

        match action {
            Action::Acquire {
                shared,
                nonblocking,
                msg,
            } => {
                if !matches!(self.state, State::Idle) {
                    return Err(ProtocolError::DoubleAcquire.into());
                }
                let label = self.label(&msg, shared);
                match self.queue.enqueue(shared, nonblocking, label) {
                    Some(waiter) => {
                        debug!(
                            component = "session",
                            event = "enqueued",
                            user = %self.user,
                            waiter = %waiter.id(),
                            shared,
                            "waiting for lock"
                        );
                        self.state = State::Acquiring(waiter);
                        Ok(None)
                    }
                    None => {
                        crate::metrics::add_denied();
                        Ok(Some(Response::Acquired(false)))
                    }
                }
            }

            Action::List => Ok(Some(Response::Queue(self.queue.snapshot()))),

            Action::SetGovernor { percent } => {
                if !self.state.holds_exclusive() {
                    return Err(ProtocolError::GovernorWithoutExclusiveLock.into());
                }
                let reply = match self.governor.set_target(percent) {
                    Ok(()) => String::new(),
                    Err(e) => {
                        crate::metrics::add_governor_error();
                        warn!(
                            component = "session",
                            event = "governor_failed",
                            user = %self.user,
                            percent,
                            error = %e,
                            "failed to set governor"
                        );
                        e.to_string()
                    }
                };
                Ok(Some(Response::Governor(reply)))
            }

            Action::Unknown => Err(ProtocolError::UnknownAction.into()),
        }
    }

    fn on_granted(&mut self) -> Response {
        self.state = match mem::replace(&mut self.state, State::Idle) {
            State::Acquiring(waiter) => {
                crate::metrics::add_granted();
                info!(
                    component = "session",
                    event = "granted",
                    user = %self.user,
                    waiter = %waiter.id(),
                    shared = waiter.is_shared(),
                    "lock acquired"
                );
                State::Holding(waiter)
            }
            other => other,
        };
        Response::Acquired(true)
    }

    fn label(&self, msg: &str, shared: bool) -> String {
        let mut label = format!("{}\t{}\t{}", self.user, Local::now().format(LABEL_TIME_FORMAT), msg);
        if shared {
            label.push_str(" [shared]");
        }
        label
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The override must be gone before the next holder is woken. The
        // restore is a few small sysfs writes, so blocking this worker is fine
        // and keeps it ahead of the dequeue on every exit path, panics included.
        if self.governor.is_active() {
            if let Err(e) = self.governor.restore() {
                crate::metrics::add_governor_error();
                error!(
                    component = "session",
                    event = "restore_failed",
                    user = %self.user,
                    error = %e,
                    "failed to restore governor"
                );
            }
        }

        match mem::replace(&mut self.state, State::Idle) {
            State::Acquiring(waiter) | State::Holding(waiter) => {
                self.queue.dequeue(&waiter);
                debug!(
                    component = "session",
                    event = "released",
                    user = %self.user,
                    waiter = %waiter.id(),
                    "lock released"
                );
            }
            State::Idle => {}
        }
    }
}

/// Resolves when the pending acquisition is granted. Never resolves in any
/// other state.
async fn grant(state: &mut State) -> Result<(), Abandoned> {
    match state {
        State::Acquiring(waiter) => waiter.granted().await,
        _ => std::future::pending().await,
    }
}

/// Spawns the receive task. The returned channel closes on end of stream, on
/// the first undecodable message, or once the session stops listening.
fn receive(mut frames: FramedRead<OwnedReadHalf, LinesCodec>) -> mpsc::Receiver<Action> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = frames.next() => frame,
                _ = tx.closed() => break,
            };
            let decoded = match frame {
                None => break,
                Some(frame) => frame
                    .map_err(WireError::from)
                    .and_then(|line| protocol::decode::<Action>(&line)),
            };
            let action = match decoded {
                Ok(action) => action,
                Err(e) => {
                    warn!(
                        component = "session",
                        event = "receive_failed",
                        error = %e,
                        "failed to read request"
                    );
                    break;
                }
            };
            if tx.send(action).await.is_err() {
                break;
            }
        }
    });

    rx
}
