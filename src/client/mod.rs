//! Async client for the daemon's wire protocol.

use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::io;
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::protocol::{self, Action, WireError};
use crate::transport;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connecting to {socket}: {source}")]
    Connect {
        socket: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("connection closed by daemon")]
    Closed,
    #[error("setting governor: {0}")]
    Governor(String),
}

/// One connection to the daemon. Dropping it releases any lock it holds.
pub struct Client {
    frames: Framed<UnixStream, LinesCodec>,
}

impl Client {
    pub async fn connect(socket: &str) -> Result<Self, ClientError> {
        let stream = transport::connect(socket)
            .await
            .map_err(|source| ClientError::Connect {
                socket: socket.to_string(),
                source,
            })?;
        Ok(Self::new(stream))
    }

    pub fn new(stream: UnixStream) -> Self {
        Self {
            frames: Framed::new(stream, protocol::lines()),
        }
    }

    /// Acquires the lock. With `nonblocking`, returns `false` instead of
    /// waiting if the lock cannot be granted right away.
    pub async fn acquire(&mut self, shared: bool, nonblocking: bool, msg: &str) -> Result<bool, ClientError> {
        self.call(&Action::Acquire {
            shared,
            nonblocking,
            msg: msg.to_string(),
        })
        .await
    }

    /// Current holders and waiters, head first.
    pub async fn list(&mut self) -> Result<Vec<String>, ClientError> {
        self.call(&Action::List).await
    }

    /// Pins the CPU frequency. Requires an exclusive hold.
    pub async fn set_governor(&mut self, percent: i32) -> Result<(), ClientError> {
        let err: String = self.call(&Action::SetGovernor { percent }).await?;
        if err.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Governor(err))
        }
    }

    /// Sends a request and waits for its response.
    pub async fn call<T: DeserializeOwned>(&mut self, action: &Action) -> Result<T, ClientError> {
        self.send(action).await?;
        self.recv().await
    }

    pub async fn send(&mut self, action: &Action) -> Result<(), ClientError> {
        let line = protocol::encode(action)?;
        self.frames.send(line).await.map_err(WireError::from)?;
        Ok(())
    }

    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<T, ClientError> {
        let line = self
            .frames
            .next()
            .await
            .ok_or(ClientError::Closed)?
            .map_err(WireError::from)?;
        Ok(protocol::decode(&line)?)
    }
}
