//! Wire protocol between clients and the daemon.
//!
//! Each message is one line of JSON. Requests are objects tagged by their
//! `action` field; responses are bare JSON values whose shape depends on the
//! request that triggered them.

pub mod codec;

pub use codec::{decode, encode, lines, WireError, MAX_LINE_LENGTH};

use serde::{Deserialize, Serialize};

/// Client → daemon request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Acquires the lock. Answered with a boolean once granted, or `false`
    /// immediately for a denied non-blocking attempt.
    Acquire {
        #[serde(default)]
        shared: bool,
        #[serde(default)]
        nonblocking: bool,
        #[serde(default)]
        msg: String,
    },
    /// Lists current and pending acquisitions, head first.
    List,
    /// Pins the CPU frequency to `percent` between the lowest and highest
    /// available frequency. Requires an exclusive hold. Answered with an empty
    /// string on success or an error description.
    SetGovernor { percent: i32 },
    /// Any action this daemon does not know.
    #[serde(other)]
    Unknown,
}

/// Daemon → client response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Acquired(bool),
    Queue(Vec<String>),
    Governor(String),
}
