// Line-delimited JSON framing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{LinesCodec, LinesCodecError};

/// Longest accepted message, newline excluded.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Frame(#[from] LinesCodecError),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Codec used on both ends of the socket.
pub fn lines() -> LinesCodec {
    LinesCodec::new_with_max_length(MAX_LINE_LENGTH)
}

pub fn encode<T: Serialize>(msg: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string(msg)?)
}

pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, WireError> {
    Ok(serde_json::from_str(line)?)
}
