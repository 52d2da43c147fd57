//! Serialization and deserialization for the CampLink wire protocol.
//!
//! Frames are JSON text, one event object per WebSocket message.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Frame bytes are not valid UTF-8.
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] std::str::Utf8Error),
}

/// Encodes an event into a JSON text frame.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the event cannot be serialized.
pub fn encode<T: Serialize>(event: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(event)?)
}

/// Decodes an event from the raw bytes of a text or binary frame.
///
/// # Errors
///
/// Returns `CodecError::InvalidFrame` if the bytes are not UTF-8, or
/// `CodecError::Serialization` if they are not a known event.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(serde_json::from_str(text)?)
}
