use axum::extract::ws::Message as WsMessage;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Sender name reserved for notices the relay itself emits.
pub const SERVER_SENDER: &str = "Server";

pub const NAME_TAKEN_TEXT: &str = "Username already taken";

/// The only application frame on the wire, in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub text: String,
}

impl Message {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    pub fn server(text: impl Into<String>) -> Self {
        Self::new(SERVER_SENDER, text)
    }

    pub fn name_taken() -> Self {
        Self::server(NAME_TAKEN_TEXT)
    }

    pub fn joined(name: &str) -> Self {
        Self::server(format!("{name} has joined the chat"))
    }

    pub fn to_frame(&self) -> Result<WsMessage, serde_json::Error> {
        serde_json::to_string(self).map(WsMessage::Text)
    }
}

/// Reads the next data frame and decodes it as a [`Message`].
///
/// Control frames are skipped. A close frame and the end of the stream both
/// surface as [`FrameError::Closed`].
pub async fn read_message<S>(inbound: &mut S) -> Result<Message, FrameError>
where
    S: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
{
    loop {
        let frame = match inbound.next().await {
            Some(frame) => frame?,
            None => return Err(FrameError::Closed),
        };

        match frame {
            WsMessage::Text(text) => return Ok(serde_json::from_str(&text)?),
            WsMessage::Binary(bytes) => return Ok(serde_json::from_slice(&bytes)?),
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => return Err(FrameError::Closed),
        }
    }
}
