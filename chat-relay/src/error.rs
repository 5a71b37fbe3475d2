use thiserror::Error;

use crate::registry::ConnId;

/// Failure to read one application frame from a connection.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The peer sent a close frame or the stream ended.
    #[error("connection closed")]
    Closed,
    /// WebSocket transport error, including oversized frames.
    #[error("websocket error: {0}")]
    Transport(#[from] axum::Error),
    /// The frame was not a `{"sender", "text"}` JSON object.
    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors that end a session. All of them are handled inside the session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The HTTP connection could not be upgraded to a WebSocket.
    #[error("websocket upgrade failed: {0}")]
    Upgrade(#[source] axum::Error),
    /// The first frame never arrived or could not be decoded.
    #[error("failed to read admission frame: {0}")]
    AdmissionRead(#[source] FrameError),
    /// The requested display name is already claimed.
    #[error("name {0:?} is already taken")]
    NameConflict(String),
    /// A frame from an admitted connection could not be read.
    #[error("failed to read frame: {0}")]
    PeerRead(#[source] FrameError),
}

/// Failure to hand a broadcast frame to one peer.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The owning session already dropped its connection.
    #[error("peer {0} is gone")]
    Gone(ConnId),
    /// Encoding or writing the frame failed.
    #[error("failed to write to peer {conn}: {source}")]
    Write {
        conn: ConnId,
        #[source]
        source: axum::Error,
    },
}
