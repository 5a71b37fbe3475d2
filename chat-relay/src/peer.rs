use std::{pin::Pin, sync::Arc};

use axum::extract::ws::Message as WsMessage;
use futures::{Sink, SinkExt, Stream};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::{error::DeliveryError, message::Message, registry::ConnId};

/// Outbound half of a connection, type-erased so tests can swap in channels.
pub type FrameSink = Pin<Box<dyn Sink<WsMessage, Error = axum::Error> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<WsMessage, axum::Error>> + Send>>;

/// Write side of one connection.
///
/// The owning session holds the only strong reference; the registry keeps a
/// `Weak` for dispatch. Writes are serialised by the sink mutex, so frames to
/// a single peer never interleave.
pub struct Peer {
    id: ConnId,
    sink: Mutex<FrameSink>,
    closed: Notify,
}

impl Peer {
    pub fn new(id: ConnId, sink: FrameSink) -> Arc<Self> {
        Arc::new(Self {
            id,
            sink: Mutex::new(sink),
            closed: Notify::new(),
        })
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        let frame = message.to_frame().map_err(|err| DeliveryError::Write {
            conn: self.id,
            source: axum::Error::new(err),
        })?;

        let mut sink = self.sink.lock().await;
        sink.send(frame)
            .await
            .map_err(|source| DeliveryError::Write {
                conn: self.id,
                source,
            })
    }

    /// Closes the transport and wakes the owning session's read loop.
    pub async fn close(&self) {
        {
            let mut sink = self.sink.lock().await;
            if let Err(err) = sink.close().await {
                debug!(conn = %self.id, ?err, "error while closing peer transport");
            }
        }
        self.closed.notify_one();
    }

    /// Resolves once [`Peer::close`] has been called.
    pub async fn closed(&self) {
        self.closed.notified().await;
    }
}
