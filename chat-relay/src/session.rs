use std::{fmt, sync::Arc};

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::StreamExt;
use tokio::select;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    broadcast::Broadcaster,
    error::SessionError,
    message::{Message, read_message},
    peer::{FrameSink, FrameStream, Peer},
    registry::{Admission, Registry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Admitting,
    Live,
    Closed,
}

impl SessionState {
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Admitting)
                | (Connecting, Closed)
                | (Admitting, Live)
                | (Admitting, Closed)
                | (Live, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Connecting => "connecting",
            SessionState::Admitting => "admitting",
            SessionState::Live => "live",
            SessionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// One connection from upgrade to teardown.
pub struct Session {
    state: SessionState,
    inbound: FrameStream,
    peer: Arc<Peer>,
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
}

impl Session {
    pub fn new(
        inbound: FrameStream,
        outbound: FrameSink,
        registry: Arc<Registry>,
        broadcaster: Broadcaster,
    ) -> Self {
        let peer = Peer::new(registry.next_id(), outbound);
        Self {
            state: SessionState::Connecting,
            inbound,
            peer,
            registry,
            broadcaster,
        }
    }

    /// Entry point for an upgraded socket.
    pub async fn accept(socket: WebSocket, registry: Arc<Registry>, broadcaster: Broadcaster) {
        let (outbound, inbound) = socket.split::<WsMessage>();
        let session = Session::new(Box::pin(inbound), Box::pin(outbound), registry, broadcaster);
        session.run().await;
    }

    pub async fn run(mut self) {
        let span = info_span!("session", conn = %self.peer.id());
        async move {
            self.advance(SessionState::Admitting);
            match self.admit().await {
                Ok(name) => {
                    self.advance(SessionState::Live);
                    info!(%name, "client joined");
                    self.broadcaster
                        .broadcast(&Message::joined(&name), Some(self.peer.id()))
                        .await;
                    if let Err(err) = self.read_loop().await {
                        debug!(%name, error = %err, "client left");
                    }
                }
                Err(err @ SessionError::NameConflict(_)) => info!(error = %err, "admission rejected"),
                Err(err) => warn!(error = %err, "admission failed"),
            }
            self.close().await;
        }
        .instrument(span)
        .await
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "session transition");
        self.state = next;
    }

    async fn admit(&mut self) -> Result<String, SessionError> {
        let hello = read_message(&mut self.inbound)
            .await
            .map_err(SessionError::AdmissionRead)?;

        // The admission frame's `text` is ignored; only the name matters.
        let name = hello.sender;
        match self.registry.try_admit(&self.peer, &name).await {
            Admission::Admitted => Ok(name),
            Admission::Rejected => {
                if let Err(err) = self.peer.send(&Message::name_taken()).await {
                    debug!(error = %err, "failed to deliver rejection notice");
                }
                Err(SessionError::NameConflict(name))
            }
        }
    }

    /// Forwards every inbound frame until the connection fails, closes, or is
    /// closed by a broadcast that could not write to it.
    async fn read_loop(&mut self) -> Result<(), SessionError> {
        let Session {
            inbound,
            peer,
            broadcaster,
            ..
        } = self;

        loop {
            let message = select! {
                message = read_message(&mut *inbound) => message.map_err(SessionError::PeerRead)?,
                _ = peer.closed() => {
                    debug!("transport closed by broadcaster");
                    return Ok(());
                }
            };

            // `sender` is forwarded verbatim; it is not checked against the admitted name.
            broadcaster.broadcast(&message, None).await;
        }
    }

    async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.advance(SessionState::Closed);

        if let Some(name) = self.registry.evict(self.peer.id()).await {
            info!(%name, "client disconnected");
        }
        self.peer.close().await;
    }
}
