use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    error::DeliveryError,
    message::Message,
    registry::{ConnId, Member, Registry},
};

/// Outcome of one [`Broadcaster::broadcast`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Fans a message out to every admitted connection.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Sends `message` to every member of a fresh snapshot except `exclude`.
    ///
    /// Peers are written concurrently and outside the registry lock. A peer
    /// that cannot be written to is closed and evicted; the rest still get
    /// the frame.
    pub async fn broadcast(&self, message: &Message, exclude: Option<ConnId>) -> BroadcastReport {
        let snapshot = self.registry.snapshot().await;
        let deliveries = snapshot
            .into_iter()
            .filter(|member| Some(member.id) != exclude)
            .map(|member| self.deliver(member, message));

        let mut report = BroadcastReport::default();
        for delivery in join_all(deliveries).await {
            match delivery {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Evicted => report.evicted += 1,
                Delivery::AlreadyGone => {}
            }
        }

        debug!(
            sender = %message.sender,
            delivered = report.delivered,
            evicted = report.evicted,
            "broadcast complete"
        );
        report
    }

    async fn deliver(&self, member: Member, message: &Message) -> Delivery {
        let err = match member.peer.upgrade() {
            Some(peer) => match peer.send(message).await {
                Ok(()) => return Delivery::Delivered,
                Err(err) => {
                    peer.close().await;
                    err
                }
            },
            None => DeliveryError::Gone(member.id),
        };

        // The owning session may have torn down after the snapshot was taken.
        if self.registry.evict(member.id).await.is_some() {
            warn!(conn = %member.id, name = %member.name, error = %err, "evicted peer after failed send");
            Delivery::Evicted
        } else {
            debug!(conn = %member.id, error = %err, "send to departed peer failed");
            Delivery::AlreadyGone
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Evicted,
    AlreadyGone,
}
