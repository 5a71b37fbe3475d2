//! Process-wide membership: which connections are admitted and under which
//! names.
//!
//! `members` and `names` live behind one mutex so they can never disagree.
//! Critical sections only touch the maps; all network I/O happens on a
//! [`Registry::snapshot`] taken outside the lock.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::Mutex;

use crate::peer::Peer;

/// Identity of one upgraded connection. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected,
}

/// One admitted connection as seen by a broadcast.
#[derive(Clone)]
pub struct Member {
    pub id: ConnId,
    pub name: String,
    pub peer: Weak<Peer>,
}

pub struct Registry {
    membership: Mutex<Membership>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct Membership {
    members: HashMap<ConnId, Member>,
    names: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            membership: Mutex::new(Membership::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> ConnId {
        ConnId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Claims `name` for `peer`, or leaves the registry untouched if the name
    /// is already held by anyone.
    pub async fn try_admit(&self, peer: &Arc<Peer>, name: &str) -> Admission {
        let mut membership = self.membership.lock().await;

        if membership.names.contains(name) {
            return Admission::Rejected;
        }

        let id = peer.id();
        membership.names.insert(name.to_string());
        membership.members.insert(
            id,
            Member {
                id,
                name: name.to_string(),
                peer: Arc::downgrade(peer),
            },
        );
        Admission::Admitted
    }

    /// Removes `id` and frees its name. Returns the freed name, or `None` if
    /// the connection was not a member.
    pub async fn evict(&self, id: ConnId) -> Option<String> {
        let mut membership = self.membership.lock().await;
        let member = membership.members.remove(&id)?;
        membership.names.remove(&member.name);
        Some(member.name)
    }

    pub async fn snapshot(&self) -> Vec<Member> {
        let membership = self.membership.lock().await;
        membership.members.values().cloned().collect()
    }

    /// Currently claimed names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let membership = self.membership.lock().await;
        let mut names: Vec<String> = membership.names.iter().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.membership.lock().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    async fn is_consistent(&self) -> bool {
        let membership = self.membership.lock().await;
        let values: HashSet<&String> = membership.members.values().map(|m| &m.name).collect();
        values.len() == membership.members.len()
            && values.len() == membership.names.len()
            && values.iter().all(|name| membership.names.contains(*name))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::peer::FrameSink;
    use axum::extract::ws::Message as WsMessage;
    use futures::{SinkExt, sink};

    pub(crate) fn detached_peer(registry: &Registry) -> Arc<Peer> {
        let sink: FrameSink = Box::pin(sink::drain::<WsMessage>().sink_map_err(axum::Error::new));
        Peer::new(registry.next_id(), sink)
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let registry = Registry::new();
        let first = detached_peer(&registry);
        let second = detached_peer(&registry);

        assert_eq!(registry.try_admit(&first, "alice").await, Admission::Admitted);
        assert_eq!(registry.try_admit(&second, "alice").await, Admission::Rejected);

        assert_eq!(registry.names().await, vec!["alice".to_string()]);
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, first.id());
        assert!(registry.is_consistent().await);
    }

    #[tokio::test]
    async fn empty_name_can_be_claimed_once() {
        let registry = Registry::new();
        let first = detached_peer(&registry);
        let second = detached_peer(&registry);

        assert_eq!(registry.try_admit(&first, "").await, Admission::Admitted);
        assert_eq!(registry.try_admit(&second, "").await, Admission::Rejected);
        assert_eq!(registry.names().await, vec![String::new()]);
    }

    #[tokio::test]
    async fn evict_is_idempotent_and_frees_the_name() {
        let registry = Registry::new();
        let alice = detached_peer(&registry);
        let bob = detached_peer(&registry);
        registry.try_admit(&alice, "alice").await;
        registry.try_admit(&bob, "bob").await;

        assert_eq!(registry.evict(alice.id()).await, Some("alice".to_string()));
        assert_eq!(registry.evict(alice.id()).await, None);
        assert_eq!(registry.names().await, vec!["bob".to_string()]);
        assert!(registry.is_consistent().await);

        let rejoin = detached_peer(&registry);
        assert_eq!(registry.try_admit(&rejoin, "alice").await, Admission::Admitted);
    }

    #[tokio::test]
    async fn stale_eviction_does_not_touch_the_new_owner() {
        let registry = Registry::new();
        let old = detached_peer(&registry);
        registry.try_admit(&old, "alice").await;
        registry.evict(old.id()).await;

        let new = detached_peer(&registry);
        registry.try_admit(&new, "alice").await;
        assert_eq!(registry.evict(old.id()).await, None);

        assert_eq!(registry.names().await, vec!["alice".to_string()]);
        assert_eq!(registry.snapshot().await[0].id, new.id());
    }

    #[tokio::test]
    async fn snapshot_is_a_point_in_time_copy() {
        let registry = Registry::new();
        let alice = detached_peer(&registry);
        let bob = detached_peer(&registry);
        registry.try_admit(&alice, "alice").await;

        let snapshot = registry.snapshot().await;
        registry.try_admit(&bob, "bob").await;
        registry.evict(alice.id()).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "alice");
        assert_eq!(registry.names().await, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_admissions_keep_names_unique() {
        let registry = Arc::new(Registry::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let peer = detached_peer(&registry);
                let admission = registry.try_admit(&peer, "shared").await;
                (admission, peer)
            }));
        }

        let mut admitted = 0;
        let mut peers = Vec::new();
        for handle in handles {
            let (admission, peer) = handle.await.expect("task");
            if admission == Admission::Admitted {
                admitted += 1;
            }
            peers.push(peer);
        }

        assert_eq!(admitted, 1);
        assert_eq!(registry.len().await, 1);
        assert!(registry.is_consistent().await);
    }
}
