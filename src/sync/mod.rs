//! State synchronization: snapshot versions, per-client diffs, delivery

pub mod codec;
pub mod diff;
pub mod dispatch;
pub mod interpolation;
pub mod snapshot;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::game::session::SessionError;
use crate::ws::protocol::{GameEvent, ServerMsg};

use self::dispatch::ClientLink;
use self::snapshot::{EntityKey, EntityState, SnapshotStore};

/// Delivery state for one player slot
#[derive(Debug)]
struct ClientSync {
    /// None while the player is disconnected
    link: Option<ClientLink>,
    /// Highest version the client has acknowledged
    acked: u64,
    /// Version of the last diff handed to the link
    offered: u64,
}

/// Turns committed session state into per-client messages
#[derive(Debug, Default)]
pub struct Synchronizer {
    store: SnapshotStore,
    clients: BTreeMap<Uuid, ClientSync>,
}

impl Synchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    /// Bind (or rebind) a player's connection. Acknowledgement state is
    /// reset, so the next commit sends that client a full snapshot.
    pub fn attach(&mut self, user_id: Uuid, link: ClientLink) {
        debug!(user_id = %user_id, connection = %link.id, "Client attached");
        self.clients.insert(
            user_id,
            ClientSync {
                link: Some(link),
                acked: 0,
                offered: 0,
            },
        );
    }

    /// Unbind a player if `connection` is still the current link.
    /// Returns false when a newer connection already replaced it.
    pub fn detach(&mut self, user_id: Uuid, connection: Uuid) -> bool {
        match self.clients.get_mut(&user_id) {
            Some(client) if client.link.as_ref().map(|l| l.id) == Some(connection) => {
                client.link = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self, user_id: Uuid) -> bool {
        self.clients
            .get(&user_id)
            .and_then(|c| c.link.as_ref())
            .is_some_and(|link| !link.is_closed())
    }

    pub fn link(&self, user_id: Uuid) -> Option<&ClientLink> {
        self.clients.get(&user_id).and_then(|c| c.link.as_ref())
    }

    /// Record an acknowledgement. Versions the server never produced are
    /// rejected; older acks are harmless and ignored.
    pub fn acknowledge(&mut self, user_id: Uuid, version: u64) -> Result<(), SessionError> {
        if version > self.store.version() {
            return Err(SessionError::InvalidInput(format!(
                "ack for version {version} ahead of {}",
                self.store.version()
            )));
        }
        let client = self
            .clients
            .get_mut(&user_id)
            .ok_or_else(|| SessionError::InvalidInput("not a member of this session".into()))?;
        client.acked = client.acked.max(version);
        Ok(())
    }

    pub fn acked(&self, user_id: Uuid) -> Option<u64> {
        self.clients.get(&user_id).map(|c| c.acked)
    }

    pub fn send_to(&self, user_id: Uuid, msg: ServerMsg) -> bool {
        self.link(user_id).is_some_and(|link| link.send(msg))
    }

    pub fn broadcast(&self, msg: ServerMsg) {
        for client in self.clients.values() {
            if let Some(link) = &client.link {
                link.send(msg.clone());
            }
        }
    }

    /// High-priority tier: every event goes to every connected client, in order
    pub fn publish_events(&self, events: &[GameEvent]) {
        for event in events {
            self.broadcast(ServerMsg::Event(event.clone()));
        }
    }

    /// Commit post-tick state and offer each connected client a diff from
    /// its acknowledged version. Returns the current version.
    pub fn commit(&mut self, tick: u64, entities: BTreeMap<EntityKey, EntityState>) -> u64 {
        self.store.commit(tick, entities);
        let version = self.store.version();

        for (user_id, client) in self.clients.iter_mut() {
            let Some(link) = &client.link else {
                continue;
            };
            if client.offered == version || client.acked == version {
                continue;
            }
            let diff = self.store.diff_since(client.acked);
            trace!(
                user_id = %user_id,
                version,
                baseline = diff.baseline_version,
                changed = diff.entities_changed.len(),
                removed = diff.entities_removed.len(),
                "Offering diff"
            );
            link.offer_diff(Arc::new(diff));
            client.offered = version;
        }

        let min_acked = self
            .clients
            .values()
            .filter(|c| c.link.is_some())
            .map(|c| c.acked)
            .min();
        if let Some(min_acked) = min_acked {
            self.store.prune(min_acked);
        }
        version
    }
}

#[cfg(test)]
mod tests {
    use super::dispatch::Outbound;
    use super::*;
    use crate::game::grid::{Cell, CellKind};
    use crate::sync::snapshot::TileView;

    fn tiles(count: i32) -> BTreeMap<EntityKey, EntityState> {
        (0..count)
            .map(|x| {
                let entity = EntityState::Tile(TileView {
                    cell: Cell::new(x, 0),
                    kind: CellKind::Empty,
                });
                (entity.key(), entity)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_first_commit_offers_full_snapshot() {
        let user = Uuid::new_v4();
        let (link, mut feed) = ClientLink::channel();
        let mut sync = Synchronizer::new();
        sync.attach(user, link);

        sync.commit(1, tiles(2));

        match feed.next().await {
            Some(Outbound::Diff(diff)) => {
                assert!(diff.is_full());
                assert_eq!(diff.entities_changed.len(), 2);
            }
            other => panic!("expected diff, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_acked_client_gets_incremental_diff() {
        let user = Uuid::new_v4();
        let (link, mut feed) = ClientLink::with_interval(std::time::Duration::ZERO);
        let mut sync = Synchronizer::new();
        sync.attach(user, link);

        sync.commit(1, tiles(2));
        feed.next().await;
        sync.acknowledge(user, 1).unwrap();
        sync.commit(2, tiles(3));

        match feed.next().await {
            Some(Outbound::Diff(diff)) => {
                assert_eq!(diff.baseline_version, 1);
                assert_eq!(diff.entities_changed.len(), 1);
            }
            other => panic!("expected diff, got {other:?}"),
        }
    }

    #[test]
    fn test_future_ack_is_invalid() {
        let user = Uuid::new_v4();
        let (link, _feed) = ClientLink::channel();
        let mut sync = Synchronizer::new();
        sync.attach(user, link);
        sync.commit(1, tiles(1));

        assert!(matches!(
            sync.acknowledge(user, 5),
            Err(SessionError::InvalidInput(_))
        ));
        assert!(sync.acknowledge(user, 1).is_ok());
        assert_eq!(sync.acked(user), Some(1));
    }

    #[test]
    fn test_stale_detach_keeps_new_link() {
        let user = Uuid::new_v4();
        let (old, _old_feed) = ClientLink::channel();
        let (new, _new_feed) = ClientLink::channel();
        let mut sync = Synchronizer::new();
        sync.attach(user, old.clone());
        sync.attach(user, new.clone());

        assert!(!sync.detach(user, old.id));
        assert!(sync.is_connected(user));
        assert!(sync.detach(user, new.id));
        assert!(!sync.is_connected(user));
    }
}
