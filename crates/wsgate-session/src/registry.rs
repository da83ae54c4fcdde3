//! The session registry: who is connected, and to which apps.
//!
//! This is the only shared mutable state in the gateway. Connection tasks
//! mutate it (register, subscribe, deregister) and the push path reads it
//! (lookup, outbox). Nothing else touches the maps directly.
//!
//! # Layout
//!
//! ```text
//! members: MemberId ──→ { ConnectionId ──→ (apps, outbox) }
//! owners:  ConnectionId ──→ MemberId
//! ```
//!
//! The (member, app) → connections index is not stored separately. It is
//! derived from each connection's app set under the member's shard lock,
//! so a connection can never appear in the index without being live and
//! registered, and removing a connection removes every edge in one step.
//!
//! # Concurrency
//!
//! Both maps are `DashMap`s, sharded by key, so unrelated members never
//! contend. No method holds a guard on one map while locking the other.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::mpsc;
use wsgate_protocol::{AppName, MemberId};
use wsgate_transport::ConnectionId;

use crate::RegistryError;

/// One outbound frame, shared between every recipient of a push.
pub type Outbound = Arc<[u8]>;

/// Handle for writing frames to a connection's task.
///
/// Bounded. The connection task owns the receiving end. Once it exits,
/// sends fail as closed, which is how the push path notices a connection
/// that closed under it; a full outbox means the client is not reading.
pub type Outbox = mpsc::Sender<Outbound>;

struct ConnectionEntry {
    apps: HashSet<AppName>,
    outbox: Outbox,
}

#[derive(Default)]
struct MemberEntry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

/// Point-in-time counts, served by the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Registered (authenticated) connections.
    pub connections: usize,
    /// Distinct members with at least one connection.
    pub members: usize,
    /// Number of connections subscribed to each app.
    pub apps: BTreeMap<AppName, usize>,
}

/// Concurrent routing table from members and apps to live connections.
#[derive(Default)]
pub struct SessionRegistry {
    members: DashMap<MemberId, MemberEntry>,
    owners: DashMap<ConnectionId, MemberId>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an authenticated connection with no subscriptions.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyRegistered`] if `conn_id` is already present.
    pub fn register(
        &self,
        conn_id: ConnectionId,
        member_id: MemberId,
        outbox: Outbox,
    ) -> Result<(), RegistryError> {
        match self.owners.entry(conn_id) {
            Entry::Occupied(_) => return Err(RegistryError::AlreadyRegistered(conn_id)),
            Entry::Vacant(slot) => {
                slot.insert(member_id);
            }
        }

        self.members.entry(member_id).or_default().connections.insert(
            conn_id,
            ConnectionEntry {
                apps: HashSet::new(),
                outbox,
            },
        );

        tracing::debug!(%conn_id, %member_id, "connection registered");
        Ok(())
    }

    /// Subscribes a registered connection to `app`.
    ///
    /// Returns `true` if the subscription is new, `false` if the connection
    /// was already subscribed (the call is then a no-op).
    ///
    /// # Errors
    /// [`RegistryError::NotRegistered`] if the connection is unknown or has
    /// been deregistered.
    pub fn subscribe(&self, conn_id: ConnectionId, app: AppName) -> Result<bool, RegistryError> {
        let member_id = self
            .member_of(conn_id)
            .ok_or(RegistryError::NotRegistered(conn_id))?;

        // A deregister may have run between the two lookups; the member
        // entry is the authority.
        let mut member = self
            .members
            .get_mut(&member_id)
            .ok_or(RegistryError::NotRegistered(conn_id))?;
        let conn = member
            .connections
            .get_mut(&conn_id)
            .ok_or(RegistryError::NotRegistered(conn_id))?;

        let added = conn.apps.insert(app);
        if added {
            tracing::debug!(%conn_id, %member_id, "subscription added");
        }
        Ok(added)
    }

    /// Removes a connection and every index entry that points at it.
    ///
    /// Idempotent: returns `true` if this call removed the connection and
    /// `false` if it was already gone.
    pub fn deregister(&self, conn_id: ConnectionId) -> bool {
        let Some((_, member_id)) = self.owners.remove(&conn_id) else {
            return false;
        };

        if let Entry::Occupied(mut member) = self.members.entry(member_id) {
            member.get_mut().connections.remove(&conn_id);
            if member.get().connections.is_empty() {
                member.remove();
            }
        }

        tracing::debug!(%conn_id, %member_id, "connection deregistered");
        true
    }

    /// Returns the live connections of `member_id` subscribed to `app`.
    ///
    /// Empty if there are none. The set is taken under the member's shard
    /// lock, so it never contains a connection whose deregistration has
    /// already completed.
    pub fn lookup(&self, member_id: MemberId, app: &AppName) -> HashSet<ConnectionId> {
        self.members
            .get(&member_id)
            .map(|member| {
                member
                    .connections
                    .iter()
                    .filter(|(_, conn)| conn.apps.contains(app))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the outbound handle of a registered connection.
    pub fn outbox(&self, conn_id: ConnectionId) -> Option<Outbox> {
        let member_id = self.member_of(conn_id)?;
        let member = self.members.get(&member_id)?;
        member
            .connections
            .get(&conn_id)
            .map(|conn| conn.outbox.clone())
    }

    /// Returns the member a connection is registered under.
    pub fn member_of(&self, conn_id: ConnectionId) -> Option<MemberId> {
        self.owners.get(&conn_id).map(|owner| *owner)
    }

    /// Returns the apps a connection is subscribed to.
    pub fn subscriptions(&self, conn_id: ConnectionId) -> Option<HashSet<AppName>> {
        let member_id = self.member_of(conn_id)?;
        let member = self.members.get(&member_id)?;
        member.connections.get(&conn_id).map(|conn| conn.apps.clone())
    }

    /// Returns `true` if the connection is registered.
    pub fn contains(&self, conn_id: ConnectionId) -> bool {
        self.owners.contains_key(&conn_id)
    }

    /// Returns `true` if the member has at least one registered connection.
    pub fn has_member(&self, member_id: MemberId) -> bool {
        self.members.contains_key(&member_id)
    }

    /// Collects connection, member, and per-app subscription counts.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for member in self.members.iter() {
            stats.members += 1;
            for conn in member.connections.values() {
                stats.connections += 1;
                for app in &conn.apps {
                    *stats.apps.entry(app.clone()).or_default() += 1;
                }
            }
        }
        stats
    }
}
