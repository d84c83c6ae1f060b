//! Replication snapshots for non-authoritative observers.
//!
//! The authority captures a [`WorldSnapshot`] and, between full snapshots,
//! a [`SnapshotDelta`] with only the containers that changed. A [`Replica`]
//! replaces its state wholesale from whichever is newer; it never merges
//! fields and never mutates state on its own.

use crate::authority::Authority;
use crate::container::{ContainerRecord, ContainerSimulator};
use crate::session::{NetworkPlayerData, SessionRecord};
use crate::time::GameClock;
use hydrogrow_common::{ContainerId, PlayerId, SchemaVersion};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors decoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Malformed JSON
    #[error("snapshot decode failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot written by an incompatible schema
    #[error("incompatible snapshot schema: expected {expected}, found {found}")]
    Incompatible {
        /// Schema this build reads
        expected: SchemaVersion,
        /// Schema found in the data
        found: SchemaVersion,
    },
}

/// Full replicated state at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Schema version
    pub version: SchemaVersion,
    /// Authority tick
    pub tick: u64,
    /// Game clock
    pub clock: GameClock,
    /// Session registry
    pub session: SessionRecord,
    /// All containers in ID order
    pub containers: Vec<ContainerRecord>,
}

impl WorldSnapshot {
    /// Captures the authority's current state.
    #[must_use]
    pub fn capture(authority: &Authority) -> Self {
        Self {
            version: SchemaVersion::SNAPSHOT,
            tick: authority.tick_count(),
            clock: authority.clock().clone(),
            session: authority.registry().to_record(),
            containers: authority
                .containers()
                .map(ContainerSimulator::to_record)
                .collect(),
        }
    }

    /// Encodes as JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON, checking the schema version.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(text)?;
        if !SchemaVersion::SNAPSHOT.can_read(&snapshot.version) {
            return Err(SnapshotError::Incompatible {
                expected: SchemaVersion::SNAPSHOT,
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }

    /// Changes from `previous` to this snapshot.
    #[must_use]
    pub fn diff(&self, previous: &WorldSnapshot) -> SnapshotDelta {
        let before: BTreeMap<_, _> = previous.containers.iter().map(|c| (c.id, c)).collect();
        let containers: Vec<_> = self
            .containers
            .iter()
            .filter(|c| before.get(&c.id).map_or(true, |old| *old != *c))
            .cloned()
            .collect();
        let current: BTreeSet<_> = self.containers.iter().map(|c| c.id).collect();
        let removed = before
            .keys()
            .filter(|id| !current.contains(id))
            .copied()
            .collect();
        let session = (self.session != previous.session).then(|| self.session.clone());

        SnapshotDelta {
            version: self.version,
            base_tick: previous.tick,
            tick: self.tick,
            clock: self.clock.clone(),
            session,
            containers,
            removed,
        }
    }
}

/// Changes between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDelta {
    /// Schema version
    pub version: SchemaVersion,
    /// Tick of the snapshot this delta applies on top of
    pub base_tick: u64,
    /// Tick after applying
    pub tick: u64,
    /// Game clock
    pub clock: GameClock,
    /// Session registry, if it changed
    pub session: Option<SessionRecord>,
    /// Containers whose record changed
    pub containers: Vec<ContainerRecord>,
    /// Containers that no longer exist
    pub removed: Vec<ContainerId>,
}

impl SnapshotDelta {
    /// Checks if nothing but the clock changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.session.is_none() && self.containers.is_empty() && self.removed.is_empty()
    }

    /// Encodes as JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes from JSON, checking the schema version.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let delta: Self = serde_json::from_str(text)?;
        if !SchemaVersion::SNAPSHOT.can_read(&delta.version) {
            return Err(SnapshotError::Incompatible {
                expected: SchemaVersion::SNAPSHOT,
                found: delta.version,
            });
        }
        Ok(delta)
    }
}

/// What a replica did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// State replaced
    Applied,
    /// Update was not newer than the replica; ignored
    Stale,
    /// Delta does not start from the replica's tick; a full snapshot is needed
    NeedsSnapshot,
}

/// Read-only copy of the authoritative state.
#[derive(Debug, Clone, Default)]
pub struct Replica {
    tick: Option<u64>,
    clock: Option<GameClock>,
    session: Option<SessionRecord>,
    containers: BTreeMap<ContainerId, ContainerRecord>,
}

impl Replica {
    /// Creates an empty replica.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick of the last applied update.
    #[must_use]
    pub fn tick(&self) -> Option<u64> {
        self.tick
    }

    /// Replicated clock.
    #[must_use]
    pub fn clock(&self) -> Option<&GameClock> {
        self.clock.as_ref()
    }

    /// Replicated session.
    #[must_use]
    pub fn session(&self) -> Option<&SessionRecord> {
        self.session.as_ref()
    }

    /// A replicated player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&NetworkPlayerData> {
        self.session
            .as_ref()
            .and_then(|s| s.players.iter().find(|p| p.id == id))
    }

    /// A replicated container.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<&ContainerRecord> {
        self.containers.get(&id)
    }

    /// All replicated containers in ID order.
    pub fn containers(&self) -> impl Iterator<Item = &ContainerRecord> {
        self.containers.values()
    }

    fn is_stale(&self, tick: u64) -> bool {
        self.tick.is_some_and(|current| tick <= current)
    }

    /// Replaces all state with `snapshot` if it is newer.
    pub fn apply_snapshot(&mut self, snapshot: WorldSnapshot) -> ApplyOutcome {
        if self.is_stale(snapshot.tick) {
            debug!("Ignoring stale snapshot for tick {}", snapshot.tick);
            return ApplyOutcome::Stale;
        }
        self.tick = Some(snapshot.tick);
        self.clock = Some(snapshot.clock);
        self.session = Some(snapshot.session);
        self.containers = snapshot
            .containers
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        ApplyOutcome::Applied
    }

    /// Replaces the records named in `delta` if it follows this replica's tick.
    pub fn apply_delta(&mut self, delta: SnapshotDelta) -> ApplyOutcome {
        if self.is_stale(delta.tick) {
            debug!("Ignoring stale delta for tick {}", delta.tick);
            return ApplyOutcome::Stale;
        }
        if self.tick != Some(delta.base_tick) {
            warn!(
                "Delta base tick {} does not match replica tick {:?}",
                delta.base_tick, self.tick
            );
            return ApplyOutcome::NeedsSnapshot;
        }
        self.tick = Some(delta.tick);
        self.clock = Some(delta.clock);
        if let Some(session) = delta.session {
            self.session = Some(session);
        }
        for id in delta.removed {
            self.containers.remove(&id);
        }
        for record in delta.containers {
            self.containers.insert(record.id, record);
        }
        ApplyOutcome::Applied
    }
}

/// Shared handle to a replica.
#[derive(Debug, Clone, Default)]
pub struct ReplicaHandle {
    inner: Arc<RwLock<Replica>>,
}

impl ReplicaHandle {
    /// Creates a handle to an empty replica.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a full snapshot.
    pub fn apply_snapshot(&self, snapshot: WorldSnapshot) -> ApplyOutcome {
        self.inner.write().apply_snapshot(snapshot)
    }

    /// Applies a delta.
    pub fn apply_delta(&self, delta: SnapshotDelta) -> ApplyOutcome {
        self.inner.write().apply_delta(delta)
    }

    /// Read access to the replica.
    pub fn read(&self) -> RwLockReadGuard<'_, Replica> {
        self.inner.read()
    }
}
