//! The capability directory: what this connection offers, and what it has
//! heard that others offer.
//!
//! Two tables, both keyed by [`CapabilityId`]:
//!
//! - **local**: capabilities advertised by this connection. `last_time`
//!   is when each was last broadcast.
//! - **seen**: capabilities observed on the presence subject (including
//!   our own broadcasts). `last_time` is when each was last heard.
//!
//! ```text
//! advertise() ──→ [local] ──(due_for_broadcast)──→ publish ──→ observe() ──→ [seen]
//!     │                                                                        │
//!     ▼                                                                        ▼
//!  clear()                                                               expire_seen()
//! ```
//!
//! # Concurrency note
//!
//! `CapabilityDirectory` is NOT thread-safe by itself. The owning
//! connection keeps it behind a mutex and never holds that lock across an
//! `.await`: [`due_for_broadcast`](CapabilityDirectory::due_for_broadcast)
//! returns copies so publishing happens after the lock is released.
//!
//! Every method takes `now` explicitly, which keeps the directory a plain
//! data structure that tests can drive with any clock.

use std::collections::HashMap;
use std::time::Duration;

use livewire_protocol::{Capability, CapabilityId};
use tokio::time::Instant;

use crate::PresenceError;

/// A capability plus the last time it was broadcast (local) or heard
/// (seen).
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub id: CapabilityId,
    pub capability: Capability,
    pub last_time: Instant,
}

/// Local and seen capability tables.
#[derive(Debug, Default)]
pub struct CapabilityDirectory {
    local: HashMap<CapabilityId, DirectoryEntry>,
    seen: HashMap<CapabilityId, DirectoryEntry>,
}

impl CapabilityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Local table ------------------------------------------------------

    /// Registers a local capability as broadcast at `now`.
    ///
    /// Advertising the same content twice keeps one entry.
    pub fn advertise(
        &mut self,
        capability: Capability,
        now: Instant,
    ) -> Result<CapabilityId, PresenceError> {
        let id = capability.id()?;
        tracing::info!(%id, %capability, "capability advertised");
        self.local.insert(
            id.clone(),
            DirectoryEntry {
                id: id.clone(),
                capability,
                last_time: now,
            },
        );
        Ok(id)
    }

    /// Removes a local capability. Peers keep it until it ages out of
    /// their seen tables. Returns `true` if it was present.
    pub fn clear(&mut self, id: &CapabilityId) -> bool {
        let removed = self.local.remove(id).is_some();
        if removed {
            tracing::info!(%id, "capability cleared");
        }
        removed
    }

    /// Local capabilities whose last broadcast is at least `thresh` old.
    ///
    /// Each returned entry has its `last_time` bumped to `now`, so the
    /// caller must publish what it gets back.
    pub fn due_for_broadcast(&mut self, now: Instant, thresh: Duration) -> Vec<Capability> {
        self.local
            .values_mut()
            .filter(|entry| now.saturating_duration_since(entry.last_time) >= thresh)
            .map(|entry| {
                entry.last_time = now;
                entry.capability.clone()
            })
            .collect()
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    pub fn get_local(&self, id: &CapabilityId) -> Option<&DirectoryEntry> {
        self.local.get(id)
    }

    // -- Seen table -------------------------------------------------------

    /// Records that `capability` was heard at `now` (last write wins).
    pub fn observe(
        &mut self,
        capability: Capability,
        now: Instant,
    ) -> Result<CapabilityId, PresenceError> {
        let id = capability.id()?;
        match self.seen.get_mut(&id) {
            Some(entry) => entry.last_time = now,
            None => {
                tracing::debug!(%id, %capability, "new capability seen");
                self.seen.insert(
                    id.clone(),
                    DirectoryEntry {
                        id: id.clone(),
                        capability,
                        last_time: now,
                    },
                );
            }
        }
        Ok(id)
    }

    /// Drops seen capabilities not heard from for more than `thresh`.
    /// Returns the ids that were dropped.
    pub fn expire_seen(&mut self, now: Instant, thresh: Duration) -> Vec<CapabilityId> {
        let expired: Vec<CapabilityId> = self
            .seen
            .values()
            .filter(|entry| now.saturating_duration_since(entry.last_time) > thresh)
            .map(|entry| entry.id.clone())
            .collect();

        for id in &expired {
            self.seen.remove(id);
            tracing::info!(%id, "capability expired");
        }
        expired
    }

    /// Every seen capability, sorted by id.
    pub fn snapshot_seen(&self) -> Vec<Capability> {
        let mut entries: Vec<&DirectoryEntry> = self.seen.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.into_iter().map(|e| e.capability.clone()).collect()
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn get_seen(&self, id: &CapabilityId) -> Option<&DirectoryEntry> {
        self.seen.get(id)
    }
}
