//! The per-connection gossip loop.
//!
//! Each [`Connection`](crate::Connection) runs one gossip task. It owns the
//! connection's presence subscription and tick scheduler:
//!
//! ```text
//! presence message ──→ decode Capability ──→ directory.observe()
//! tick             ──→ directory.due_for_broadcast() ──→ publish each
//!                  └─→ directory.expire_seen()
//! ```
//!
//! Presence messages are handled in the order they arrive. A message that
//! doesn't decode is logged and dropped; it never stops the loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livewire_broker::{BrokerClient, Subscription};
use livewire_presence::CapabilityDirectory;
use livewire_protocol::Capability;
use livewire_tick::TickScheduler;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::GossipConfig;

/// The well-known subject capabilities are broadcast on. The payload is
/// one encoded [`Capability`].
pub const PRESENCE_SUBJECT: &str = "_LIVEWIRE.presence";

pub(crate) type SharedDirectory = Arc<Mutex<CapabilityDirectory>>;

/// Locks the directory. A panic while holding the lock can't leave the
/// tables half-updated, so a poisoned lock is still usable.
pub(crate) fn lock(directory: &SharedDirectory) -> MutexGuard<'_, CapabilityDirectory> {
    directory.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct GossipTask {
    pub(crate) presence: Subscription,
    pub(crate) client: BrokerClient,
    pub(crate) directory: SharedDirectory,
    pub(crate) config: GossipConfig,
    pub(crate) cancel: CancellationToken,
}

impl GossipTask {
    pub(crate) async fn run(mut self) {
        let mut scheduler = TickScheduler::new(self.config.tick_config());
        debug!("gossip loop started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                message = self.presence.next() => {
                    let Some(message) = message else {
                        debug!("presence subscription closed");
                        break;
                    };
                    self.observe(&message.payload);
                }
                info = scheduler.wait_for_tick() => {
                    let broadcast = self.tick().await;
                    trace!(tick = info.tick, broadcast, "gossip tick");
                    scheduler.record_tick_end();
                }
            }
        }

        debug!("gossip loop stopped");
    }

    fn observe(&self, payload: &[u8]) {
        let capability = match Capability::decode(payload) {
            Ok(capability) => capability,
            Err(e) => {
                warn!(error = %e, "dropping malformed presence message");
                return;
            }
        };
        if let Err(e) = lock(&self.directory).observe(capability, Instant::now()) {
            warn!(error = %e, "failed to record capability");
        }
    }

    /// Re-broadcasts due local entries and expires stale seen ones.
    /// Returns how many capabilities were broadcast.
    async fn tick(&self) -> usize {
        let now = Instant::now();
        let thresholds = &self.config.presence;
        let due = {
            let mut directory = lock(&self.directory);
            directory.expire_seen(now, thresholds.expire_thresh);
            directory.due_for_broadcast(now, thresholds.broadcast_thresh)
        };

        let mut sent = 0;
        for capability in due {
            match broadcast(&self.client, &capability).await {
                Ok(()) => sent += 1,
                Err(e) => warn!(%capability, error = %e, "presence broadcast failed"),
            }
        }
        sent
    }
}

/// Publishes one capability on the presence subject.
pub(crate) async fn broadcast(
    client: &BrokerClient,
    capability: &Capability,
) -> Result<(), crate::LivewireError> {
    client.publish(PRESENCE_SUBJECT, capability.encode()?).await?;
    Ok(())
}
