use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Thresholds for presence bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// A local capability is re-broadcast once its last broadcast is at
    /// least this old.
    pub broadcast_thresh: Duration,

    /// A seen capability is dropped once it hasn't been heard from for
    /// longer than this.
    ///
    /// Must be at least twice `broadcast_thresh`, so one lost broadcast
    /// doesn't make a live capability disappear.
    pub expire_thresh: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            broadcast_thresh: Duration::from_secs(60),
            expire_thresh: Duration::from_secs(300),
        }
    }
}

impl PresenceConfig {
    /// Returns a copy with `expire_thresh` raised to twice
    /// `broadcast_thresh` if it was lower.
    pub fn validated(mut self) -> Self {
        let min_expire = self.broadcast_thresh * 2;
        if self.expire_thresh < min_expire {
            warn!(
                expire_secs = self.expire_thresh.as_secs_f64(),
                min_secs = min_expire.as_secs_f64(),
                "expire_thresh below twice broadcast_thresh, clamping"
            );
            self.expire_thresh = min_expire;
        }
        self
    }
}
