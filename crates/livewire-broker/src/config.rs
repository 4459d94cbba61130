//! Broker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for a [`Broker`](crate::Broker) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// How long [`Broker::start`](crate::Broker::start) waits for the
    /// broker task to report ready.
    pub start_timeout: Duration,

    /// Capacity of the command channel in front of the broker task.
    pub command_buffer: usize,

    /// Largest frame accepted on a broker stream, in bytes.
    pub max_frame_len: usize,
}

impl BrokerConfig {
    /// Smallest frame limit that still fits an empty publish.
    pub const MIN_FRAME_LEN: usize = 1024;

    /// Returns a copy with out-of-range fields clamped.
    pub fn validated(mut self) -> Self {
        if self.command_buffer == 0 {
            warn!("command_buffer must be at least 1, clamping");
            self.command_buffer = 1;
        }
        if self.max_frame_len < Self::MIN_FRAME_LEN {
            warn!(
                max_frame_len = self.max_frame_len,
                min = Self::MIN_FRAME_LEN,
                "max_frame_len below minimum, clamping"
            );
            self.max_frame_len = Self::MIN_FRAME_LEN;
        }
        self
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(5),
            command_buffer: 1024,
            max_frame_len: 64 << 20,
        }
    }
}
