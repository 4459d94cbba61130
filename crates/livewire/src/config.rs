//! Bus and connection configuration.

use std::time::Duration;

use livewire_broker::BrokerConfig;
use livewire_presence::PresenceConfig;
use livewire_tick::{TickConfig, TickPolicy};
use serde::{Deserialize, Serialize};

/// Configuration for a [`Bus`](crate::Bus) and the connections it hands
/// out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Settings for the bus's broker.
    pub broker: BrokerConfig,

    /// How long [`Connection::exchange`](crate::Connection::exchange)
    /// waits for a response.
    pub exchange_timeout: Duration,

    /// Encode live handles as foreign references instead of failing.
    pub foreign_refs: bool,

    /// Presence gossip settings.
    pub gossip: GossipConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            exchange_timeout: Duration::from_secs(60),
            foreign_refs: true,
            gossip: GossipConfig::default(),
        }
    }
}

impl BusConfig {
    /// Clamp any out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        self.broker = self.broker.validated();
        self.gossip = self.gossip.validated();
        self
    }
}

/// Configuration for the per-connection gossip loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// Delay before the first tick.
    pub initial_delay: Duration,

    /// Time between ticks. Zero disables periodic broadcast and expiry;
    /// presence messages are still observed.
    pub tick_interval: Duration,

    /// Random delay (up to this much) added to each tick.
    pub jitter: Duration,

    /// Broadcast and expiry thresholds.
    pub presence: PresenceConfig,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            tick_interval: Duration::from_secs(5),
            jitter: Duration::ZERO,
            presence: PresenceConfig::default(),
        }
    }
}

impl GossipConfig {
    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// `presence.expire_thresh` is raised to at least twice
    /// `presence.broadcast_thresh`.
    pub fn validated(mut self) -> Self {
        self.presence = self.presence.validated();
        self
    }

    pub(crate) fn tick_config(&self) -> TickConfig {
        TickConfig {
            initial_delay: self.initial_delay,
            period: self.tick_interval,
            jitter: self.jitter,
            policy: TickPolicy::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_config_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.exchange_timeout, Duration::from_secs(60));
        assert!(config.foreign_refs);
        assert_eq!(config.gossip.initial_delay, Duration::from_secs(5));
        assert_eq!(config.gossip.tick_interval, Duration::from_secs(5));
        assert_eq!(config.gossip.presence.broadcast_thresh, Duration::from_secs(60));
        assert_eq!(config.gossip.presence.expire_thresh, Duration::from_secs(300));
    }

    #[test]
    fn test_gossip_validated_clamps_expiry() {
        let config = GossipConfig {
            presence: PresenceConfig {
                broadcast_thresh: Duration::from_secs(10),
                expire_thresh: Duration::from_secs(5),
            },
            ..GossipConfig::default()
        }
        .validated();
        assert_eq!(config.presence.expire_thresh, Duration::from_secs(20));
    }

    #[test]
    fn test_bus_config_partial_json_keeps_defaults() {
        let json = r#"{ "exchange_timeout": { "secs": 2, "nanos": 0 } }"#;
        let config: BusConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.exchange_timeout, Duration::from_secs(2));
        assert_eq!(config.gossip, GossipConfig::default());
    }

    #[test]
    fn test_tick_config_mirrors_gossip_settings() {
        let tick = GossipConfig::default().tick_config();
        assert_eq!(tick.initial_delay, Duration::from_secs(5));
        assert_eq!(tick.period, Duration::from_secs(5));
        assert_eq!(tick.policy, TickPolicy::Skip);
    }
}
