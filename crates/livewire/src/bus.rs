//! [`Bus`] builder and lifecycle.
//!
//! This is the entry point for running Livewire. A bus owns one
//! in-process broker and ties together all the layers:
//! broker → protocol → presence → connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use livewire_broker::{
    Broker, BrokerClient, BrokerConfig, BrokerError, StreamId, Transport, UnixTransport,
};
use livewire_protocol::{Codec, CodecConfig};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;

use crate::config::{BusConfig, GossipConfig};
use crate::{Connection, LivewireError};

/// Builder for configuring and starting a [`Bus`].
///
/// # Example
///
/// ```rust,ignore
/// let bus = Bus::builder()
///     .exchange_timeout(Duration::from_secs(5))
///     .start()
///     .await?;
/// let conn = bus.connect().await?;
/// ```
pub struct BusBuilder {
    config: BusConfig,
}

impl BusBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: BusConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn broker_config(mut self, config: BrokerConfig) -> Self {
        self.config.broker = config;
        self
    }

    pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.config.exchange_timeout = timeout;
        self
    }

    pub fn gossip(mut self, config: GossipConfig) -> Self {
        self.config.gossip = config;
        self
    }

    /// Whether live handles may cross the bus as foreign references.
    pub fn foreign_refs(mut self, enabled: bool) -> Self {
        self.config.foreign_refs = enabled;
        self
    }

    /// Starts the broker and returns the running bus.
    pub async fn start(self) -> Result<Bus, LivewireError> {
        Bus::start(self.config).await
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running bus.
///
/// Hand out connections with [`connect()`](Self::connect); expose the bus
/// to other processes with [`serve_unix()`](Self::serve_unix). Every bus is
/// independent: several can run in one process.
///
/// All connections from one bus share one codec, so a foreign reference
/// sent by one of them resolves in any other.
pub struct Bus {
    broker: Arc<Broker>,
    codec: Codec,
    config: BusConfig,
    cancel: CancellationToken,
}

impl Bus {
    /// Creates a new builder.
    pub fn builder() -> BusBuilder {
        BusBuilder::new()
    }

    /// Starts a bus with its own in-process broker.
    ///
    /// # Errors
    /// [`LivewireError::BusStartFailed`] if the broker doesn't come up.
    pub async fn start(config: BusConfig) -> Result<Self, LivewireError> {
        let config = config.validated();
        let broker = Broker::start(config.broker.clone())
            .await
            .map_err(LivewireError::BusStartFailed)?;
        let codec = Codec::with_config(CodecConfig {
            foreign_refs: config.foreign_refs,
            ..CodecConfig::default()
        });

        tracing::info!("livewire bus running");
        Ok(Self {
            broker: Arc::new(broker),
            codec,
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Opens a connection to this bus.
    pub async fn connect(&self) -> Result<Connection, LivewireError> {
        Connection::open(self.broker.client(), self.codec.clone(), &self.config).await
    }

    /// A raw broker client, for plain publish/subscribe next to the
    /// request/response layer.
    pub fn client(&self) -> BrokerClient {
        self.broker.client()
    }

    /// Accepts Unix socket connections at `path` and bridges each one to
    /// the broker. Returns once the socket is bound; the accept loop runs
    /// until [`shutdown`](Self::shutdown).
    pub fn serve_unix(&self, path: impl AsRef<Path>) -> Result<PathBuf, LivewireError> {
        let transport = UnixTransport::bind(path)?;
        let path = transport.path().to_path_buf();
        tokio::spawn(accept_loop(
            transport,
            Arc::clone(&self.broker),
            self.cancel.child_token(),
        ));
        Ok(path)
    }

    /// Stops every accept loop and bridge, then the broker. Connections
    /// fail with [`BrokerError::Shutdown`] afterwards, and every live
    /// handle sent as a foreign reference is released.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.broker.shutdown().await;
        self.codec.foreign_table().clear();
        tracing::info!("livewire bus stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Accepts streams until cancelled, spawning one bridge task per stream.
async fn accept_loop(mut transport: UnixTransport, broker: Arc<Broker>, cancel: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = transport.accept() => accepted,
        };
        match accepted {
            Ok((id, stream)) => {
                let bridge = broker.open_stream();
                tokio::spawn(bridge_stream(id, stream, bridge, cancel.clone()));
            }
            Err(BrokerError::Io(e)) => {
                tracing::error!(error = %e, "accept failed");
            }
            Err(e) => {
                tracing::error!(error = %e, "transport failed, stopping accept loop");
                break;
            }
        }
    }

    if let Err(e) = transport.shutdown().await {
        tracing::warn!(error = %e, "transport shutdown failed");
    }
}

/// Copies bytes both ways between an accepted stream and a broker stream
/// until either side closes or the bus shuts down.
async fn bridge_stream(
    id: StreamId,
    mut stream: UnixStream,
    mut bridge: DuplexStream,
    cancel: CancellationToken,
) {
    tracing::debug!(%id, "bridging stream");
    tokio::select! {
        _ = cancel.cancelled() => {
            let _ = stream.shutdown().await;
        }
        result = tokio::io::copy_bidirectional(&mut stream, &mut bridge) => match result {
            Ok((up, down)) => tracing::debug!(%id, up, down, "stream closed"),
            Err(e) => tracing::debug!(%id, error = %e, "stream failed"),
        },
    }
}
