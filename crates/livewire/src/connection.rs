//! A participant on the bus.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use livewire_broker::BrokerClient;
use livewire_presence::CapabilityDirectory;
use livewire_protocol::{Capability, CapabilityId, Codec, CodecConfig, Request, Response};
use livewire_value::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::BusConfig;
use crate::gossip::{self, GossipTask, PRESENCE_SUBJECT, SharedDirectory};
use crate::{Listener, LivewireError};

/// A handle onto the bus: make calls, serve endpoints, advertise and
/// discover capabilities.
///
/// Cheap to clone; clones share the connection's codec, capability
/// directory and gossip task. The gossip task stops on [`close`] or when
/// the last clone is dropped.
///
/// [`close`]: Self::close
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    client: BrokerClient,
    codec: Codec,
    directory: SharedDirectory,
    exchange_timeout: Duration,
    cancel: CancellationToken,
    /// Set when the codec belongs to this connection alone rather than to
    /// a bus.
    owns_codec: bool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.owns_codec {
            self.codec.foreign_table().clear();
        }
    }
}

impl Connection {
    /// Connects over an existing broker client and starts the gossip task.
    ///
    /// The presence subscription is in place before this returns, so the
    /// connection sees its own first broadcast.
    pub(crate) async fn open(
        client: BrokerClient,
        codec: Codec,
        config: &BusConfig,
    ) -> Result<Self, LivewireError> {
        Self::open_inner(client, codec, config, false).await
    }

    async fn open_inner(
        client: BrokerClient,
        codec: Codec,
        config: &BusConfig,
        owns_codec: bool,
    ) -> Result<Self, LivewireError> {
        let directory: SharedDirectory = Arc::new(Mutex::new(CapabilityDirectory::new()));
        let cancel = CancellationToken::new();

        let presence = client.subscribe(PRESENCE_SUBJECT).await?;
        tokio::spawn(
            GossipTask {
                presence,
                client: client.clone(),
                directory: Arc::clone(&directory),
                config: config.gossip.clone(),
                cancel: cancel.clone(),
            }
            .run(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                codec,
                directory,
                exchange_timeout: config.exchange_timeout,
                cancel,
                owns_codec,
            }),
        })
    }

    /// Connects to a bus served on a Unix socket by
    /// [`Bus::serve_unix`](crate::Bus::serve_unix), typically from another
    /// process. The connection gets its own codec, whose foreign table is
    /// cleared once the last clone of the connection is dropped.
    pub async fn connect_unix(path: impl AsRef<Path>, config: BusConfig) -> Result<Self, LivewireError> {
        let config = config.validated();
        let client = BrokerClient::connect_unix(path).await?;
        let codec = Codec::with_config(CodecConfig {
            foreign_refs: config.foreign_refs,
            ..CodecConfig::default()
        });
        Self::open_inner(client, codec, &config, true).await
    }

    /// The codec requests and responses go through. Live handles sent by
    /// this connection are parked in its foreign table; release one with
    /// [`ForeignTable::release_handle`](livewire_protocol::ForeignTable::release_handle)
    /// once peers no longer need it.
    pub fn codec(&self) -> &Codec {
        &self.inner.codec
    }

    // -- Calls ------------------------------------------------------------

    /// Sends `request` and waits for the response, for at most the
    /// configured exchange timeout.
    ///
    /// A fire-and-forget request returns `Value::Nil` as soon as it is
    /// published.
    ///
    /// # Errors
    /// - [`LivewireError::NoResponders`] right away if no listener is on
    ///   the endpoint.
    /// - [`LivewireError::Timeout`] if no response arrives in time.
    /// - [`LivewireError::Protocol`] with
    ///   [`ProtocolError::Remote`](livewire_protocol::ProtocolError::Remote)
    ///   if the handler failed.
    pub async fn exchange(&self, request: &Request) -> Result<Value, LivewireError> {
        self.exchange_with_timeout(request, self.inner.exchange_timeout).await
    }

    /// [`exchange`](Self::exchange) with an explicit response window.
    pub async fn exchange_with_timeout(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Value, LivewireError> {
        let inner = &self.inner;
        let payload = request.marshal(&inner.codec)?;

        if request.no_response {
            inner.client.publish(&request.endpoint, payload).await?;
            return Ok(Value::Nil);
        }

        let reply = inner.client.request(&request.endpoint, payload, timeout).await?;
        let response = Response::unmarshal(&inner.codec, &reply.payload)?;
        if response.request_id != request.request_id {
            debug!(
                expected = %request.request_id,
                got = %response.request_id,
                "response carries a different request id"
            );
        }
        Ok(response.into_result()?)
    }

    /// Joins the queue group for `endpoint`.
    pub async fn listen(&self, endpoint: &str) -> Result<Listener, LivewireError> {
        let inner = &self.inner;
        let subscription = inner.client.queue_subscribe(endpoint, endpoint).await?;
        debug!(%endpoint, "listening");
        Ok(Listener::new(
            endpoint.to_owned(),
            subscription,
            inner.client.clone(),
            inner.codec.clone(),
        ))
    }

    // -- Capabilities -----------------------------------------------------

    /// Advertises `capability` and broadcasts it right away. The gossip
    /// loop re-broadcasts it until [`Advertisement::clear`] is called.
    pub async fn advertise(&self, capability: Capability) -> Result<Advertisement, LivewireError> {
        let inner = &self.inner;
        let id = gossip::lock(&inner.directory).advertise(capability.clone(), Instant::now())?;
        gossip::broadcast(&inner.client, &capability).await?;
        Ok(Advertisement {
            id,
            directory: Arc::clone(&inner.directory),
        })
    }

    /// Every capability this connection has heard of and not yet expired,
    /// sorted by id. Includes its own advertisements once they've been
    /// broadcast.
    pub fn browse_capabilities(&self) -> Vec<Capability> {
        gossip::lock(&self.inner.directory).snapshot_seen()
    }

    /// Stops the gossip task. Calls and listeners keep working; the
    /// directory stops changing.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

/// A local capability advertisement.
///
/// Dropping it does not withdraw the capability; call
/// [`clear`](Self::clear).
#[derive(Debug)]
pub struct Advertisement {
    id: CapabilityId,
    directory: SharedDirectory,
}

impl Advertisement {
    pub fn id(&self) -> &CapabilityId {
        &self.id
    }

    /// Stops re-broadcasting the capability. Peers drop it once it
    /// expires from their directories. Returns `false` if it was already
    /// cleared.
    pub fn clear(&self) -> bool {
        gossip::lock(&self.directory).clear(&self.id)
    }
}
