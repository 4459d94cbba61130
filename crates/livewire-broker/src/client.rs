//! Client handles: publish, subscribe and request/reply.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use crate::broker::Command;
use crate::{BrokerConfig, BrokerError, remote};

/// Prefix of every reply subject minted by [`BrokerClient::new_inbox`].
pub const INBOX_PREFIX: &str = "_INBOX.";

/// A message as delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    /// Where the receiver should send its answer, if anywhere.
    pub reply_to: Option<String>,
    pub payload: Vec<u8>,
}

/// Identifies one subscription within its broker (or remote link).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BrokerClient
// ---------------------------------------------------------------------------

/// Handle to a broker, either in-process or across a stream.
///
/// Both flavors send the same commands: an in-process client feeds the
/// broker actor directly, a remote client feeds a proxy task that turns
/// each command into a frame. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    commands: mpsc::Sender<Command>,
}

impl BrokerClient {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    /// Connects to a broker served on a Unix domain socket.
    pub async fn connect_unix(path: impl AsRef<Path>) -> Result<Self, BrokerError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await?;
        debug!(path = %path.display(), "connected to broker socket");
        Ok(Self::over_stream(stream))
    }

    /// Speaks the broker protocol over any byte stream, such as one
    /// returned by [`Broker::open_stream`](crate::Broker::open_stream).
    pub fn over_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let config = BrokerConfig::default();
        remote::spawn_proxy(stream, config.command_buffer, config.max_frame_len)
    }

    /// Publishes `payload` on `subject`. Returns how many subscriptions
    /// received it.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<usize, BrokerError> {
        self.publish_message(Message {
            subject: subject.to_owned(),
            reply_to: None,
            payload,
        })
        .await
    }

    /// Publishes with a reply subject.
    pub async fn publish_with_reply(
        &self,
        subject: &str,
        reply_to: &str,
        payload: Vec<u8>,
    ) -> Result<usize, BrokerError> {
        self.publish_message(Message {
            subject: subject.to_owned(),
            reply_to: Some(reply_to.to_owned()),
            payload,
        })
        .await
    }

    pub(crate) async fn publish_message(&self, message: Message) -> Result<usize, BrokerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Publish {
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        reply_rx.await.map_err(|_| BrokerError::Shutdown)
    }

    /// Subscribes to every message on `subject`.
    pub async fn subscribe(&self, subject: &str) -> Result<Subscription, BrokerError> {
        self.subscribe_inner(subject, None).await
    }

    /// Joins the queue group `group` on `subject`. Each message goes to
    /// exactly one member of the group.
    pub async fn queue_subscribe(
        &self,
        subject: &str,
        group: &str,
    ) -> Result<Subscription, BrokerError> {
        self.subscribe_inner(subject, Some(group.to_owned())).await
    }

    async fn subscribe_inner(
        &self,
        subject: &str,
        group: Option<String>,
    ) -> Result<Subscription, BrokerError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                subject: subject.to_owned(),
                group,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BrokerError::Shutdown)?;
        let id = reply_rx.await.map_err(|_| BrokerError::Shutdown)?;

        Ok(Subscription {
            id,
            subject: subject.to_owned(),
            receiver,
            commands: self.commands.clone(),
        })
    }

    /// Publishes a request and waits for the first reply.
    ///
    /// A fresh inbox is subscribed for the reply before the request goes
    /// out, so a fast responder can't be missed.
    ///
    /// # Errors
    /// - [`BrokerError::NoResponders`] right away if nobody is subscribed
    ///   to `subject`.
    /// - [`BrokerError::Timeout`] if no reply arrives within `timeout`.
    pub async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Message, BrokerError> {
        let inbox = self.new_inbox();
        let mut replies = self.subscribe(&inbox).await?;

        let receivers = self.publish_with_reply(subject, &inbox, payload).await?;
        if receivers == 0 {
            return Err(BrokerError::NoResponders(subject.to_owned()));
        }

        match tokio::time::timeout(timeout, replies.next()).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(BrokerError::Shutdown),
            Err(_) => Err(BrokerError::Timeout(timeout)),
        }
    }

    /// A unique reply subject.
    pub fn new_inbox(&self) -> String {
        format!("{INBOX_PREFIX}{}", Uuid::now_v7().simple())
    }

    /// `true` once the broker (or the remote link) is gone.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    subject: String,
    receiver: mpsc::UnboundedReceiver<Message>,
    commands: mpsc::Sender<Command>,
}

impl Subscription {
    /// Waits for the next message. `None` once the broker is gone.
    ///
    /// Cancel-safe: dropping the future never loses a message.
    pub async fn next(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Best effort. If the channel is full the broker prunes this
        // subscription on its next failed delivery instead.
        let _ = self.commands.try_send(Command::Unsubscribe { id: self.id });
    }
}
