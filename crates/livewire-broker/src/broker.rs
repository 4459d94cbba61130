//! The broker actor: an isolated Tokio task that owns every subscription.
//!
//! Clients talk to it through a bounded mpsc channel of [`Command`]s. A
//! command that needs an answer carries a `oneshot::Sender` as its reply
//! channel. All routing state lives inside the actor, so there are no
//! locks: publishes and subscription changes are applied in the order the
//! actor receives them.

use std::collections::HashMap;

use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{BrokerClient, BrokerConfig, BrokerError, Message, SubscriptionId, session};

/// Channel that delivers messages to one subscription.
pub(crate) type MessageSender = mpsc::UnboundedSender<Message>;

/// Commands accepted by the broker actor (and by the remote proxy, which
/// speaks the same language).
pub(crate) enum Command {
    /// Register a subscription. Plain when `group` is `None`.
    Subscribe {
        subject: String,
        group: Option<String>,
        sender: MessageSender,
        reply: oneshot::Sender<SubscriptionId>,
    },

    /// Remove a subscription. Unknown ids are ignored.
    Unsubscribe { id: SubscriptionId },

    /// Deliver a message. The reply carries the number of subscriptions
    /// that received it.
    Publish {
        message: Message,
        reply: oneshot::Sender<usize>,
    },

    /// Stop the actor.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Broker handle
// ---------------------------------------------------------------------------

/// A running in-process broker.
///
/// Obtain clients with [`client()`](Self::client), or byte streams that
/// speak the broker protocol with [`open_stream()`](Self::open_stream).
/// Every broker is independent: several can run in one process.
pub struct Broker {
    commands: mpsc::Sender<Command>,
    config: BrokerConfig,
    cancel: CancellationToken,
}

impl Broker {
    /// Spawns the broker task and waits for it to report ready.
    ///
    /// # Errors
    /// [`BrokerError::StartFailed`] if the task isn't ready within
    /// `config.start_timeout`.
    pub async fn start(config: BrokerConfig) -> Result<Self, BrokerError> {
        let config = config.validated();
        let (tx, rx) = mpsc::channel(config.command_buffer);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(BrokerActor::new(rx).run(ready_tx));

        match tokio::time::timeout(config.start_timeout, ready_rx).await {
            Ok(Ok(())) => {
                info!("broker started");
                Ok(Self {
                    commands: tx,
                    config,
                    cancel: CancellationToken::new(),
                })
            }
            _ => Err(BrokerError::StartFailed(config.start_timeout)),
        }
    }

    /// Returns an in-process client. Clients are cheap to clone.
    pub fn client(&self) -> BrokerClient {
        BrokerClient::new(self.commands.clone())
    }

    /// Opens an in-memory byte stream served by a fresh protocol session.
    ///
    /// The returned end speaks the framed broker protocol; hand it to
    /// [`BrokerClient::over_stream`] or bridge it to a socket.
    pub fn open_stream(&self) -> DuplexStream {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        tokio::spawn(session::serve_stream(
            ours,
            self.client(),
            self.config.max_frame_len,
            self.cancel.child_token(),
        ));
        theirs
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Stops the broker and every session it serves. Later operations on
    /// its clients fail with [`BrokerError::Shutdown`]. Idempotent.
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let _ = self.commands.send(Command::Shutdown).await;
        info!("broker shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Member {
    id: SubscriptionId,
    sender: MessageSender,
}

/// Members of one queue group. Each message goes to exactly one of them,
/// in turn.
#[derive(Default)]
struct QueueGroup {
    members: Vec<Member>,
    cursor: usize,
}

impl QueueGroup {
    /// Delivers to the next live member. Members whose receiver is gone
    /// are reported in `dead` and skipped.
    fn deliver(&mut self, message: &Message, dead: &mut Vec<SubscriptionId>) -> bool {
        let len = self.members.len();
        for _ in 0..len {
            let i = self.cursor % len;
            self.cursor = (i + 1) % len;
            let member = &self.members[i];
            if member.sender.send(message.clone()).is_ok() {
                return true;
            }
            dead.push(member.id);
        }
        false
    }
}

#[derive(Default)]
struct SubjectSubscribers {
    plain: Vec<Member>,
    groups: HashMap<String, QueueGroup>,
}

impl SubjectSubscribers {
    fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.groups.is_empty()
    }
}

/// Where a subscription is registered, so it can be found on removal.
struct Route {
    subject: String,
    group: Option<String>,
}

struct BrokerActor {
    receiver: mpsc::Receiver<Command>,
    subjects: HashMap<String, SubjectSubscribers>,
    routes: HashMap<SubscriptionId, Route>,
    next_id: u64,
}

impl BrokerActor {
    fn new(receiver: mpsc::Receiver<Command>) -> Self {
        Self {
            receiver,
            subjects: HashMap::new(),
            routes: HashMap::new(),
            next_id: 1,
        }
    }

    async fn run(mut self, ready: oneshot::Sender<()>) {
        if ready.send(()).is_err() {
            // Nobody is waiting for us: `start` timed out.
            warn!("broker start was abandoned");
            return;
        }
        debug!("broker actor running");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                Command::Subscribe {
                    subject,
                    group,
                    sender,
                    reply,
                } => {
                    let id = self.handle_subscribe(subject, group, sender);
                    if reply.send(id).is_err() {
                        self.remove(id);
                    }
                }
                Command::Unsubscribe { id } => self.remove(id),
                Command::Publish { message, reply } => {
                    let receivers = self.handle_publish(message);
                    let _ = reply.send(receivers);
                }
                Command::Shutdown => break,
            }
        }

        debug!(subscriptions = self.routes.len(), "broker actor stopped");
    }

    fn handle_subscribe(
        &mut self,
        subject: String,
        group: Option<String>,
        sender: MessageSender,
    ) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id);
        self.next_id += 1;

        let subscribers = self.subjects.entry(subject.clone()).or_default();
        let member = Member { id, sender };
        match &group {
            Some(group) => subscribers
                .groups
                .entry(group.clone())
                .or_default()
                .members
                .push(member),
            None => subscribers.plain.push(member),
        }
        debug!(%id, %subject, ?group, "subscribed");

        self.routes.insert(id, Route { subject, group });
        id
    }

    fn handle_publish(&mut self, message: Message) -> usize {
        let Some(subscribers) = self.subjects.get_mut(&message.subject) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for member in &subscribers.plain {
            if member.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(member.id);
            }
        }
        for group in subscribers.groups.values_mut() {
            if group.deliver(&message, &mut dead) {
                delivered += 1;
            }
        }

        for id in dead {
            self.remove(id);
        }
        delivered
    }

    fn remove(&mut self, id: SubscriptionId) {
        let Some(route) = self.routes.remove(&id) else {
            return;
        };
        let Some(subscribers) = self.subjects.get_mut(&route.subject) else {
            return;
        };

        match &route.group {
            Some(name) => {
                if let Some(group) = subscribers.groups.get_mut(name) {
                    group.members.retain(|m| m.id != id);
                    if group.members.is_empty() {
                        subscribers.groups.remove(name);
                    }
                }
            }
            None => subscribers.plain.retain(|m| m.id != id),
        }

        if subscribers.is_empty() {
            self.subjects.remove(&route.subject);
        }
        debug!(%id, subject = %route.subject, "unsubscribed");
    }
}
