//! Client side of the broker stream protocol.
//!
//! A remote [`BrokerClient`] sends the same [`Command`]s as an in-process
//! one. The proxy task here receives them and translates each into a
//! frame, and routes incoming `Msg`/`PubAck` frames back to the waiting
//! subscription or publisher. Outgoing frames are queued on a
//! [`FrameWriter`], so the proxy keeps routing incoming frames while the
//! stream is backed up.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::broker::{Command, MessageSender};
use crate::frame::{Frame, FrameReader, FrameWriter};
use crate::{BrokerClient, BrokerError, Message, SubscriptionId};

pub(crate) fn spawn_proxy<S>(stream: S, command_buffer: usize, max_frame_len: usize) -> BrokerClient
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (tx, rx) = mpsc::channel(command_buffer);
    let (read_half, write_half) = tokio::io::split(stream);

    let proxy = RemoteProxy {
        commands: rx,
        incoming: FrameReader::spawn(read_half, max_frame_len),
        outgoing: FrameWriter::spawn(write_half),
        subscriptions: HashMap::new(),
        pending: HashMap::new(),
        next_sid: 1,
        next_seq: 1,
    };
    tokio::spawn(proxy.run());

    BrokerClient::new(tx)
}

struct RemoteProxy {
    commands: mpsc::Receiver<Command>,
    incoming: FrameReader,
    outgoing: FrameWriter,
    /// sid → local subscription channel.
    subscriptions: HashMap<u64, MessageSender>,
    /// seq → publisher waiting for its `PubAck`.
    pending: HashMap<u64, oneshot::Sender<usize>>,
    next_sid: u64,
    next_seq: u64,
}

impl RemoteProxy {
    async fn run(mut self) {
        debug!("remote broker link up");
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    match self.handle_command(cmd) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => {
                            warn!(error = %e, "remote broker writer gone");
                            break;
                        }
                    }
                }
                received = self.incoming.recv() => match received {
                    Some(Ok(frame)) => self.handle_frame(frame),
                    Some(Err(e)) => {
                        warn!(error = %e, "remote broker read failed");
                        break;
                    }
                    None => {
                        debug!("remote broker closed the stream");
                        break;
                    }
                },
            }
        }
        // Dropping `self` closes every subscription channel and fails every
        // pending publish with `Shutdown`.
    }

    /// Returns `Ok(false)` when the proxy should stop.
    fn handle_command(&mut self, cmd: Command) -> Result<bool, BrokerError> {
        match cmd {
            Command::Subscribe {
                subject,
                group,
                sender,
                reply,
            } => {
                let sid = self.next_sid;
                self.next_sid += 1;
                self.subscriptions.insert(sid, sender);
                self.outgoing.send(Frame::Sub { sid, subject, group })?;
                if reply.send(SubscriptionId::new(sid)).is_err() {
                    self.subscriptions.remove(&sid);
                    self.outgoing.send(Frame::Unsub { sid })?;
                }
            }
            Command::Unsubscribe { id } => {
                let sid = id.into_inner();
                if self.subscriptions.remove(&sid).is_some() {
                    self.outgoing.send(Frame::Unsub { sid })?;
                }
            }
            Command::Publish { message, reply } => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.pending.insert(seq, reply);
                let frame = Frame::Pub {
                    seq,
                    subject: message.subject,
                    reply_to: message.reply_to,
                    payload: message.payload,
                };
                self.outgoing.send(frame)?;
            }
            Command::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Msg {
                sid,
                subject,
                reply_to,
                payload,
            } => {
                let Some(sender) = self.subscriptions.get(&sid) else {
                    // Raced with an unsubscribe.
                    return;
                };
                let message = Message {
                    subject,
                    reply_to,
                    payload,
                };
                if sender.send(message).is_err() {
                    self.subscriptions.remove(&sid);
                }
            }
            Frame::PubAck { seq, receivers } => {
                if let Some(reply) = self.pending.remove(&seq) {
                    let _ = reply.send(usize::try_from(receivers).unwrap_or(usize::MAX));
                }
            }
            other => warn!(frame = ?other, "unexpected frame from broker"),
        }
    }
}
