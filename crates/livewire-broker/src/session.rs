//! Broker side of the stream protocol: one session per stream.
//!
//! The session owns a [`BrokerClient`] and replays the peer's frames on
//! it. Each `Sub` gets a forwarder task that turns delivered messages into
//! `Msg` frames. Acks and messages all go through one [`FrameWriter`], so
//! the session loop never waits on the peer reading.

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::frame::{Frame, FrameReader, FrameWriter};
use crate::{BrokerClient, BrokerError, Message};

pub(crate) async fn serve_stream<S>(
    stream: S,
    client: BrokerClient,
    max_frame_len: usize,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut incoming = FrameReader::spawn(read_half, max_frame_len);
    let outbound = FrameWriter::spawn(write_half);
    let mut forwarders: HashMap<u64, JoinHandle<()>> = HashMap::new();

    debug!("broker session started");

    let result: Result<(), BrokerError> = async {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = incoming.recv() => {
                    let frame = match received {
                        Some(frame) => frame?,
                        None => return Ok(()),
                    };
                    match frame {
                        Frame::Sub { sid, subject, group } => {
                            let sub = match group {
                                Some(group) => client.queue_subscribe(&subject, &group).await?,
                                None => client.subscribe(&subject).await?,
                            };
                            let handle = spawn_forwarder(sid, sub, outbound.sender());
                            if let Some(old) = forwarders.insert(sid, handle) {
                                old.abort();
                            }
                        }
                        Frame::Unsub { sid } => {
                            if let Some(handle) = forwarders.remove(&sid) {
                                handle.abort();
                            }
                        }
                        Frame::Pub { seq, subject, reply_to, payload } => {
                            let receivers = client
                                .publish_message(Message { subject, reply_to, payload })
                                .await?;
                            outbound.send(Frame::PubAck { seq, receivers: receivers as u64 })?;
                        }
                        other => {
                            return Err(BrokerError::Frame(format!(
                                "unexpected frame from client: {other:?}"
                            )));
                        }
                    }
                }
            }
        }
    }
    .await;

    for (_, handle) in forwarders {
        handle.abort();
    }
    match result {
        Ok(()) => debug!("broker session ended"),
        Err(e) => warn!(error = %e, "broker session ended with error"),
    }
}

/// Pumps one subscription into the outbound channel. Aborting the task
/// drops the subscription, which unsubscribes it.
fn spawn_forwarder(
    sid: u64,
    mut sub: crate::Subscription,
    outbound: mpsc::UnboundedSender<Frame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = sub.next().await {
            let frame = Frame::Msg {
                sid,
                subject: message.subject,
                reply_to: message.reply_to,
                payload: message.payload,
            };
            if outbound.send(frame).is_err() {
                break;
            }
        }
    })
}
