//! Frames of the broker stream protocol.
//!
//! A broker stream carries length-prefixed frames in both directions:
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (BE)  | CBOR array, `len` bytes   |
//! +----------------+---------------------------+
//! ```
//!
//! The first array element is the opcode:
//!
//! ```text
//! Sub    = [0, sid, subject, group | null]           client → broker
//! Unsub  = [1, sid]                                  client → broker
//! Pub    = [2, seq, subject, reply_to | null, data]  client → broker
//! PubAck = [3, seq, receivers]                       broker → client
//! Msg    = [4, sid, subject, reply_to | null, data]  broker → client
//! ```
//!
//! Every `Pub` is answered by a `PubAck` carrying the number of
//! subscriptions that received it, which is what lets a remote client fail
//! a request fast when nobody is listening.

use minicbor::data::Type;
use minicbor::{Decoder, Encoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::BrokerError;

const OP_SUB: u8 = 0;
const OP_UNSUB: u8 = 1;
const OP_PUB: u8 = 2;
const OP_PUB_ACK: u8 = 3;
const OP_MSG: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    Sub {
        sid: u64,
        subject: String,
        group: Option<String>,
    },
    Unsub {
        sid: u64,
    },
    Pub {
        seq: u64,
        subject: String,
        reply_to: Option<String>,
        payload: Vec<u8>,
    },
    PubAck {
        seq: u64,
        receivers: u64,
    },
    Msg {
        sid: u64,
        subject: String,
        reply_to: Option<String>,
        payload: Vec<u8>,
    },
}

impl Frame {
    pub(crate) fn encode(&self) -> Result<Vec<u8>, BrokerError> {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        match self {
            Self::Sub {
                sid,
                subject,
                group,
            } => {
                enc.array(4)?.u8(OP_SUB)?.u64(*sid)?.str(subject)?;
                match group {
                    Some(group) => enc.str(group)?,
                    None => enc.null()?,
                };
            }
            Self::Unsub { sid } => {
                enc.array(2)?.u8(OP_UNSUB)?.u64(*sid)?;
            }
            Self::Pub {
                seq,
                subject,
                reply_to,
                payload,
            } => {
                enc.array(5)?.u8(OP_PUB)?.u64(*seq)?.str(subject)?;
                match reply_to {
                    Some(reply_to) => enc.str(reply_to)?,
                    None => enc.null()?,
                };
                enc.bytes(payload)?;
            }
            Self::PubAck { seq, receivers } => {
                enc.array(3)?.u8(OP_PUB_ACK)?.u64(*seq)?.u64(*receivers)?;
            }
            Self::Msg {
                sid,
                subject,
                reply_to,
                payload,
            } => {
                enc.array(5)?.u8(OP_MSG)?.u64(*sid)?.str(subject)?;
                match reply_to {
                    Some(reply_to) => enc.str(reply_to)?,
                    None => enc.null()?,
                };
                enc.bytes(payload)?;
            }
        }
        Ok(buf)
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, BrokerError> {
        let mut dec = Decoder::new(bytes);
        let len = dec.array()?;
        let op = dec.u8()?;

        let expected = match op {
            OP_SUB => 4,
            OP_UNSUB => 2,
            OP_PUB | OP_MSG => 5,
            OP_PUB_ACK => 3,
            other => return Err(BrokerError::Frame(format!("unknown opcode {other}"))),
        };
        if len != Some(expected) {
            return Err(BrokerError::Frame(format!(
                "opcode {op} expects {expected} fields, got {len:?}"
            )));
        }

        let frame = match op {
            OP_SUB => Self::Sub {
                sid: dec.u64()?,
                subject: dec.str()?.to_owned(),
                group: optional_str(&mut dec)?,
            },
            OP_UNSUB => Self::Unsub { sid: dec.u64()? },
            OP_PUB => Self::Pub {
                seq: dec.u64()?,
                subject: dec.str()?.to_owned(),
                reply_to: optional_str(&mut dec)?,
                payload: dec.bytes()?.to_vec(),
            },
            OP_PUB_ACK => Self::PubAck {
                seq: dec.u64()?,
                receivers: dec.u64()?,
            },
            _ => Self::Msg {
                sid: dec.u64()?,
                subject: dec.str()?.to_owned(),
                reply_to: optional_str(&mut dec)?,
                payload: dec.bytes()?.to_vec(),
            },
        };

        if dec.position() != bytes.len() {
            return Err(BrokerError::Frame("trailing bytes in frame".into()));
        }
        Ok(frame)
    }
}

fn optional_str(dec: &mut Decoder<'_>) -> Result<Option<String>, BrokerError> {
    if dec.datatype()? == Type::Null {
        dec.null()?;
        return Ok(None);
    }
    Ok(Some(dec.str()?.to_owned()))
}

// ---------------------------------------------------------------------------
// Stream I/O
// ---------------------------------------------------------------------------

/// Reads one frame. `Ok(None)` means the peer closed the stream cleanly
/// between frames.
pub(crate) async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Frame>, BrokerError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(BrokerError::Frame(format!(
            "frame of {len} bytes exceeds limit {max_len}"
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Frame::decode(&body).map(Some)
}

pub(crate) async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), BrokerError>
where
    W: AsyncWrite + Unpin,
{
    let body = frame.encode()?;
    let len = u32::try_from(body.len())
        .map_err(|_| BrokerError::Frame(format!("frame of {} bytes is too large", body.len())))?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Frames read by a dedicated task.
///
/// `read_frame` is not cancel-safe, so it can't sit in a `select!` next to
/// other branches. The reader task owns the read half and hands complete
/// frames over a channel, whose `recv` is cancel-safe. The channel closes
/// after the first error or at end of stream. Dropping the reader aborts
/// the task, which releases the read half.
pub(crate) struct FrameReader {
    frames: mpsc::Receiver<Result<Frame, BrokerError>>,
    task: JoinHandle<()>,
}

impl FrameReader {
    pub(crate) fn spawn<R>(mut reader: R, max_len: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader, max_len).await {
                    Ok(Some(frame)) => {
                        if tx.send(Ok(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });
        Self { frames: rx, task }
    }

    /// Next frame, or `None` once the stream has ended.
    pub(crate) async fn recv(&mut self) -> Option<Result<Frame, BrokerError>> {
        self.frames.recv().await
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Frames written by a dedicated task.
///
/// Queuing a frame never waits on the peer, so a loop that reads frames
/// and answers them keeps draining its input while the peer is busy
/// writing too. The task stops at the first write error, after which
/// [`send`](Self::send) fails with [`BrokerError::Shutdown`]. Dropping the
/// writer aborts the task, which releases the write half.
pub(crate) struct FrameWriter {
    frames: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<()>,
}

impl FrameWriter {
    pub(crate) fn spawn<W>(mut writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        let task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    warn!(error = %e, "frame write failed");
                    break;
                }
            }
        });
        Self { frames: tx, task }
    }

    /// Queues `frame` behind every frame queued before it.
    pub(crate) fn send(&self, frame: Frame) -> Result<(), BrokerError> {
        self.frames.send(frame).map_err(|_| BrokerError::Shutdown)
    }

    /// A queue handle for tasks that only ever push frames.
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<Frame> {
        self.frames.clone()
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        self.task.abort();
    }
}
