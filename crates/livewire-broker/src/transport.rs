//! Unix domain socket transport for broker streams.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{UnixListener, UnixStream};

use crate::{BrokerError, StreamId, Transport};

/// Counter for generating unique stream IDs.
static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// A [`Transport`] that listens on a Unix domain socket.
#[derive(Debug)]
pub struct UnixTransport {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixTransport {
    /// Binds a new listener at `path`.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, BrokerError> {
        let path = path.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path)?;
        tracing::info!(path = %path.display(), "unix transport listening");
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for UnixTransport {
    type Stream = UnixStream;

    async fn accept(&mut self) -> Result<(StreamId, Self::Stream), BrokerError> {
        let (stream, _) = self.listener.accept().await?;
        let id = StreamId::new(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, path = %self.path.display(), "accepted unix stream");
        Ok((id, stream))
    }

    async fn shutdown(&self) -> Result<(), BrokerError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
