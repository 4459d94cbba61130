//! Receiving side of an endpoint: [`Listener`] and [`Rpc`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use livewire_broker::{BrokerClient, BrokerError, Subscription};
use livewire_protocol::{Codec, Request, Response};
use livewire_value::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::LivewireError;

/// A queue-group subscription on one endpoint.
///
/// Every listener on the same endpoint, in any connection, shares the
/// endpoint's requests: each request is delivered to exactly one of them.
/// Dropping the listener leaves the group.
pub struct Listener {
    endpoint: String,
    subscription: Subscription,
    client: BrokerClient,
    codec: Codec,
}

impl Listener {
    pub(crate) fn new(
        endpoint: String,
        subscription: Subscription,
        client: BrokerClient,
        codec: Codec,
    ) -> Self {
        Self {
            endpoint,
            subscription,
            client,
            codec,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Waits for the next request.
    ///
    /// Returns `Ok(None)` once `cancel` is cancelled. Cancellation is
    /// checked first and never consumes a pending request, which stays
    /// queued for the next call.
    ///
    /// A request that doesn't decode is answered with an error response
    /// and skipped.
    ///
    /// # Errors
    /// [`LivewireError::Broker`] if the bus shut down.
    pub async fn accept(&mut self, cancel: &CancellationToken) -> Result<Option<Rpc>, LivewireError> {
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                message = self.subscription.next() => message,
            };
            let Some(message) = message else {
                return Err(BrokerError::Shutdown.into());
            };

            match Request::unmarshal(&self.codec, &message.payload) {
                Ok(request) => {
                    debug!(
                        endpoint = %self.endpoint,
                        method = %request.method,
                        request_id = %request.request_id,
                        "request accepted"
                    );
                    return Ok(Some(Rpc {
                        request,
                        reply_to: message.reply_to,
                        client: self.client.clone(),
                        codec: self.codec.clone(),
                    }));
                }
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "rejecting malformed request");
                    if let Some(reply_to) = message.reply_to {
                        let payload = Response::marshal_error("", &e.to_string())?;
                        if let Err(e) = self.client.publish(&reply_to, payload).await {
                            debug!(error = %e, "could not answer malformed request");
                        }
                    }
                }
            }
        }
    }

    /// Serves requests with `handler` until `cancel` is cancelled.
    ///
    /// Requests are handled one at a time. A handler `Err` is sent back as
    /// an error response. So is a panic: it is caught here, logged, and
    /// the loop moves on to the next request.
    pub async fn serve<F, Fut>(mut self, handler: F, cancel: CancellationToken) -> Result<(), LivewireError>
    where
        F: Fn(Request) -> Fut,
        Fut: Future<Output = Result<Value, LivewireError>>,
    {
        while let Some(rpc) = self.accept(&cancel).await? {
            let request = rpc.request().clone();
            // The call itself can panic before any future exists.
            let outcome = AssertUnwindSafe(async { handler(request).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    warn!(
                        endpoint = %self.endpoint,
                        method = %rpc.request().method,
                        panic = %message,
                        "handler panicked"
                    );
                    Err(LivewireError::HandlerPanicked(message))
                });

            let sent = match outcome {
                Ok(value) => match rpc.respond(&value).await {
                    Err(LivewireError::Protocol(e)) => rpc.respond_error(&e.to_string()).await,
                    other => other,
                },
                Err(e) => rpc.respond_error(&e.to_string()).await,
            };
            if let Err(e) = sent {
                debug!(endpoint = %self.endpoint, error = %e, "response not delivered");
            }
        }
        debug!(endpoint = %self.endpoint, "listener stopped");
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// One received request, plus the means to answer it.
pub struct Rpc {
    request: Request,
    reply_to: Option<String>,
    client: BrokerClient,
    codec: Codec,
}

impl Rpc {
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Sends `value` back to the caller. Does nothing for a
    /// fire-and-forget request.
    pub async fn respond(&self, value: &Value) -> Result<(), LivewireError> {
        let Some(reply_to) = self.reply_target() else {
            return Ok(());
        };
        let payload = self.request.marshal_response(&self.codec, value)?;
        self.client.publish(reply_to, payload).await?;
        Ok(())
    }

    /// Sends a failure back to the caller, which sees it as
    /// [`ProtocolError::Remote`](livewire_protocol::ProtocolError::Remote).
    /// Does nothing for a fire-and-forget request.
    pub async fn respond_error(&self, message: &str) -> Result<(), LivewireError> {
        let Some(reply_to) = self.reply_target() else {
            return Ok(());
        };
        let payload = self.request.marshal_error_response(message)?;
        self.client.publish(reply_to, payload).await?;
        Ok(())
    }

    fn reply_target(&self) -> Option<&str> {
        if self.request.no_response {
            return None;
        }
        self.reply_to.as_deref()
    }
}
