//! Starts a bus, serves an `echo` endpoint, advertises it, and calls it.
//!
//! Run with `RUST_LOG=debug` to watch the gossip loop and broker traffic.
//! Pass a socket path to also expose the bus to other processes:
//!
//! ```text
//! livewire-echo /tmp/livewire.sock
//! ```

use std::time::Duration;

use livewire::prelude::*;
use livewire::telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let bus = Bus::builder()
        .exchange_timeout(Duration::from_secs(5))
        .start()
        .await?;

    if let Some(path) = std::env::args().nth(1) {
        let path = bus.serve_unix(path)?;
        info!(path = %path.display(), "serving bus on unix socket");
    }

    // Service side.
    let service = bus.connect().await?;
    let cancel = CancellationToken::new();
    let listener = service.listen("echo").await?;
    let server = tokio::spawn(listener.serve(
        |req: Request| async move {
            info!(method = %req.method, args = req.arguments.len(), "echo called");
            match req.method.as_str() {
                "call" => Ok(Value::vector(req.arguments)),
                "count" => Ok(Value::Int(req.arguments.len() as i64)),
                other => Err(LivewireError::Protocol(livewire::ProtocolError::Remote(
                    format!("echo has no method {other}"),
                ))),
            }
        },
        cancel.clone(),
    ));
    // Connected before the advertisement goes out, so it hears it.
    let caller = bus.connect().await?;

    let ad = service
        .advertise(
            Capability::new("echo", "call")
                .with_tag("version", "1")
                .with_tag("lang", "rust"),
        )
        .await?;
    info!(id = %ad.id(), "advertised echo");

    // Caller side.
    tokio::task::yield_now().await;

    let shared = Value::list([Value::keyword("a"), Value::Int(1)]);
    let reply = caller
        .exchange(&Request::new(
            "echo",
            "call",
            [shared.clone(), shared, Value::symbol("user/greeting")],
        ))
        .await?;
    info!(?reply, "echo replied");
    if let Some(items) = reply.as_seq() {
        info!(shared = items[0].same_identity(&items[1]), "sharing preserved");
    }

    let count = caller
        .exchange(&Request::new("echo", "count", std::iter::repeat_n(Value::Nil, 3)))
        .await?;
    info!(?count, "count replied");

    match caller.exchange(&Request::new("echo", "nope", [])).await {
        Ok(value) => info!(?value, "unexpected success"),
        Err(e) => info!(error = %e, "remote failure surfaced"),
    }

    match caller.exchange(&Request::new("nobody", "call", [])).await {
        Ok(value) => info!(?value, "unexpected success"),
        Err(e) => info!(error = %e, retryable = e.is_retryable(), "no responders"),
    }

    let listing = serde_json::to_string_pretty(&caller.browse_capabilities())?;
    println!("{listing}");

    cancel.cancel();
    server.await??;
    service.close();
    caller.close();
    bus.shutdown().await;
    Ok(())
}
