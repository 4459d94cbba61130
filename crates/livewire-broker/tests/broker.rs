//! Integration tests for the broker: delivery rules, request/reply, and
//! the stream protocol spoken by remote clients.

use std::time::Duration;

use livewire_broker::{Broker, BrokerClient, BrokerConfig, BrokerError, Transport, UnixTransport};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

async fn start() -> Broker {
    Broker::start(BrokerConfig::default())
        .await
        .expect("broker should start")
}

/// Answers every request on `subject` by echoing its payload back.
async fn spawn_echo(client: &BrokerClient, subject: &str) {
    let mut sub = client.subscribe(subject).await.unwrap();
    let client = client.clone();
    tokio::spawn(async move {
        while let Some(msg) = sub.next().await {
            if let Some(reply_to) = msg.reply_to {
                client.publish(&reply_to, msg.payload).await.unwrap();
            }
        }
    });
}

// =========================================================================
// Publish / subscribe
// =========================================================================

#[tokio::test]
async fn test_publish_reaches_every_plain_subscriber() {
    let broker = start().await;
    let client = broker.client();
    let mut a = client.subscribe("news").await.unwrap();
    let mut b = client.subscribe("news").await.unwrap();

    let receivers = client.publish("news", b"hello".to_vec()).await.unwrap();
    assert_eq!(receivers, 2);
    assert_eq!(a.next().await.unwrap().payload, b"hello");
    assert_eq!(b.next().await.unwrap().payload, b"hello");
}

#[tokio::test]
async fn test_publish_without_subscribers_reports_zero() {
    let broker = start().await;
    let receivers = broker.client().publish("void", vec![]).await.unwrap();
    assert_eq!(receivers, 0);
}

#[tokio::test]
async fn test_subjects_match_exactly() {
    let broker = start().await;
    let client = broker.client();
    let _sub = client.subscribe("a.b").await.unwrap();
    assert_eq!(client.publish("a", vec![]).await.unwrap(), 0);
    assert_eq!(client.publish("a.b.c", vec![]).await.unwrap(), 0);
    assert_eq!(client.publish("a.b", vec![]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_queue_group_delivers_each_message_once_round_robin() {
    let broker = start().await;
    let client = broker.client();
    let mut a = client.queue_subscribe("work", "workers").await.unwrap();
    let mut b = client.queue_subscribe("work", "workers").await.unwrap();

    for i in 0..4u8 {
        let receivers = client.publish("work", vec![i]).await.unwrap();
        assert_eq!(receivers, 1, "a queue group counts as one receiver");
    }

    let mut got_a = Vec::new();
    let mut got_b = Vec::new();
    for _ in 0..2 {
        got_a.push(a.next().await.unwrap().payload[0]);
        got_b.push(b.next().await.unwrap().payload[0]);
    }
    got_a.sort();
    got_b.sort();
    assert_eq!(got_a.len() + got_b.len(), 4);
    assert_ne!(got_a, got_b);
}

#[tokio::test]
async fn test_queue_group_and_plain_subscriber_both_receive() {
    let broker = start().await;
    let client = broker.client();
    let mut member = client.queue_subscribe("jobs", "g").await.unwrap();
    let mut watcher = client.subscribe("jobs").await.unwrap();

    assert_eq!(client.publish("jobs", vec![7]).await.unwrap(), 2);
    assert_eq!(member.next().await.unwrap().payload, vec![7]);
    assert_eq!(watcher.next().await.unwrap().payload, vec![7]);
}

#[tokio::test]
async fn test_dropping_subscription_unsubscribes() {
    let broker = start().await;
    let client = broker.client();
    let sub = client.subscribe("temp").await.unwrap();
    drop(sub);
    assert_eq!(client.publish("temp", vec![]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_dropped_queue_member_is_skipped() {
    let broker = start().await;
    let client = broker.client();
    let gone = client.queue_subscribe("work", "g").await.unwrap();
    let mut alive = client.queue_subscribe("work", "g").await.unwrap();
    drop(gone);

    for i in 0..3u8 {
        assert_eq!(client.publish("work", vec![i]).await.unwrap(), 1);
    }
    for i in 0..3u8 {
        assert_eq!(alive.next().await.unwrap().payload, vec![i]);
    }
}

// =========================================================================
// Request / reply
// =========================================================================

#[tokio::test]
async fn test_request_gets_reply() {
    let broker = start().await;
    let client = broker.client();
    spawn_echo(&client, "echo").await;

    let reply = client
        .request("echo", b"ping".to_vec(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(reply.payload, b"ping");
    assert!(reply.subject.starts_with(livewire_broker::INBOX_PREFIX));
}

#[tokio::test]
async fn test_request_without_responders_fails_fast() {
    let broker = start().await;
    let started = Instant::now();

    let err = broker
        .client()
        .request("nobody", vec![], Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::NoResponders(ref s) if s == "nobody"));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_request_times_out_when_nobody_answers() {
    let broker = start().await;
    let client = broker.client();
    let _silent = client.subscribe("silent").await.unwrap();

    let err = client
        .request("silent", vec![], Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Timeout(d) if d == Duration::from_secs(5)));
}

#[tokio::test]
async fn test_new_inbox_is_unique() {
    let broker = start().await;
    let client = broker.client();
    assert_ne!(client.new_inbox(), client.new_inbox());
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_operations_after_shutdown_fail() {
    let broker = start().await;
    let client = broker.client();
    let mut sub = client.subscribe("x").await.unwrap();

    broker.shutdown().await;
    broker.shutdown().await;
    assert!(broker.is_shut_down());

    assert!(matches!(
        client.publish("x", vec![]).await,
        Err(BrokerError::Shutdown)
    ));
    assert!(sub.next().await.is_none());
}

// =========================================================================
// Stream protocol
// =========================================================================

#[tokio::test]
async fn test_remote_client_publish_and_subscribe() {
    let broker = start().await;
    let local = broker.client();
    let remote = BrokerClient::over_stream(broker.open_stream());

    let mut remote_sub = remote.subscribe("feed").await.unwrap();
    // A remote publish waits for its ack, which the session sends only
    // after handling every earlier frame, so the Sub is registered now.
    assert_eq!(remote.publish("feed", b"one".to_vec()).await.unwrap(), 1);
    assert_eq!(remote_sub.next().await.unwrap().payload, b"one");

    assert_eq!(local.publish("feed", b"two".to_vec()).await.unwrap(), 1);
    let msg = remote_sub.next().await.unwrap();
    assert_eq!(msg.subject, "feed");
    assert_eq!(msg.payload, b"two");
}

#[tokio::test]
async fn test_remote_request_to_local_responder() {
    let broker = start().await;
    spawn_echo(&broker.client(), "echo").await;
    let remote = BrokerClient::over_stream(broker.open_stream());

    let reply = remote
        .request("echo", b"over the wire".to_vec(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(reply.payload, b"over the wire");
}

#[tokio::test]
async fn test_remote_request_without_responders_fails_fast() {
    let broker = start().await;
    let remote = BrokerClient::over_stream(broker.open_stream());
    let err = remote
        .request("nobody", vec![], Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::NoResponders(_)));
}

#[tokio::test]
async fn test_remote_queue_subscribe_shares_with_local_member() {
    let broker = start().await;
    let local = broker.client();
    let remote = BrokerClient::over_stream(broker.open_stream());

    let mut local_member = local.queue_subscribe("jobs", "g").await.unwrap();
    let mut remote_member = remote.queue_subscribe("jobs", "g").await.unwrap();
    remote.publish("barrier", vec![]).await.unwrap();

    local.publish("jobs", vec![1]).await.unwrap();
    local.publish("jobs", vec![2]).await.unwrap();

    let a = local_member.next().await.unwrap().payload[0];
    let b = remote_member.next().await.unwrap().payload[0];
    assert_eq!(a + b, 3);
}

#[tokio::test]
async fn test_remote_client_fails_after_broker_shutdown() {
    let broker = start().await;
    let remote = BrokerClient::over_stream(broker.open_stream());
    remote.publish("warmup", vec![]).await.unwrap();

    broker.shutdown().await;
    assert!(matches!(
        remote.publish("x", vec![]).await,
        Err(BrokerError::Shutdown)
    ));
}

#[tokio::test]
async fn test_remote_concurrent_large_publishes_all_delivered() {
    const COUNT: usize = 200;
    const SIZE: usize = 128 * 1024;

    let broker = start().await;
    let remote = BrokerClient::over_stream(broker.open_stream());
    let mut sub = remote.subscribe("bulk").await.unwrap();

    // Acks and echoed messages flow back while publishes are still
    // queued, so both directions of the stream are full at once.
    let mut publishes = tokio::task::JoinSet::new();
    for i in 0..COUNT {
        let remote = remote.clone();
        publishes.spawn(async move { remote.publish("bulk", vec![i as u8; SIZE]).await });
    }

    let acked = tokio::time::timeout(Duration::from_secs(30), async {
        let mut acked = 0;
        while let Some(result) = publishes.join_next().await {
            assert_eq!(result.unwrap().unwrap(), 1);
            acked += 1;
        }
        acked
    })
    .await
    .expect("publishes should not stall");
    assert_eq!(acked, COUNT);

    for _ in 0..COUNT {
        let msg = tokio::time::timeout(Duration::from_secs(30), sub.next())
            .await
            .expect("message should arrive")
            .unwrap();
        assert_eq!(msg.payload.len(), SIZE);
    }
}

// =========================================================================
// Unix transport
// =========================================================================

#[tokio::test]
async fn test_unix_transport_accepts_and_assigns_ids() {
    let path = std::env::temp_dir().join(format!("livewire-broker-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let mut transport = UnixTransport::bind(&path).unwrap();

    let accept = tokio::spawn(async move {
        let (id, _stream) = transport.accept().await.unwrap();
        transport.shutdown().await.unwrap();
        id
    });
    let _client = tokio::net::UnixStream::connect(&path).await.unwrap();

    let id = accept.await.unwrap();
    assert!(id.into_inner() > 0);
    assert!(!path.exists(), "shutdown removes the socket file");
}
