//! Integration tests for the Redis notifier against an in-process fake
//! server speaking RESP2.
//!
//! Run with: cargo test --package keycard-network --test redis_notifier

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use keycard_core::Identifier;
use keycard_network::resp::{RespCodec, RespValue};
use keycard_network::{NotifyError, Notifier, RedisClientConfig, RedisNotifier};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

/// How the fake server answers one pipeline.
#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Reply `:1` to everything.
    Ok,
    /// Reply with an error to the `PUBLISH`.
    RejectPublish,
    /// Read the commands and never answer.
    Silent,
    /// Answer, then close the connection.
    ReplyAndHangUp,
}

/// Serve one connection per entry in `script`, handling one five-command
/// pipeline on each. Received commands are forwarded to the returned channel.
async fn fake_redis(script: Vec<Behavior>) -> (String, mpsc::UnboundedReceiver<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for behavior in script {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, RespCodec::new());

            let mut commands = Vec::new();
            for _ in 0..5 {
                let Some(Ok(value)) = framed.next().await else {
                    break;
                };
                let command = value.as_command().unwrap();
                tx.send(command.clone()).unwrap();
                commands.push(command);
            }

            match behavior {
                Behavior::Silent => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
                Behavior::Ok | Behavior::ReplyAndHangUp => {
                    for _ in &commands {
                        framed.send(RespValue::Integer(1)).await.unwrap();
                    }
                }
                Behavior::RejectPublish => {
                    for command in &commands {
                        let reply = if command[0] == "PUBLISH" {
                            RespValue::Error("ERR publish disabled".to_string())
                        } else {
                            RespValue::Integer(1)
                        };
                        framed.send(reply).await.unwrap();
                    }
                }
            }

            if matches!(behavior, Behavior::Ok | Behavior::RejectPublish) {
                // Keep the connection open for a follow-up pipeline.
                for _ in 0..5 {
                    let Some(Ok(value)) = framed.next().await else {
                        break;
                    };
                    tx.send(value.as_command().unwrap()).unwrap();
                    framed.send(RespValue::Integer(1)).await.unwrap();
                }
            }
        }
    });

    (addr, rx)
}

fn notifier(addr: &str) -> RedisNotifier {
    RedisNotifier::new(RedisClientConfig {
        addr: addr.to_string(),
        timeout: Duration::from_millis(300),
    })
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_publish_sends_hash_publish_and_expiry() {
    let (addr, mut rx) = fake_redis(vec![Behavior::Ok]).await;
    let mut notifier = notifier(&addr);
    let id = Identifier::parse("11223344").unwrap();

    notifier.publish_auth(&id).await.unwrap();
    assert!(notifier.is_connected());

    let mut received = Vec::new();
    for _ in 0..5 {
        received.push(rx.recv().await.unwrap());
    }
    assert_eq!(
        received,
        vec![
            strings(&["HSET", "keycard", "authentication", "passed"]),
            strings(&["HSET", "keycard", "type", "scooter"]),
            strings(&["HSET", "keycard", "uid", "11223344"]),
            strings(&["PUBLISH", "keycard", "authentication"]),
            strings(&["EXPIRE", "keycard", "10"]),
        ]
    );
}

#[tokio::test]
async fn test_connection_is_reused() {
    let (addr, mut rx) = fake_redis(vec![Behavior::Ok]).await;
    let mut notifier = notifier(&addr);

    notifier
        .publish_auth(&Identifier::parse("AAAA0001").unwrap())
        .await
        .unwrap();
    notifier
        .publish_auth(&Identifier::parse("AAAA0002").unwrap())
        .await
        .unwrap();

    let mut uids = Vec::new();
    for _ in 0..10 {
        let command = rx.recv().await.unwrap();
        if command[0] == "HSET" && command[2] == "uid" {
            uids.push(command[3].clone());
        }
    }
    assert_eq!(uids, vec!["AAAA0001", "AAAA0002"]);
}

#[tokio::test]
async fn test_error_reply_is_reported_and_connection_kept() {
    let (addr, _rx) = fake_redis(vec![Behavior::RejectPublish]).await;
    let mut notifier = notifier(&addr);
    let id = Identifier::parse("11223344").unwrap();

    let err = notifier.publish_auth(&id).await.unwrap_err();
    match err {
        NotifyError::Server(message) => assert_eq!(message, "ERR publish disabled"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(notifier.is_connected());

    // Same connection serves the next publication.
    notifier.publish_auth(&id).await.unwrap();
}

#[tokio::test]
async fn test_silent_server_times_out_and_drops_connection() {
    let (addr, _rx) = fake_redis(vec![Behavior::Silent]).await;
    let mut notifier = notifier(&addr);
    let id = Identifier::parse("11223344").unwrap();

    let err = notifier.publish_auth(&id).await.unwrap_err();
    assert!(matches!(err, NotifyError::ReadTimeout(300)));
    assert!(!notifier.is_connected());
}

#[tokio::test]
async fn test_reconnects_after_lost_connection() {
    let (addr, _rx) = fake_redis(vec![Behavior::ReplyAndHangUp, Behavior::Ok]).await;
    let mut notifier = notifier(&addr);
    let id = Identifier::parse("11223344").unwrap();

    notifier.publish_auth(&id).await.unwrap();

    // The server hung up; this attempt fails and drops the connection.
    assert!(notifier.publish_auth(&id).await.is_err());
    assert!(!notifier.is_connected());

    // Next publication reconnects.
    notifier.publish_auth(&id).await.unwrap();
    assert!(notifier.is_connected());

    notifier.close().await;
    assert!(!notifier.is_connected());
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let mut notifier = notifier(&addr);
    let err = notifier
        .publish_auth(&Identifier::parse("11223344").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Io(_) | NotifyError::ConnectionTimeout(_)));
    assert!(!notifier.is_connected());
}
