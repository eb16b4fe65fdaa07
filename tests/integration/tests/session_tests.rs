//! Session Integration Tests
//!
//! Full sessions against a scripted gateway on the in-memory transport.
//!
//! Run with: cargo test -p integration-tests --test session_tests

use std::time::Duration;

use gateway_client::{GatewayClient, MemoryConnector, SessionError};
use gateway_common::GatewayConfig;
use gateway_protocol::{
    GatewayCommand, GatewayUrl, IdentifyPayload, Intents, PresenceUpdatePayload, Status,
};
use integration_tests::{
    dispatch, expect_close, expect_hangup, expect_heartbeat, expect_op, fast_reconnect, fixtures,
    heartbeat_ack, heartbeat_request, hello, invalid_session, ready, reconnect, TestGateway,
    RESUME_URL, TEST_TOKEN,
};
use serde_json::json;
use tokio::time::Instant;

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_identify_after_hello() {
    let mut gateway = TestGateway::start().unwrap();
    let mut server = gateway.accept().await.unwrap();
    assert_eq!(server.url(), "memory://gateway/?v=10&encoding=json");

    server.send_json(&hello(45_000));
    let identify = expect_op(&mut server, 2).await.unwrap();

    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    assert_eq!(
        identify["d"]["intents"],
        (Intents::GUILDS | Intents::GUILD_MESSAGES).bits()
    );
    assert_eq!(identify["d"]["properties"]["os"], "linux");
    assert!(identify.get("s").is_none());
    assert!(identify.get("t").is_none());

    gateway.handle.shutdown();
    assert_eq!(expect_close(&mut server).await.unwrap(), 1000);
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_dispatches_are_delivered_in_order() {
    let mut gateway = TestGateway::start().unwrap();
    let (server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_json(&ready(1, "session-1"));
    server.send_json(&dispatch(2, "GUILD_CREATE", json!({"id": "1"})));
    server.send_json(&dispatch(3, "MESSAGE_CREATE", json!({"content": "hi"})));

    let names: Vec<String> = [
        gateway.next_event().await.unwrap(),
        gateway.next_event().await.unwrap(),
        gateway.next_event().await.unwrap(),
    ]
    .into_iter()
    .map(|event| event.name)
    .collect();
    assert_eq!(names, ["READY", "GUILD_CREATE", "MESSAGE_CREATE"]);

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_invalid_intents_rejected_before_connecting() {
    let (connector, mut accepted) = MemoryConnector::new();
    let mut identify = IdentifyPayload::new(TEST_TOKEN, Intents::GUILDS);
    identify.intents = Intents::from_bits_retain(1 << 15);

    let result = GatewayClient::new(connector, GatewayUrl::new("memory://gateway"), identify);
    assert!(matches!(result, Err(SessionError::InvalidIntents(_))));
    assert!(accepted.try_recv().is_err());
}

#[tokio::test]
async fn test_config_drives_identify() {
    let vars = [
        ("GATEWAY_TOKEN", "from-env"),
        ("GATEWAY_URL", "memory://configured"),
        ("GATEWAY_INTENTS", "4609"),
        ("GATEWAY_SHARD_ID", "0"),
        ("GATEWAY_SHARD_COUNT", "2"),
    ];
    let config = GatewayConfig::from_lookup(|key| {
        vars.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| (*value).to_string())
    })
    .unwrap();

    let (connector, mut accepted) = MemoryConnector::new();
    let (client, _events) =
        GatewayClient::new(connector, config.gateway_url(), config.identify()).unwrap();
    let handle = client.handle();
    let task = tokio::spawn(client.run());

    let mut server = accepted.recv().await.unwrap();
    assert_eq!(server.url(), "memory://configured/?v=10&encoding=json");
    server.send_json(&hello(45_000));

    let identify = expect_op(&mut server, 2).await.unwrap();
    assert_eq!(identify["d"]["token"], "from-env");
    assert_eq!(identify["d"]["intents"], 4609);
    assert_eq!(identify["d"]["shard"], json!([0, 2]));

    handle.shutdown();
    assert!(task.await.unwrap().is_ok());
}

// ============================================================================
// Close Code Tests
// ============================================================================

#[tokio::test]
async fn test_session_timeout_close_resumes_with_last_sequence() {
    let mut gateway = TestGateway::start().unwrap();
    let (mut server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_json(&ready(1, "abc"));
    assert_eq!(gateway.next_event().await.unwrap().name, "READY");

    server.close(Some(4009));
    expect_hangup(&mut server).await.unwrap();

    let mut resumed = gateway.accept().await.unwrap();
    assert_eq!(resumed.url(), format!("{RESUME_URL}/?v=10&encoding=json"));
    resumed.send_json(&hello(45_000));

    let resume = expect_op(&mut resumed, 6).await.unwrap();
    assert_eq!(
        resume["d"],
        json!({"token": TEST_TOKEN, "session_id": "abc", "seq": 1})
    );

    resumed.send_json(&dispatch(2, "RESUMED", json!({})));
    assert_eq!(gateway.next_event().await.unwrap().name, "RESUMED");

    gateway.handle.shutdown();
    assert_eq!(expect_close(&mut resumed).await.unwrap(), 1000);
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_authentication_failed_aborts() {
    let mut gateway = TestGateway::start().unwrap();
    let (server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.close(Some(4004));

    match gateway.finish().await.unwrap() {
        Err(SessionError::NonReconnectableClose {
            code,
            description,
            explanation,
        }) => {
            assert_eq!(code, 4004);
            assert_eq!(description, "Authentication failed");
            assert!(explanation.contains("token"));
        }
        other => panic!("expected NonReconnectableClose, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disallowed_intents_aborts() {
    let mut gateway = TestGateway::start().unwrap();
    let (server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.close(Some(4014));

    let result = gateway.finish().await.unwrap();
    assert!(matches!(
        result,
        Err(SessionError::NonReconnectableClose { code: 4014, .. })
    ));
}

#[tokio::test]
async fn test_unrecognized_close_code_reconnects() {
    let mut gateway = TestGateway::start().unwrap();
    let (server, _) = gateway.accept_and_handshake(2).await.unwrap();

    // No READY yet, so there is nothing to resume
    server.close(Some(4321));

    let (mut second, _) = gateway.accept_and_handshake(2).await.unwrap();
    assert_eq!(second.url(), "memory://gateway/?v=10&encoding=json");

    gateway.handle.shutdown();
    assert_eq!(expect_close(&mut second).await.unwrap(), 1000);
    assert!(gateway.finish().await.unwrap().is_ok());
}

// ============================================================================
// Server Request Tests
// ============================================================================

#[tokio::test]
async fn test_reconnect_request_resumes() {
    let mut gateway = TestGateway::start().unwrap();
    let (mut server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_json(&ready(1, "abc"));
    server.send_json(&dispatch(2, "MESSAGE_CREATE", json!({})));
    gateway.next_event().await.unwrap();
    gateway.next_event().await.unwrap();

    server.send_json(&reconnect());
    assert_eq!(expect_close(&mut server).await.unwrap(), 4000);

    let (_resumed, resume) = gateway.accept_and_handshake(6).await.unwrap();
    assert_eq!(resume["d"]["seq"], 2);
    assert_eq!(resume["d"]["session_id"], "abc");

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_invalid_session_reidentifies() {
    let mut gateway = TestGateway::start().unwrap();
    let (mut server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_json(&ready(1, "abc"));
    gateway.next_event().await.unwrap();

    server.send_json(&invalid_session(false));
    assert_eq!(expect_close(&mut server).await.unwrap(), 1000);

    let (second, _identify) = gateway.accept_and_handshake(2).await.unwrap();
    assert_eq!(second.url(), "memory://gateway/?v=10&encoding=json");

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_heartbeat_request_answered_immediately() {
    let mut gateway = TestGateway::start().unwrap();
    let (mut server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_json(&ready(5, "abc"));
    gateway.next_event().await.unwrap();

    server.send_json(&heartbeat_request());
    let heartbeat = expect_heartbeat(&mut server, 5).await.unwrap();
    assert_eq!(heartbeat["op"], 1);

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_bad_frames_do_not_close_connection() {
    let mut gateway = TestGateway::start().unwrap();
    let (server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_raw(b"{definitely not json".to_vec());
    server.send_json(&json!({"op": 5, "d": null}));
    server.send_json(&json!({"op": 0, "d": {}}));
    server.send_json(&ready(1, "abc"));

    assert_eq!(gateway.next_event().await.unwrap().name, "READY");

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_unread_dispatches_do_not_stall_session() {
    let mut gateway = TestGateway::start().unwrap();
    let (mut server, _) = gateway.accept_and_handshake(2).await.unwrap();

    // Far more than the event channel holds, none of them read yet
    server.send_json(&ready(1, "abc"));
    for seq in 2..=400 {
        server.send_json(&dispatch(seq, "MESSAGE_CREATE", json!({"n": seq})));
    }

    // Still answered while the backlog waits on the application
    server.send_json(&heartbeat_request());
    expect_heartbeat(&mut server, 400).await.unwrap();

    assert_eq!(gateway.next_event().await.unwrap().name, "READY");
    assert_eq!(gateway.next_event().await.unwrap().sequence, 2);

    gateway.handle.shutdown();
    assert_eq!(expect_close(&mut server).await.unwrap(), 1000);
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_application_command_forwarded() {
    let mut gateway = TestGateway::start().unwrap();
    let (mut server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_json(&ready(1, "abc"));
    gateway.next_event().await.unwrap();

    let presence = GatewayCommand::PresenceUpdate(PresenceUpdatePayload::new(Status::DoNotDisturb));
    assert!(gateway.handle.send(presence).await);

    let update = expect_op(&mut server, 3).await.unwrap();
    assert_eq!(update["d"]["status"], "dnd");

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

// ============================================================================
// Heartbeat Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_heartbeats_carry_last_sequence() {
    let mut gateway = TestGateway::start().unwrap();
    let mut server = gateway.accept().await.unwrap();
    server.send_json(&hello(1_000));
    expect_op(&mut server, 2).await.unwrap();

    let first = expect_op(&mut server, 1).await.unwrap();
    assert!(first["d"].is_null());
    server.send_json(&heartbeat_ack());

    server.send_json(&ready(3, "abc"));
    gateway.next_event().await.unwrap();

    let second = expect_op(&mut server, 1).await.unwrap();
    assert_eq!(second["d"], 3);

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_zombie_connection_reconnects() {
    let mut gateway = TestGateway::start().unwrap();
    let mut server = gateway.accept().await.unwrap();
    server.send_json(&hello(1_000));
    expect_op(&mut server, 2).await.unwrap();

    server.send_json(&ready(1, "abc"));
    gateway.next_event().await.unwrap();

    // Never ack: the first beat goes out, the next tick finds it unacknowledged
    expect_op(&mut server, 1).await.unwrap();
    assert_eq!(expect_close(&mut server).await.unwrap(), 4000);

    let mut resumed = gateway.accept().await.unwrap();
    resumed.send_json(&hello(1_000));
    let resume = expect_op(&mut resumed, 6).await.unwrap();
    assert_eq!(resume["d"]["seq"], 1);

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

// ============================================================================
// Transport Tests
// ============================================================================

#[tokio::test]
async fn test_connect_retries_with_backoff() {
    let mut gateway =
        TestGateway::start_with(fixtures::identify(), fast_reconnect(), 3).unwrap();

    let (_server, _) = gateway.accept_and_handshake(2).await.unwrap();

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_connect_gives_up_after_max_attempts() {
    let mut reconnect = fast_reconnect();
    reconnect.max_attempts = Some(2);
    let gateway = TestGateway::start_with(fixtures::identify(), reconnect, 10).unwrap();

    let result = gateway.finish().await.unwrap();
    assert!(matches!(result, Err(SessionError::Transport(_))));
}

#[tokio::test]
async fn test_transport_hangup_resumes() {
    let mut gateway = TestGateway::start().unwrap();
    let (server, _) = gateway.accept_and_handshake(2).await.unwrap();

    server.send_json(&ready(4, "abc"));
    gateway.next_event().await.unwrap();

    // Dropping the server end ends the stream without a close code
    drop(server);

    let (_resumed, resume) = gateway.accept_and_handshake(6).await.unwrap();
    assert_eq!(resume["d"]["seq"], 4);

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_early_closes_back_off_then_give_up() {
    let mut gateway = TestGateway::start().unwrap();
    let mut servers = Vec::new();
    let mut accepted_at = Vec::new();

    // One initial connection plus one per allowed retry
    for _ in 0..6 {
        let server = gateway.accept().await.unwrap();
        accepted_at.push(Instant::now());
        server.send_json(&hello(45_000));
        server.close(Some(4008));
        servers.push(server);
    }

    let expected = [10, 20, 40, 80, 100];
    for (pair, min_ms) in accepted_at.windows(2).zip(expected) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_millis(min_ms),
            "reconnected after {gap:?}, expected at least {min_ms}ms"
        );
    }

    let result = gateway.finish().await.unwrap();
    assert!(matches!(
        result,
        Err(SessionError::ReconnectExhausted { attempts: 5 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_resets_once_session_is_up() {
    let mut gateway = TestGateway::start().unwrap();

    let first = gateway.accept().await.unwrap();
    first.send_json(&hello(45_000));
    first.close(Some(4008));

    let mut second = gateway.accept().await.unwrap();
    second.send_json(&hello(45_000));
    expect_op(&mut second, 2).await.unwrap();
    second.send_json(&ready(1, "abc"));
    gateway.next_event().await.unwrap();

    // A session that reached READY reconnects without waiting
    let closed_at = Instant::now();
    second.close(Some(4000));
    let third = gateway.accept().await.unwrap();
    assert!(closed_at.elapsed() < Duration::from_millis(10));

    // The backoff starts over from the initial delay
    let closed_at = Instant::now();
    third.send_json(&hello(45_000));
    third.close(Some(4008));
    let _fourth = gateway.accept().await.unwrap();
    let gap = closed_at.elapsed();
    assert!(gap >= Duration::from_millis(10) && gap < Duration::from_millis(20));

    gateway.handle.shutdown();
    assert!(gateway.finish().await.unwrap().is_ok());
}
