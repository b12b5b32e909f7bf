//! Shard lifecycle scenarios against the in-memory gateway
//!
//! Run with: cargo test -p integration-tests --test shard_tests

use integration_tests::{
    connect_url, test_config, TestShard, GATEWAY_URL, RESUME_URL, SLOW_HEARTBEAT_MS, TEST_TOKEN,
};
use pushgate_core::{Intents, ShardInfo};
use pushgate_gateway::events::{GatewayEvent, GatewayEventType};
use pushgate_gateway::identify::IdentifyGate;
use pushgate_gateway::protocol::{Activity, GatewayMessage, OpCode, PresenceUpdatePayload};
use pushgate_gateway::shard::{Session, ShardError, ShardStatus, ShutdownIntent};
use pushgate_gateway::transport::WsFrame;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_identify_after_hello() {
    let config = test_config().with_intents(Intents::GUILDS | Intents::GUILD_MESSAGES);
    let info = ShardInfo::new(2, 4).unwrap();
    let gate = Arc::new(IdentifyGate::new(Duration::from_secs(5)));
    let mut shard = TestShard::spawn_with(info, config, gate);

    let mut socket = shard.gateway.accept().await;
    assert_eq!(socket.url, connect_url(GATEWAY_URL));

    socket.hello(SLOW_HEARTBEAT_MS);
    let identify = socket.expect_op(OpCode::Identify).await.as_identify().unwrap();

    assert_eq!(identify.token, TEST_TOKEN);
    assert_eq!(identify.shard, Some(info));
    assert_eq!(identify.intents, Intents::GUILDS | Intents::GUILD_MESSAGES);
    assert_eq!(identify.properties.browser, "pushgate");
    assert_eq!(shard.handle.status(), ShardStatus::Identifying);
}

#[tokio::test(start_paused = true)]
async fn test_identify_carries_initial_presence() {
    let presence = PresenceUpdatePayload::new("idle").with_activity(Activity {
        name: "the gateway".to_string(),
        kind: 3,
        url: None,
    });
    let mut shard = TestShard::spawn(test_config().with_presence(presence.clone()));

    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    let identify = socket.expect_op(OpCode::Identify).await.as_identify().unwrap();
    assert_eq!(identify.presence, Some(presence));
}

#[tokio::test(start_paused = true)]
async fn test_stored_session_resumes_on_first_connection() {
    let mut session = Session::new();
    session.establish("stored", Some(RESUME_URL.to_string()));
    session.observe_sequence(812);
    let mut shard = TestShard::spawn_resuming(test_config(), session);

    let mut socket = shard.gateway.accept().await;
    assert_eq!(socket.url, connect_url(RESUME_URL));
    socket.hello(SLOW_HEARTBEAT_MS);
    let resume = socket.expect_op(OpCode::Resume).await.as_resume().unwrap();
    assert_eq!(resume.session_id, "stored");
    assert_eq!(resume.seq, 812);
}

#[tokio::test(start_paused = true)]
async fn test_ready_waits_for_all_guilds() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.accept_and_identify(SLOW_HEARTBEAT_MS).await;

    let guilds: Vec<u64> = (1..=10).collect();
    socket.ready(1, "abc", &guilds, None);
    shard.wait_for_status(ShardStatus::WaitingForInitialState).await;

    for (i, id) in guilds.iter().enumerate() {
        assert_eq!(shard.handle.status(), ShardStatus::WaitingForInitialState);
        socket.guild_create(2 + i as u64, *id);
    }

    match shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Established { .. }))
        .await
    {
        GatewayEvent::Established {
            shard_id,
            session_id,
        } => {
            assert_eq!(shard_id, 0);
            assert_eq!(session_id, "abc");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(shard.handle.status(), ShardStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_are_forwarded_in_order() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.accept_and_identify(SLOW_HEARTBEAT_MS).await;
    socket.ready(1, "abc", &[], None);
    socket.dispatch("MESSAGE_CREATE", 2, json!({"id": "10", "content": "hi"}));
    socket.dispatch("SOMETHING_NEW", 3, json!({"x": 1}));

    let mut seen = Vec::new();
    while seen.len() < 3 {
        if let GatewayEvent::Dispatch { event, .. } = shard.next_event().await {
            seen.push((event.event_type, event.kind, event.sequence));
        }
    }

    assert_eq!(
        seen,
        vec![
            ("READY".to_string(), GatewayEventType::Ready, 1),
            ("MESSAGE_CREATE".to_string(), GatewayEventType::MessageCreate, 2),
            ("SOMETHING_NEW".to_string(), GatewayEventType::Unhandled, 3),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ready_timeout_proceeds_without_missing_guilds() {
    let mut shard = TestShard::spawn(test_config().with_ready_timeout(Duration::from_secs(15)));
    let socket = shard.accept_and_identify(SLOW_HEARTBEAT_MS).await;

    let started = Instant::now();
    socket.ready(1, "abc", &[1, 2], None);
    socket.guild_create(2, 1);

    let debug = shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Debug { .. }))
        .await;
    assert!(matches!(debug, GatewayEvent::Debug { ref message, .. } if message.contains('1')));
    shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Established { .. }))
        .await;

    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(shard.handle.status(), ShardStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_missing_hello_times_out_and_reconnects() {
    let config = test_config().with_handshake_timeout(Duration::from_secs(30));
    let mut shard = TestShard::spawn(config);

    let opened_at = Instant::now();
    let mut silent = shard.gateway.accept().await;
    assert_eq!(silent.recv().await.and_then(|f| f.close_code()), Some(4000));
    assert!(opened_at.elapsed() >= Duration::from_secs(30));

    let disconnected = shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Disconnected { .. }))
        .await;
    assert!(matches!(
        disconnected,
        GatewayEvent::Disconnected {
            code: Some(4000),
            recoverable: true,
            ..
        }
    ));

    let mut socket = shard.gateway.accept().await;
    assert_eq!(shard.gateway.connection_attempts(), 2);
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Identify).await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_ready_times_out_despite_acked_heartbeats() {
    let config = test_config().with_handshake_timeout(Duration::from_secs(30));
    let mut shard = TestShard::spawn(config);
    let mut socket = shard.accept_and_identify(5_000).await;
    let identified_at = Instant::now();

    let code = loop {
        match socket.recv().await {
            Some(WsFrame::Close(frame)) => break frame.map(|f| f.code),
            Some(_) => socket.heartbeat_ack(),
            None => panic!("sink closed without a close frame"),
        }
    };
    assert_eq!(code, Some(4000));
    assert!(identified_at.elapsed() >= Duration::from_secs(30));

    shard.wait_for_status(ShardStatus::Reconnecting).await;
    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Identify).await;
}

#[tokio::test(start_paused = true)]
async fn test_identify_gate_wait_does_not_count_toward_handshake() {
    let gate = Arc::new(IdentifyGate::new(Duration::from_secs(60)));
    gate.acquire(0).await;
    let config = test_config().with_handshake_timeout(Duration::from_secs(10));
    let mut shard = TestShard::spawn_with(ShardInfo::single(), config, Arc::clone(&gate));

    let mut socket = shard.gateway.accept().await;
    let hello_at = Instant::now();
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Identify).await;

    assert!(hello_at.elapsed() >= Duration::from_secs(50));
    assert_eq!(shard.gateway.connection_attempts(), 1);
    socket.ready(1, "abc", &[], None);
    shard.wait_for_status(ShardStatus::Connected).await;
}

// ============================================================================
// Heartbeats
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_heartbeat_carries_last_sequence() {
    let mut shard = TestShard::spawn(test_config());
    let mut socket = shard.accept_and_identify(1_000).await;
    socket.ready(1, "abc", &[], None);
    socket.dispatch("MESSAGE_CREATE", 57, json!({}));

    let heartbeat = socket.expect_op(OpCode::Heartbeat).await;
    assert_eq!(heartbeat.as_heartbeat_seq(), Some(Some(57)));

    socket.heartbeat_ack();
    socket.expect_op(OpCode::Heartbeat).await;
    assert!(shard.handle.latency().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_gateway_heartbeat_request_is_answered() {
    let mut shard = TestShard::spawn(test_config());
    let mut socket = shard.connect("abc").await;

    socket.send_message(&GatewayMessage::new(OpCode::Heartbeat, json!(null)));
    let heartbeat = socket.expect_op(OpCode::Heartbeat).await;
    assert_eq!(heartbeat.as_heartbeat_seq(), Some(Some(1)));
}

#[tokio::test(start_paused = true)]
async fn test_zombie_connection_is_closed_and_resumed() {
    let mut shard = TestShard::spawn(test_config());
    let mut socket = shard.accept_and_identify(1_000).await;
    socket.ready(1, "abc", &[], Some(RESUME_URL));
    shard.wait_for_status(ShardStatus::Connected).await;

    for _ in 0..3 {
        let message = socket.recv_message().await;
        assert_eq!(message.op, OpCode::Heartbeat);
    }
    assert_eq!(socket.recv().await.and_then(|f| f.close_code()), Some(4000));

    let disconnected = shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Disconnected { .. }))
        .await;
    assert!(matches!(
        disconnected,
        GatewayEvent::Disconnected {
            code: Some(4000),
            recoverable: true,
            ..
        }
    ));

    let mut socket = shard.gateway.accept().await;
    assert_eq!(socket.url, connect_url(RESUME_URL));
    socket.hello(1_000);
    let resume = socket.expect_op(OpCode::Resume).await.as_resume().unwrap();
    assert_eq!(resume.session_id, "abc");
}

#[tokio::test(start_paused = true)]
async fn test_single_missed_ack_closes_with_tolerance_one() {
    let mut shard = TestShard::spawn(test_config().with_heartbeat_miss_tolerance(1));
    let mut socket = shard.accept_and_identify(1_000).await;
    socket.ready(1, "abc", &[], None);

    let heartbeat = socket.recv_message().await;
    assert_eq!(heartbeat.op, OpCode::Heartbeat);
    assert_eq!(socket.recv().await.and_then(|f| f.close_code()), Some(4000));
}

// ============================================================================
// Close policy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_resume_after_abnormal_close() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.accept_and_identify(SLOW_HEARTBEAT_MS).await;
    socket.ready(1, "abc", &[], Some(RESUME_URL));
    for seq in 2..=57 {
        socket.dispatch("MESSAGE_CREATE", seq, json!({}));
    }
    shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Dispatch { event, .. } if event.sequence == 57))
        .await;

    socket.close(1006, "");
    let disconnected = shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Disconnected { .. }))
        .await;
    assert!(matches!(
        disconnected,
        GatewayEvent::Disconnected {
            code: Some(1006),
            recoverable: true,
            ..
        }
    ));

    let mut socket = shard.gateway.accept().await;
    assert_eq!(socket.url, connect_url(RESUME_URL));
    socket.hello(SLOW_HEARTBEAT_MS);
    let resume = socket.expect_op(OpCode::Resume).await.as_resume().unwrap();
    assert_eq!(resume.token, TEST_TOKEN);
    assert_eq!(resume.session_id, "abc");
    assert_eq!(resume.seq, 57);

    socket.dispatch("MESSAGE_CREATE", 58, json!({}));
    socket.dispatch("MESSAGE_CREATE", 59, json!({}));
    socket.dispatch("RESUMED", 60, json!({}));

    let resumed = shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Resumed { .. }))
        .await;
    assert!(matches!(resumed, GatewayEvent::Resumed { replayed: 2, .. }));
    assert_eq!(shard.handle.status(), ShardStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_stream_end_without_close_frame_resumes() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.connect("abc").await;

    socket.drop_connection();
    let disconnected = shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Disconnected { .. }))
        .await;
    assert!(matches!(
        disconnected,
        GatewayEvent::Disconnected {
            code: None,
            recoverable: true,
            ..
        }
    ));

    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Resume).await;
}

#[tokio::test(start_paused = true)]
async fn test_session_timeout_starts_fresh_session() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.connect("abc").await;

    socket.close(4009, "Session timed out");
    shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Disconnected { code: Some(4009), .. }))
        .await;

    let mut socket = shard.gateway.accept().await;
    assert_eq!(socket.url, connect_url(GATEWAY_URL));
    socket.hello(SLOW_HEARTBEAT_MS);
    let identify = socket.expect_op(OpCode::Identify).await;
    assert!(identify.as_identify().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_authentication_failure_is_fatal() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.accept_and_identify(SLOW_HEARTBEAT_MS).await;

    socket.close(4004, "Authentication failed");

    let disconnected = shard.next_event().await;
    assert!(matches!(
        disconnected,
        GatewayEvent::Disconnected {
            code: Some(4004),
            recoverable: false,
            ..
        }
    ));
    match shard.next_event().await {
        GatewayEvent::Error {
            error, recoverable, ..
        } => {
            assert!(!recoverable);
            assert!(matches!(*error, ShardError::FatalClose { code: 4004, .. }));
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(shard.handle.status().is_terminal());
    assert!(shard.gateway.try_accept().is_none());
    assert_eq!(shard.gateway.connection_attempts(), 1);
    shard.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_request_resumes() {
    let mut shard = TestShard::spawn(test_config());
    let mut socket = shard.connect("abc").await;

    socket.reconnect();
    assert_eq!(socket.expect_close().await, Some(4000));

    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Resume).await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_session_not_resumable_identifies() {
    let mut shard = TestShard::spawn(test_config());
    let mut socket = shard.connect("abc").await;

    socket.invalid_session(false);
    assert_eq!(socket.expect_close().await, Some(1000));

    let mut socket = shard.gateway.accept().await;
    assert_eq!(socket.url, connect_url(GATEWAY_URL));
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Identify).await;
}

#[tokio::test(start_paused = true)]
async fn test_resume_replay_limit_abandons_resume() {
    let mut shard = TestShard::spawn(test_config().with_max_resume_replay(2));
    let socket = shard.connect("abc").await;
    socket.drop_connection();

    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Resume).await;
    for seq in 2..=4 {
        socket.dispatch("MESSAGE_CREATE", seq, json!({}));
    }
    assert_eq!(socket.expect_close().await, Some(1000));

    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Identify).await;
}

#[tokio::test(start_paused = true)]
async fn test_resume_is_not_gated_by_identify_window() {
    let gate = Arc::new(IdentifyGate::new(Duration::from_secs(60)));
    let mut shard = TestShard::spawn_with(ShardInfo::single(), test_config(), gate);
    let socket = shard.connect("abc").await;
    socket.drop_connection();

    let mut socket = shard.gateway.accept().await;
    let hello_at = Instant::now();
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Resume).await;
    assert!(hello_at.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_reidentify_waits_for_identify_window() {
    let gate = Arc::new(IdentifyGate::new(Duration::from_secs(60)));
    let mut shard = TestShard::spawn_with(ShardInfo::single(), test_config(), gate);
    let identified_at = Instant::now();
    let socket = shard.connect("abc").await;

    socket.close(4009, "Session timed out");
    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Identify).await;
    assert!(identified_at.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempts_exhausted() {
    let config = test_config().with_max_reconnect_attempts(2);
    let mut shard = TestShard::spawn(config);
    shard.gateway.fail_next(10);

    match shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Error { .. }))
        .await
    {
        GatewayEvent::Error {
            error, recoverable, ..
        } => {
            assert!(!recoverable);
            assert!(matches!(
                *error,
                ShardError::ReconnectAttemptsExhausted { attempts: 2 }
            ));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(shard.handle.status(), ShardStatus::Dead);
    assert_eq!(shard.gateway.connection_attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connects_back_off_then_recover() {
    let config = test_config().with_reconnect_delays(Duration::from_secs(1), Duration::from_secs(4));
    let mut shard = TestShard::spawn(config);
    shard.gateway.fail_next(3);

    let started = Instant::now();
    let mut socket = shard.gateway.accept().await;
    // Three jittered delays: at least 1s + 1s + 1s, at most 2s + 4s + 4s.
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(3), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(10), "waited {waited:?}");
    assert_eq!(shard.gateway.connection_attempts(), 4);

    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Identify).await;
}

#[tokio::test(start_paused = true)]
async fn test_stable_connection_resets_backoff() {
    let config = test_config()
        .with_reconnect_delays(Duration::from_secs(1), Duration::from_secs(30))
        .with_max_reconnect_attempts(4);
    let mut shard = TestShard::spawn(config);
    shard.gateway.fail_next(4);

    let socket = shard.connect("abc").await;
    assert_eq!(shard.gateway.connection_attempts(), 5);

    // Held past the stability window, so the four failures are forgotten.
    sleep(Duration::from_secs(61)).await;
    socket.drop_connection();
    let dropped_at = Instant::now();

    let mut socket = shard.gateway.accept().await;
    let waited = dropped_at.elapsed();
    assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(2), "waited {waited:?}");
    assert_ne!(shard.handle.status(), ShardStatus::Dead);

    socket.hello(SLOW_HEARTBEAT_MS);
    socket.expect_op(OpCode::Resume).await;
}

// ============================================================================
// Sending and shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_send_and_reserved_opcodes() {
    let mut shard = TestShard::spawn(test_config());

    let early = shard
        .handle
        .send(OpCode::PresenceUpdate, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(early, ShardError::NotConnected { .. }));

    let mut socket = shard.connect("abc").await;

    shard
        .handle
        .update_presence(PresenceUpdatePayload::new("dnd"))
        .await
        .unwrap();
    let presence = socket.expect_op(OpCode::PresenceUpdate).await;
    assert_eq!(presence.d.unwrap()["status"], "dnd");

    let reserved = shard.handle.send(OpCode::Identify, json!({})).await.unwrap_err();
    assert!(matches!(reserved, ShardError::ReservedOpcode(OpCode::Identify)));

    let server_only = shard.handle.send(OpCode::Hello, json!({})).await.unwrap_err();
    assert!(matches!(server_only, ShardError::NotClientOpcode(OpCode::Hello)));

    let invalid = shard
        .handle
        .update_presence(PresenceUpdatePayload::new("busy"))
        .await
        .unwrap_err();
    assert!(matches!(invalid, ShardError::InvalidPresence(_)));
}

#[tokio::test(start_paused = true)]
async fn test_outbound_quota_rejects_excess_sends() {
    let mut shard = TestShard::spawn(test_config().with_outbound_per_minute(2));
    let _socket = shard.connect("abc").await;

    for _ in 0..2 {
        shard
            .handle
            .send(OpCode::RequestGuildMembers, json!({"guild_id": "1"}))
            .await
            .unwrap();
    }
    let limited = shard
        .handle
        .send(OpCode::RequestGuildMembers, json!({"guild_id": "1"}))
        .await
        .unwrap_err();
    assert!(limited.retry_after().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_frames_are_dropped() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.connect("abc").await;

    socket.send_raw("not json");
    socket.send_raw(r#"{"op":42,"d":null}"#);
    socket.send_frame(WsFrame::Binary(
        br#"{"op":0,"t":"MESSAGE_CREATE","s":2,"d":{}}"#.to_vec(),
    ));

    let event = shard
        .wait_for_event(|e| matches!(e, GatewayEvent::Dispatch { event, .. } if event.sequence == 2))
        .await;
    assert!(matches!(event, GatewayEvent::Dispatch { .. }));
    assert_eq!(shard.handle.status(), ShardStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_with_normal_code() {
    let mut shard = TestShard::spawn(test_config());
    let mut socket = shard.connect("abc").await;

    shard.handle.shutdown(ShutdownIntent::Idle).await;
    assert_eq!(shard.handle.status(), ShardStatus::Idle);
    assert_eq!(socket.expect_close().await, Some(1000));
    assert!(shard.gateway.try_accept().is_none());

    let handle = shard.handle.clone();
    shard.join().await;
    assert!(!handle.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff() {
    let mut shard = TestShard::spawn(test_config());
    let socket = shard.connect("abc").await;
    socket.drop_connection();
    shard.wait_for_status(ShardStatus::Reconnecting).await;

    shard.handle.shutdown(ShutdownIntent::Dead).await;
    assert_eq!(shard.handle.status(), ShardStatus::Dead);
    assert_eq!(shard.gateway.connection_attempts(), 1);
    shard.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_waiting_for_identify_gate() {
    let gate = Arc::new(IdentifyGate::new(Duration::from_secs(60)));
    gate.acquire(0).await;
    let mut shard = TestShard::spawn_with(ShardInfo::single(), test_config(), Arc::clone(&gate));

    let mut socket = shard.gateway.accept().await;
    socket.hello(SLOW_HEARTBEAT_MS);
    shard.wait_for_status(ShardStatus::Identifying).await;

    let started = Instant::now();
    shard.handle.shutdown(ShutdownIntent::Idle).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(shard.handle.status(), ShardStatus::Idle);

    // The close frame is the first thing written: no Identify went out.
    assert_eq!(socket.recv().await.and_then(|f| f.close_code()), Some(1000));
    assert!(shard.gateway.try_accept().is_none());
    shard.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_the_shard() {
    let mut shard = TestShard::spawn(test_config());
    let mut socket = shard.connect("abc").await;

    let TestShard {
        handle,
        events: _events,
        gateway: _gateway,
        task,
        ..
    } = shard;
    drop(handle);

    assert_eq!(socket.expect_close().await, Some(1000));
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("shard task kept running")
        .expect("shard task panicked");
}
