//! Call relay behavior over in-memory connections.

mod mock_providers;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mock_providers::{
    ConnectBehavior, ScriptedConnector, greeting_frame, next_peer, test_upstream_config,
};
use waav_relay::core::memory::duplex;
use waav_relay::relay::{CallId, CallRelay, CallState, CloseReason, RelayOptions, Side};
use waav_relay::{MediaFrame, RelayError, UpstreamConnector};

const GREETING: &str = "Say: 'Hello caller'";

fn relay(connector: Arc<dyn UpstreamConnector>) -> CallRelay {
    CallRelay::new(CallId::new(), connector, Arc::new(test_upstream_config()))
}

fn text_frames(prefix: &str, count: usize) -> Vec<MediaFrame> {
    (0..count)
        .map(|i| MediaFrame::text(format!("{prefix}-{i}")))
        .collect()
}

#[tokio::test]
async fn test_caller_audio_reaches_upstream_after_greeting() {
    let (connector, mut peers) = ScriptedConnector::accepting();
    let connector = Arc::new(connector);
    let (telephony, mut caller) = duplex(16);

    for frame in ["A", "B", "C"] {
        caller.send(MediaFrame::text(frame)).await.unwrap();
    }
    caller.hang_up();

    let summary = relay(connector.clone()).run(telephony).await;
    let mut upstream = next_peer(&mut peers).await;

    assert_eq!(
        upstream.collect().await,
        vec![
            greeting_frame(GREETING),
            MediaFrame::text("A"),
            MediaFrame::text("B"),
            MediaFrame::text("C"),
        ]
    );
    assert_eq!(upstream.close_count(), 1);
    assert_eq!(connector.opens(), 1);

    // The greeting is a command to the provider, never audio for the caller
    assert!(caller.collect().await.is_empty());
    assert_eq!(caller.close_count(), 1);

    assert_eq!(summary.state, CallState::Closed);
    assert_eq!(summary.reason, CloseReason::Hangup(Side::Telephony));
    assert_eq!(summary.frames_to_upstream, 3);
    assert_eq!(summary.frames_to_telephony, 0);
    assert_eq!(summary.upstream_session_id.as_deref(), Some("sess_mock_1"));
    assert_eq!(
        summary.transitions,
        vec![
            CallState::Init,
            CallState::UpstreamConnecting,
            CallState::Relaying,
            CallState::Closing,
            CallState::Closed,
        ]
    );
}

#[tokio::test]
async fn test_upstream_audio_reaches_caller_in_order() {
    let (connector, mut peers) = ScriptedConnector::accepting();
    let (telephony, mut caller) = duplex(16);

    let call = tokio::spawn(relay(Arc::new(connector)).run(telephony));
    let mut upstream = next_peer(&mut peers).await;

    upstream.send(MediaFrame::text("X")).await.unwrap();
    upstream.send(MediaFrame::binary(vec![0xffu8, 0x7f])).await.unwrap();

    assert_eq!(caller.recv().await, Some(MediaFrame::text("X")));
    assert_eq!(caller.recv().await, Some(MediaFrame::binary(vec![0xffu8, 0x7f])));

    caller.hang_up();
    let summary = call.await.unwrap();

    assert_eq!(summary.frames_to_telephony, 2);
    assert_eq!(summary.reason, CloseReason::Hangup(Side::Telephony));
    assert_eq!(upstream.recv().await, Some(greeting_frame(GREETING)));
    assert_eq!(upstream.recv().await, None);
}

#[tokio::test]
async fn test_both_directions_preserve_order_without_loss() {
    const FRAMES: usize = 500;

    let (connector, mut peers) = ScriptedConnector::accepting();
    // Room for every caller frame; the upstream side stays small so the
    // relay has to wait on it while the other direction keeps flowing
    let (telephony, mut caller) = duplex(FRAMES + 1);

    let call = tokio::spawn(relay(Arc::new(connector)).run(telephony));
    let mut upstream = next_peer(&mut peers).await;
    assert_eq!(upstream.recv().await, Some(greeting_frame(GREETING)));

    let inbound = text_frames("in", FRAMES);
    let outbound = text_frames("out", FRAMES);

    let sender_in = {
        let frames = inbound.clone();
        async {
            for frame in frames {
                caller.send(frame).await.unwrap();
            }
        }
    };
    let sender_out = {
        let frames = outbound.clone();
        async {
            for frame in frames {
                upstream.send(frame).await.unwrap();
            }
        }
    };
    tokio::join!(sender_in, sender_out);

    // Both senders are done; read what crossed before anyone hangs up
    let mut at_upstream = Vec::new();
    for _ in 0..FRAMES {
        at_upstream.push(upstream.recv().await.unwrap());
    }
    let mut at_caller = Vec::new();
    for _ in 0..FRAMES {
        at_caller.push(caller.recv().await.unwrap());
    }

    assert_eq!(at_upstream, inbound);
    assert_eq!(at_caller, outbound);

    caller.hang_up();
    let summary = call.await.unwrap();
    assert_eq!(summary.frames_to_upstream, FRAMES as u64);
    assert_eq!(summary.frames_to_telephony, FRAMES as u64);
}

#[tokio::test]
async fn test_concurrent_calls_are_paired_exclusively() {
    const CALLS: usize = 10;
    const FRAMES: usize = 20;

    let (connector, mut peers) = ScriptedConnector::accepting();
    let connector: Arc<dyn UpstreamConnector> = Arc::new(connector);

    let mut calls = Vec::new();
    for i in 0..CALLS {
        let (telephony, mut caller) = duplex(FRAMES + 1);
        for frame in text_frames(&format!("call{i}"), FRAMES) {
            caller.send(frame).await.unwrap();
        }
        caller.hang_up();
        calls.push((tokio::spawn(relay(connector.clone()).run(telephony)), caller));
    }

    let mut prefixes = HashSet::new();
    for _ in 0..CALLS {
        let mut upstream = next_peer(&mut peers).await;
        let frames = upstream.collect().await;
        assert_eq!(frames.len(), FRAMES + 1);
        assert_eq!(frames[0], greeting_frame(GREETING));

        let first = frames[1].as_text().unwrap().to_string();
        let prefix = first.split('-').next().unwrap().to_string();
        assert_eq!(&frames[1..], text_frames(&prefix, FRAMES).as_slice());
        assert!(prefixes.insert(prefix), "two sessions received the same call");
    }
    assert_eq!(prefixes.len(), CALLS);

    let mut ids = HashSet::new();
    for (call, caller) in calls {
        let summary = call.await.unwrap();
        assert_eq!(summary.state, CallState::Closed);
        assert!(ids.insert(summary.upstream_session_id.unwrap()));
        assert_eq!(caller.close_count(), 1);
    }
}

#[tokio::test]
async fn test_simultaneous_hangup_closes_each_side_once() {
    let (connector, mut peers) = ScriptedConnector::accepting();
    let (telephony, mut caller) = duplex(16);

    let call = tokio::spawn(relay(Arc::new(connector)).run(telephony));
    let mut upstream = next_peer(&mut peers).await;

    caller.hang_up();
    upstream.hang_up();
    let summary = call.await.unwrap();

    assert!(matches!(summary.reason, CloseReason::Hangup(_)));
    assert_eq!(summary.state, CallState::Closed);
    assert_eq!(caller.close_count(), 1);
    assert_eq!(upstream.close_count(), 1);
}

#[tokio::test]
async fn test_upstream_hangup_ends_call() {
    let (connector, mut peers) = ScriptedConnector::accepting();
    let (telephony, mut caller) = duplex(16);

    let call = tokio::spawn(relay(Arc::new(connector)).run(telephony));
    let mut upstream = next_peer(&mut peers).await;

    upstream.send(MediaFrame::text("bye")).await.unwrap();
    upstream.hang_up();

    let summary = call.await.unwrap();
    assert_eq!(summary.reason, CloseReason::Hangup(Side::Upstream));
    assert_eq!(caller.collect().await, vec![MediaFrame::text("bye")]);
    assert_eq!(caller.close_count(), 1);
    assert_eq!(upstream.close_count(), 1);
}

#[tokio::test]
async fn test_upstream_transport_failure_closes_caller() {
    let (connector, mut peers) = ScriptedConnector::accepting();
    let (telephony, caller) = duplex(16);

    let call = tokio::spawn(relay(Arc::new(connector)).run(telephony));
    let upstream = next_peer(&mut peers).await;

    upstream
        .fail(RelayError::TransportFailure("connection reset".to_string()))
        .await
        .unwrap();

    let summary = call.await.unwrap();
    match summary.reason {
        CloseReason::TransportFailure { side, error } => {
            assert_eq!(side, Side::Upstream);
            assert!(error.contains("connection reset"));
        }
        other => panic!("Expected TransportFailure, got {:?}", other),
    }
    assert_eq!(summary.state, CallState::Closed);
    assert!(caller.is_closed());
    assert!(upstream.is_closed());
}

#[tokio::test]
async fn test_upstream_unavailable_fails_only_that_call() {
    let (failing, _failing_peers) = ScriptedConnector::new(ConnectBehavior::Unavailable);
    let (working, mut peers) = ScriptedConnector::accepting();

    let (failed_telephony, failed_caller) = duplex(16);
    let (telephony, mut caller) = duplex(16);

    let healthy = tokio::spawn(relay(Arc::new(working)).run(telephony));
    let summary = relay(Arc::new(failing)).run(failed_telephony).await;

    assert_eq!(summary.state, CallState::Failed);
    assert!(matches!(summary.reason, CloseReason::UpstreamFailed(_)));
    assert_eq!(
        summary.transitions,
        vec![
            CallState::Init,
            CallState::UpstreamConnecting,
            CallState::Failed
        ]
    );
    assert!(summary.upstream_session_id.is_none());
    assert_eq!(failed_caller.close_count(), 1);

    // The other call keeps relaying
    let mut upstream = next_peer(&mut peers).await;
    assert_eq!(upstream.recv().await, Some(greeting_frame(GREETING)));
    caller.send(MediaFrame::text("still here")).await.unwrap();
    assert_eq!(upstream.recv().await, Some(MediaFrame::text("still here")));

    caller.hang_up();
    assert_eq!(healthy.await.unwrap().state, CallState::Closed);
}

#[tokio::test]
async fn test_rejected_config_fails_call() {
    let (connector, _peers) = ScriptedConnector::new(ConnectBehavior::ConfigInvalid);
    let (telephony, caller) = duplex(16);

    let summary = relay(Arc::new(connector)).run(telephony).await;

    assert_eq!(summary.state, CallState::Failed);
    match summary.reason {
        CloseReason::UpstreamFailed(error) => assert!(error.contains("unknown model")),
        other => panic!("Expected UpstreamFailed, got {:?}", other),
    }
    assert!(caller.is_closed());
}

#[tokio::test]
async fn test_frames_during_connect_follow_greeting() {
    let (connector, mut peers) = ScriptedConnector::new(ConnectBehavior::Accept {
        delay: Duration::from_millis(100),
    });
    let (telephony, mut caller) = duplex(16);

    let call = tokio::spawn(relay(Arc::new(connector)).run(telephony));
    caller.send(MediaFrame::text("early-1")).await.unwrap();
    caller.send(MediaFrame::text("early-2")).await.unwrap();

    let mut upstream = next_peer(&mut peers).await;
    caller.send(MediaFrame::text("late")).await.unwrap();

    assert_eq!(upstream.recv().await, Some(greeting_frame(GREETING)));
    assert_eq!(upstream.recv().await, Some(MediaFrame::text("early-1")));
    assert_eq!(upstream.recv().await, Some(MediaFrame::text("early-2")));
    assert_eq!(upstream.recv().await, Some(MediaFrame::text("late")));

    caller.hang_up();
    let summary = call.await.unwrap();
    assert_eq!(summary.frames_to_upstream, 3);
}

#[tokio::test]
async fn test_full_pending_buffer_pauses_caller() {
    let (connector, mut peers) = ScriptedConnector::new(ConnectBehavior::Accept {
        delay: Duration::from_millis(100),
    });
    let (telephony, mut caller) = duplex(16);

    let relay = relay(Arc::new(connector)).with_options(RelayOptions {
        pending_frame_limit: 2,
        ..Default::default()
    });
    let call = tokio::spawn(relay.run(telephony));

    let frames = text_frames("early", 6);
    for frame in frames.clone() {
        caller.send(frame).await.unwrap();
    }

    let mut upstream = next_peer(&mut peers).await;
    assert_eq!(upstream.recv().await, Some(greeting_frame(GREETING)));
    for expected in frames {
        assert_eq!(upstream.recv().await, Some(expected));
    }

    caller.hang_up();
    call.await.unwrap();
}

#[tokio::test]
async fn test_hangup_during_slow_connect_still_delivers_frames() {
    let (connector, mut peers) = ScriptedConnector::new(ConnectBehavior::Accept {
        delay: Duration::from_millis(50),
    });
    let connector = Arc::new(connector);
    let (telephony, mut caller) = duplex(16);

    for frame in ["A", "B", "C"] {
        caller.send(MediaFrame::text(frame)).await.unwrap();
    }
    caller.hang_up();

    let summary = tokio::time::timeout(Duration::from_secs(5), relay(connector.clone()).run(telephony))
        .await
        .expect("relay did not finish after the hangup");
    let mut upstream = next_peer(&mut peers).await;

    assert_eq!(
        upstream.collect().await,
        vec![
            greeting_frame(GREETING),
            MediaFrame::text("A"),
            MediaFrame::text("B"),
            MediaFrame::text("C"),
        ]
    );
    assert_eq!(upstream.close_count(), 1);
    assert_eq!(caller.close_count(), 1);
    assert_eq!(connector.opens(), 1);

    assert_eq!(summary.reason, CloseReason::Hangup(Side::Telephony));
    assert_eq!(summary.state, CallState::Closed);
    assert_eq!(summary.frames_to_upstream, 3);
    assert_eq!(
        summary.transitions,
        vec![
            CallState::Init,
            CallState::UpstreamConnecting,
            CallState::Relaying,
            CallState::Closing,
            CallState::Closed,
        ]
    );
}

#[tokio::test]
async fn test_caller_failure_during_connect_flushes_held_frames() {
    let (connector, mut peers) = ScriptedConnector::new(ConnectBehavior::Accept {
        delay: Duration::from_millis(50),
    });
    let (telephony, caller) = duplex(16);

    caller.send(MediaFrame::text("A")).await.unwrap();
    caller
        .fail(RelayError::TransportFailure("connection reset".to_string()))
        .await
        .unwrap();

    let summary = relay(Arc::new(connector)).run(telephony).await;
    let mut upstream = next_peer(&mut peers).await;

    assert_eq!(
        upstream.collect().await,
        vec![greeting_frame(GREETING), MediaFrame::text("A")]
    );
    assert_eq!(upstream.close_count(), 1);
    assert_eq!(summary.state, CallState::Closed);
    assert!(matches!(
        summary.reason,
        CloseReason::TransportFailure {
            side: Side::Telephony,
            ..
        }
    ));
}

#[tokio::test]
async fn test_shutdown_during_connect_abandons_open() {
    let (connector, _peers) = ScriptedConnector::new(ConnectBehavior::Hang);
    let connector = Arc::new(connector);
    let (telephony, mut caller) = duplex(16);
    let shutdown = CancellationToken::new();

    let call = tokio::spawn(
        relay(connector.clone())
            .with_shutdown(shutdown.child_token())
            .run(telephony),
    );
    caller.send(MediaFrame::text("hello?")).await.unwrap();
    caller.hang_up();
    shutdown.cancel();

    let summary = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .expect("relay ignored the shutdown")
        .unwrap();

    assert_eq!(summary.reason, CloseReason::Shutdown);
    assert_eq!(summary.state, CallState::Failed);
    assert_eq!(
        summary.transitions,
        vec![
            CallState::Init,
            CallState::UpstreamConnecting,
            CallState::Failed,
        ]
    );
    assert_eq!(summary.frames_to_upstream, 0);
    assert_eq!(caller.close_count(), 1);
    assert_eq!(connector.opens(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_live_call() {
    let (connector, mut peers) = ScriptedConnector::accepting();
    let (telephony, caller) = duplex(16);
    let shutdown = CancellationToken::new();

    let call = tokio::spawn(
        relay(Arc::new(connector))
            .with_shutdown(shutdown.child_token())
            .run(telephony),
    );
    let upstream = next_peer(&mut peers).await;

    shutdown.cancel();
    let summary = call.await.unwrap();

    assert_eq!(summary.reason, CloseReason::Shutdown);
    assert_eq!(summary.state, CallState::Closed);
    assert_eq!(caller.close_count(), 1);
    assert_eq!(upstream.close_count(), 1);
}
