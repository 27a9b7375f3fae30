//! End-to-end session behaviour over mock links, on a paused clock.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::harness::{self, CLOCK, settle};
use common::mock_link::Refusal;
use common::mock_source::{self, MockAcquirer, VGA};
use smartsession_client::sampler::{SkipReason, TickOutcome};
use smartsession_client::{ChannelEvent, ClientConfig, ConnectionState, SessionError};
use tokio::time::sleep;

fn oldest_first(timeline: &[smartsession_client::TimelineEntry]) -> Vec<String> {
    timeline
        .iter()
        .rev()
        .map(|entry| entry.status.as_str().to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn repeated_statuses_collapse_in_timeline() {
    let (session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    for status in ["FOCUSED", "FOCUSED", "CONFUSED", "FOCUSED"] {
        tap.status(status);
    }
    settle().await;

    let timeline = board.timeline();
    assert_eq!(oldest_first(&timeline), vec!["FOCUSED", "CONFUSED", "FOCUSED"]);
    assert!(timeline.iter().all(|entry| entry.timestamp == CLOCK));
    assert_eq!(board.current_status().as_str(), "FOCUSED");

    handle.stop();
    let (_session, report) = task.await.unwrap();
    assert_eq!(report.timeline_len, 3);
}

#[tokio::test(start_paused = true)]
async fn denied_camera_blocks_and_never_sends() {
    let acquirer = MockAcquirer::denying().after(Duration::from_millis(200));
    let grabs = acquirer.grab_counter();
    let (session, tap) = harness::session(acquirer);
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    sleep(Duration::from_secs(3)).await;

    assert_eq!(board.current_status().as_str(), "CAMERA BLOCKED");
    assert_eq!(board.connection_state(), ConnectionState::Open);
    assert_eq!(tap.sent_count(), 0);
    assert_eq!(grabs.load(Ordering::SeqCst), 0);

    handle.stop();
    let (_session, report) = task.await.unwrap();
    assert_eq!(report.frames_sent, 0);
    assert!(report.ticks_skipped >= 5);
}

#[tokio::test(start_paused = true)]
async fn denial_is_never_retried_even_if_later_sentinels_overwrite_it() {
    let (mut session, tap) = harness::session(MockAcquirer::granting());

    session
        .on_acquired(Err(SessionError::acquisition("camera", "permission denied")))
        .await;
    assert_eq!(session.current_status().as_str(), "CAMERA BLOCKED");

    // Last writer wins on the status cell.
    session.on_channel_event(ChannelEvent::Opened);
    assert_eq!(session.current_status().as_str(), "CONNECTED");

    for _ in 0..5 {
        assert!(matches!(
            session.on_tick().await,
            TickOutcome::Skipped(SkipReason::NoSource)
        ));
    }
    assert_eq!(tap.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn open_then_error_stops_sending() {
    let (session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    let mut observed = vec![board.current_status().to_string()];

    settle().await;
    tap.open();
    settle().await;
    observed.push(board.current_status().to_string());

    sleep(Duration::from_millis(1250)).await;
    assert_eq!(tap.sent_count(), 2);

    tap.fail("connection reset by peer");
    settle().await;
    observed.push(board.current_status().to_string());
    assert_eq!(observed, vec!["CONNECTING", "CONNECTED", "BACKEND ERROR"]);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(tap.sent_count(), 2);

    handle.stop();
    let (_session, report) = task.await.unwrap();
    assert_eq!(report.final_status.as_str(), "BACKEND ERROR");
    assert_eq!(report.connection, ConnectionState::Errored);
    assert_eq!(report.frames_sent, 2);
    assert_eq!(tap.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_service_leaves_timeline_empty() {
    let (session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    sleep(Duration::from_secs(3)).await;

    assert!(board.timeline().is_empty());
    assert_eq!(board.current_status().as_str(), "CONNECTED");
    assert!(tap.sent_count() > 0);

    handle.stop();
    let (_session, report) = task.await.unwrap();
    assert_eq!(report.timeline_len, 0);
    assert_eq!(report.final_status.as_str(), "DISCONNECTED");
}

#[tokio::test(start_paused = true)]
async fn never_opened_connection_stays_connecting() {
    let (session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(board.current_status().as_str(), "CONNECTING");
    assert!(board.timeline().is_empty());
    assert_eq!(tap.sent_count(), 0);

    handle.stop();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn malformed_messages_are_counted_not_fatal() {
    let (session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    tap.status("FOCUSED");
    tap.emit(ChannelEvent::Message("<html>502</html>".into()));
    tap.emit(ChannelEvent::Message(r#"{"reason":"NO_FACE"}"#.into()));
    tap.status("CONFUSED");
    settle().await;

    assert_eq!(oldest_first(&board.timeline()), vec!["FOCUSED", "CONFUSED"]);
    assert_eq!(board.current_status().as_str(), "CONFUSED");

    handle.stop();
    let (_session, report) = task.await.unwrap();
    assert_eq!(report.decode_failures, 2);
}

#[tokio::test(start_paused = true)]
async fn reason_is_kept_on_timeline_entries() {
    let (session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    tap.emit(ChannelEvent::Message(
        r#"{"status":"PROCTOR_ALERT","reason":"MULTIPLE_FACES","history":[]}"#.into(),
    ));
    settle().await;

    let timeline = board.timeline();
    assert_eq!(timeline[0].reason.as_deref(), Some("MULTIPLE_FACES"));

    handle.stop();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn exit_on_disconnect_ends_the_run() {
    let config = ClientConfig {
        exit_on_disconnect: true,
        ..ClientConfig::default()
    };
    let (session, tap) = harness::session_with(config, MockAcquirer::granting());
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    tap.emit(ChannelEvent::Closed {
        code: Some(1001),
        reason: "server going away".into(),
    });

    let (session, report) = task.await.unwrap();
    assert!(session.is_torn_down());
    assert_eq!(report.connection, ConnectionState::Closed);
    assert_eq!(report.final_status.as_str(), "DISCONNECTED");
    assert_eq!(tap.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn frames_are_canvas_sized_base64_jpegs() {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use smartsession_client::OutboundFrame;

    let (mut session, tap) = harness::session(MockAcquirer::granting());
    let (source, grabs) = mock_source::source(VGA);
    session.on_acquired(Ok(source)).await;
    session.on_channel_event(ChannelEvent::Opened);

    assert!(matches!(session.on_tick().await, TickOutcome::Sent { .. }));
    assert_eq!(grabs.load(Ordering::SeqCst), 1);

    let OutboundFrame::Text(text) = &tap.sent()[0] else {
        panic!("default wire encoding is a text frame");
    };
    let jpeg = STANDARD.decode(text).unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (320, 240));
}

#[tokio::test(start_paused = true)]
async fn graceful_close_racing_a_send_reads_as_disconnected() {
    let (mut session, tap) = harness::session(MockAcquirer::granting());
    let (source, _grabs) = mock_source::source(VGA);
    session.on_acquired(Ok(source)).await;
    session.on_channel_event(ChannelEvent::Opened);

    // The close is queued but not yet applied when the tick fires.
    tap.emit(ChannelEvent::Closed {
        code: Some(1000),
        reason: "normal closure".into(),
    });
    tap.refuse_sends(Refusal::Closed);

    assert!(matches!(session.on_tick().await, TickOutcome::SendFailed(_)));
    assert_eq!(session.current_status().as_str(), "DISCONNECTED");
    assert_eq!(session.connection_state(), ConnectionState::Closed);
    assert_eq!(session.report().tick_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn refused_send_maps_to_close_or_error_by_kind() {
    for (refusal, status, state) in [
        (Refusal::Closed, "DISCONNECTED", ConnectionState::Closed),
        (Refusal::Broken, "BACKEND ERROR", ConnectionState::Errored),
    ] {
        let (mut session, tap) = harness::session(MockAcquirer::granting());
        let (source, _grabs) = mock_source::source(VGA);
        session.on_acquired(Ok(source)).await;
        session.on_channel_event(ChannelEvent::Opened);
        tap.refuse_sends(refusal);

        assert!(matches!(session.on_tick().await, TickOutcome::SendFailed(_)));
        assert_eq!(session.current_status().as_str(), status, "{refusal:?}");
        assert_eq!(session.connection_state(), state, "{refusal:?}");
        assert_eq!(tap.sent_count(), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn refused_send_ends_the_run_with_exit_on_disconnect() {
    let config = ClientConfig {
        exit_on_disconnect: true,
        ..ClientConfig::default()
    };
    let (session, tap) = harness::session_with(config, MockAcquirer::granting());
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    tap.refuse_sends(Refusal::Closed);

    let (session, report) = task.await.unwrap();
    assert!(session.is_torn_down());
    assert_eq!(report.connection, ConnectionState::Closed);
    assert_eq!(report.final_status.as_str(), "DISCONNECTED");
    assert_eq!(report.tick_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_event_stream_reads_as_disconnected() {
    let (session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    let handle = session.handle();
    let task = harness::spawn(session);

    settle().await;
    tap.open();
    settle().await;
    assert_eq!(board.current_status().as_str(), "CONNECTED");

    sleep(Duration::from_millis(750)).await;
    let sent = tap.sent_count();
    assert_eq!(sent, 1);

    tap.hang_up();
    settle().await;
    assert_eq!(board.current_status().as_str(), "DISCONNECTED");
    assert_eq!(board.connection_state(), ConnectionState::Closed);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(tap.sent_count(), sent);

    handle.stop();
    let (_session, report) = task.await.unwrap();
    assert_eq!(report.connection, ConnectionState::Closed);
    assert_eq!(report.final_status.as_str(), "DISCONNECTED");
}

#[tokio::test(start_paused = true)]
async fn dropping_the_run_future_tears_the_session_down() {
    let (mut session, tap) = harness::session(MockAcquirer::granting());
    let board = session.board();
    tap.open();

    let cut = tokio::time::timeout(Duration::from_millis(1250), session.run()).await;
    assert!(cut.is_err());

    assert!(session.is_torn_down());
    assert_eq!(tap.sent_count(), 2);
    assert_eq!(tap.abort_count(), 1);
    assert_eq!(tap.close_count(), 0);
    assert_eq!(session.connection_state(), ConnectionState::Closed);
    assert_eq!(board.current_status().as_str(), "DISCONNECTED");

    session.teardown().await;
    assert_eq!(tap.close_count(), 0);
    assert!(matches!(
        session.on_tick().await,
        TickOutcome::Skipped(SkipReason::Halted)
    ));
    assert_eq!(tap.sent_count(), 2);
}
