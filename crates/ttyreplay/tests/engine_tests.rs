//! Integration tests for the playback engine.
//!
//! These run on tokio's paused clock, so timer deadlines are exact.

use std::time::Duration;

use tokio::time::{Instant, advance};
use ttyreplay::event::{Direction, Message, SessionStart};
use ttyreplay::headless::{CountingAck, MemoryLog, MemoryRenderer};
use ttyreplay::{
    Acknowledge, CellMetrics, Engine, EventKind, FeedKind, Geometry, NoAck, PlaybackConfig,
    PlaybackState, SessionEvent, TerminalType, escape_keystrokes,
};

type Replay = Engine<MemoryRenderer, MemoryLog, NoAck>;
type Live = Engine<MemoryRenderer, MemoryLog, CountingAck>;

fn replay(events: Vec<SessionEvent>) -> (Replay, MemoryRenderer, MemoryLog) {
    let renderer = MemoryRenderer::new();
    let log = MemoryLog::new();
    let mut engine = Engine::replay(renderer.clone(), log.clone(), PlaybackConfig::default());
    engine.load(events);
    (engine, renderer, log)
}

fn live() -> (Live, MemoryRenderer, CountingAck) {
    let renderer = MemoryRenderer::new();
    let acks = CountingAck::new();
    let mut engine = Engine::new(
        renderer.clone(),
        MemoryLog::new(),
        acks.clone(),
        PlaybackConfig::default(),
    );
    engine.set_live();
    (engine, renderer, acks)
}

/// Process every step whose deadline has passed.
async fn fire<A: Acknowledge>(engine: &mut Engine<MemoryRenderer, MemoryLog, A>) {
    while engine.deadline().is_some_and(|deadline| deadline <= Instant::now()) {
        engine.process_next_event().await.unwrap();
    }
}

/// Step a live engine the way the player does when events arrive.
async fn step_live<A: Acknowledge>(engine: &mut Engine<MemoryRenderer, MemoryLog, A>) {
    while engine.wants_step() {
        engine.process_next_event().await.unwrap();
    }
}

/// Play a replay to the end, one timer at a time.
async fn play_out<A: Acknowledge>(engine: &mut Engine<MemoryRenderer, MemoryLog, A>) {
    engine.play().await.unwrap();
    while let Some(deadline) = engine.deadline() {
        tokio::time::sleep_until(deadline).await;
        engine.process_next_event().await.unwrap();
    }
}

fn session() -> Vec<SessionEvent> {
    vec![
        SessionEvent::start(
            0,
            SessionStart {
                client_host: Some("10.0.0.2:5122".into()),
                server_host: Some("db1:22".into()),
                ..SessionStart::default()
            },
        ),
        SessionEvent::request(5, "pty-req", b"xterm"),
        SessionEvent::incoming(10, "$ "),
        SessionEvent::outgoing(400, "l"),
        SessionEvent::outgoing(500, "s"),
        SessionEvent::outgoing(650, "\r"),
        SessionEvent::incoming(700, "a.txt\nb.txt\n$ "),
        SessionEvent::resize(900, 40, 120),
        SessionEvent::incoming(1200, "\x1b[2J"),
        SessionEvent::stop(2000),
    ]
}

fn bad_message(offset: i64) -> SessionEvent {
    SessionEvent::new(
        offset,
        EventKind::Message(Message {
            direction: Direction::Incoming,
            data: "!!not base64!!".into(),
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn replays_message_example() {
    let (mut engine, renderer, log) = replay(vec![
        SessionEvent::from_json(r#"{"type":"new-message","offset":0,"direction":"incoming","data":"aGk="}"#)
            .unwrap(),
        SessionEvent::from_json(r#"{"type":"new-message","offset":100,"direction":"outgoing","data":"eA=="}"#)
            .unwrap(),
        SessionEvent::from_json(r#"{"type":"session-stop","offset":200}"#).unwrap(),
    ]);

    engine.play().await.unwrap();
    fire(&mut engine).await;
    assert_eq!(renderer.output_string(), "hi");
    assert_eq!(log.text(), "");

    advance(Duration::from_millis(100)).await;
    fire(&mut engine).await;
    assert_eq!(log.text(), "x");

    advance(Duration::from_millis(100)).await;
    fire(&mut engine).await;
    assert_eq!(engine.state(), PlaybackState::Ended);
    assert_eq!(engine.event_index(), 3);
    assert!(engine.deadline().is_none());
    assert_eq!(renderer.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn replays_recorder_records_verbatim() {
    let (mut engine, renderer, log) = replay(vec![
        SessionEvent::from_json(r#"{"offset":0,"type":"message","direction":"incoming","data":"aGk="}"#)
            .unwrap(),
        SessionEvent::from_json(r#"{"offset":1000,"type":"message","direction":"outgoing","data":"eA=="}"#)
            .unwrap(),
        SessionEvent::from_json(r#"{"offset":1000,"type":"session-stop"}"#).unwrap(),
    ]);

    engine.play().await.unwrap();
    fire(&mut engine).await;
    assert_eq!(renderer.output_string(), "hi");

    // The stop shares the keystroke's offset, so both fire together.
    advance(Duration::from_millis(1000)).await;
    fire(&mut engine).await;
    assert_eq!(log.text(), escape_keystrokes(b"x"));
    assert!(engine.is_ended());
    assert!(engine.deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn paces_events_by_offset() {
    let (mut engine, _renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(1000, "b"),
        SessionEvent::incoming(3000, "c"),
    ]);

    engine.play().await.unwrap();
    fire(&mut engine).await;
    assert_eq!(engine.event_index(), 1);
    assert_eq!(engine.time_to_next_event(), Duration::from_millis(1000));

    advance(Duration::from_millis(999)).await;
    fire(&mut engine).await;
    assert_eq!(engine.event_index(), 1);
    assert_eq!(engine.time_to_next_event(), Duration::from_millis(1));

    advance(Duration::from_millis(1)).await;
    fire(&mut engine).await;
    assert_eq!(engine.event_index(), 2);
    assert_eq!(engine.time_to_next_event(), Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn speed_scales_gaps() {
    let (mut engine, _renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(2000, "b"),
    ]);
    engine.change_speed(2.0).await.unwrap();
    engine.play().await.unwrap();
    fire(&mut engine).await;
    assert_eq!(engine.time_to_next_event(), Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn speed_change_mid_gap_rescales_remaining_time() {
    let (mut engine, _renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(1000, "b"),
    ]);
    engine.play().await.unwrap();
    fire(&mut engine).await;

    advance(Duration::from_millis(400)).await;
    engine.change_speed(2.0).await.unwrap();
    assert!(!engine.is_paused());
    assert_eq!(engine.time_to_next_event(), Duration::from_millis(300));

    advance(Duration::from_millis(299)).await;
    fire(&mut engine).await;
    assert_eq!(engine.event_index(), 1);

    advance(Duration::from_millis(1)).await;
    fire(&mut engine).await;
    assert_eq!(engine.event_index(), 2);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_keep_remaining_delay() {
    let (mut engine, _renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(1000, "b"),
    ]);
    engine.play().await.unwrap();
    fire(&mut engine).await;

    advance(Duration::from_millis(250)).await;
    engine.pause();
    assert_eq!(engine.saved_delay(), Duration::from_millis(750));
    assert!(engine.deadline().is_none());

    // Pausing again must not drift.
    advance(Duration::from_secs(10)).await;
    engine.pause();
    assert_eq!(engine.saved_delay(), Duration::from_millis(750));

    engine.play().await.unwrap();
    assert_eq!(engine.deadline(), Some(Instant::now() + Duration::from_millis(750)));
}

#[tokio::test(start_paused = true)]
async fn paused_replay_does_not_step() {
    let (mut engine, renderer, _log) = replay(vec![SessionEvent::incoming(0, "a")]);
    engine.process_next_event().await.unwrap();
    assert_eq!(engine.event_index(), 0);
    assert!(renderer.writes().is_empty());
    assert_eq!(engine.state(), PlaybackState::Paused);
}

#[tokio::test(start_paused = true)]
async fn session_stop_ends_replay_early() {
    let (mut engine, renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::stop(10),
        SessionEvent::incoming(20, "never"),
    ]);
    play_out(&mut engine).await;
    assert_eq!(renderer.output_string(), "a");
    assert_eq!(engine.event_index(), 2);
    assert!(engine.is_ended());

    // Play on an ended replay is a no-op.
    engine.play().await.unwrap();
    assert!(engine.deadline().is_none());
    assert_eq!(engine.state(), PlaybackState::Ended);
}

#[tokio::test(start_paused = true)]
async fn replay_without_stop_ends_at_last_event() {
    let (mut engine, _renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(10, "b"),
    ]);
    play_out(&mut engine).await;
    assert_eq!(engine.state(), PlaybackState::Ended);
}

#[tokio::test(start_paused = true)]
async fn event_effects() {
    let (mut engine, renderer, log) = replay(session());
    play_out(&mut engine).await;

    assert_eq!(renderer.output_string(), "$ a.txt\r\nb.txt\r\n$ \x1b[2J");
    assert_eq!(log.text(), "ls[\\13]");

    let status = engine.status();
    assert_eq!(status.terminal_type, Some(TerminalType::Pty));
    assert_eq!(status.to_string(), "From: 10.0.0.2:5122;  To: db1:22; (ended)");
    assert_eq!(engine.session().term_cols, Some(120));
    assert_eq!(
        renderer.snapshot().geometry(),
        Some(CellMetrics::default().geometry(40, 120))
    );
}

#[tokio::test(start_paused = true)]
async fn exec_request_is_logged_as_keystrokes() {
    let (mut engine, _renderer, log) = replay(vec![
        SessionEvent::exec(0, "uptime"),
        SessionEvent::incoming(5, "up 3 days\n"),
    ]);
    play_out(&mut engine).await;
    assert_eq!(log.text(), "uptime");
    assert_eq!(engine.session().terminal_type, Some(TerminalType::Exec));
}

#[tokio::test(start_paused = true)]
async fn lone_nul_keystroke_is_skipped() {
    let (mut engine, _renderer, log) = replay(vec![
        SessionEvent::outgoing(0, [0u8]),
        SessionEvent::outgoing(1, b"a\0"),
    ]);
    play_out(&mut engine).await;
    assert_eq!(log.text(), "a[\\0]");
    assert_eq!(log.append_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_still_advances() {
    let (mut engine, renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        bad_message(5),
        SessionEvent::incoming(10, "b"),
    ]);
    play_out(&mut engine).await;
    assert_eq!(renderer.output_string(), "ab");
    assert_eq!(engine.event_index(), 3);
}

#[tokio::test(start_paused = true)]
async fn seek_then_play_matches_straight_playback() {
    let (mut straight, straight_renderer, straight_log) = replay(session());
    play_out(&mut straight).await;

    for target in 0..session().len() {
        let (mut engine, renderer, log) = replay(session());
        engine.move_to_event(target).await.unwrap();
        play_out(&mut engine).await;
        assert_eq!(renderer.output(), straight_renderer.output(), "seek to {target}");
        assert_eq!(log.text(), straight_log.text(), "seek to {target}");
        assert_eq!(engine.status(), straight.status(), "seek to {target}");
    }
}

#[tokio::test(start_paused = true)]
async fn backward_seek_rebuilds_from_start() {
    let (mut engine, renderer, log) = replay(session());
    engine.move_to_event(6).await.unwrap();
    assert_eq!(renderer.output_string(), "$ a.txt\r\nb.txt\r\n$ ");

    engine.move_to_event(3).await.unwrap();
    assert_eq!(renderer.snapshot().resets, 1);
    assert_eq!(renderer.output_string(), "$ ");
    assert_eq!(log.text(), "l");
    assert_eq!(engine.event_index(), 4);
    assert!(engine.is_paused());
    assert_eq!(engine.saved_delay(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn backward_seek_restores_initial_geometry() {
    let (mut engine, renderer, _log) = replay(session());
    engine.move_to_event(8).await.unwrap();
    assert_eq!(
        renderer.snapshot().geometry(),
        Some(CellMetrics::default().geometry(40, 120))
    );

    engine.move_to_event(3).await.unwrap();
    assert_eq!(renderer.snapshot().geometry(), Some(Geometry::default()));
}

#[tokio::test(start_paused = true)]
async fn keystrokes_split_across_events_seek_like_straight_play() {
    let events = || {
        vec![
            SessionEvent::outgoing(0, "\x1b"),
            SessionEvent::outgoing(10, "[A"),
            SessionEvent::outgoing(20, [0xc3u8]),
            SessionEvent::outgoing(30, [0xa9u8]),
            SessionEvent::stop(40),
        ]
    };

    let (mut engine, _renderer, straight) = replay(events());
    play_out(&mut engine).await;
    assert_eq!(straight.text(), "[ESC][A\u{fffd}\u{fffd}");

    let (mut engine, _renderer, seeked) = replay(events());
    engine.move_to_event(4).await.unwrap();
    assert_eq!(seeked.text(), straight.text());
}

#[tokio::test(start_paused = true)]
async fn seek_coalesces_output_into_one_write() {
    let (mut engine, renderer, log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(10, "b"),
        SessionEvent::outgoing(20, "x"),
        SessionEvent::outgoing(30, "y"),
    ]);
    engine.move_to_event(3).await.unwrap();
    assert_eq!(renderer.writes(), vec![b"ab".to_vec()]);
    assert_eq!(log.text(), "xy");
    assert_eq!(log.append_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn seek_bounds() {
    let (mut engine, renderer, _log) = replay(session());
    engine.move_to_event(99).await.unwrap();
    assert_eq!(engine.event_index(), 0);

    engine.move_to_event(2).await.unwrap();
    let writes = renderer.write_count();
    // Seeking to the event applied last changes nothing.
    engine.move_to_event(2).await.unwrap();
    assert_eq!(renderer.write_count(), writes);
    assert_eq!(engine.event_index(), 3);
}

#[tokio::test(start_paused = true)]
async fn seek_pauses_and_cancels_timer() {
    let (mut engine, _renderer, _log) = replay(session());
    engine.play().await.unwrap();
    fire(&mut engine).await;
    assert!(engine.deadline().is_some());

    engine.move_to_event(5).await.unwrap();
    assert!(engine.is_paused());
    assert!(engine.deadline().is_none());
    assert_eq!(engine.saved_delay(), Duration::from_millis(50));

    engine.play().await.unwrap();
    assert_eq!(engine.time_to_next_event(), Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn next_and_prev_step_one_event() {
    let (mut engine, renderer, _log) = replay(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(10, "b"),
        SessionEvent::incoming(20, "c"),
    ]);
    engine.next().await.unwrap();
    assert_eq!(engine.event_index(), 1);
    engine.next().await.unwrap();
    engine.next().await.unwrap();
    assert_eq!(renderer.output_string(), "abc");

    engine.prev().await.unwrap();
    assert_eq!(engine.event_index(), 2);
    assert_eq!(renderer.output_string(), "ab");

    // Nothing to step to.
    engine.prev().await.unwrap();
    engine.prev().await.unwrap();
    assert_eq!(engine.event_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn speed_is_clamped_to_floor() {
    let (mut engine, _renderer, _log) = replay(session());
    engine.change_speed(0.0).await.unwrap();
    assert!((engine.speed() - 0.1).abs() < f64::EPSILON);

    engine.change_speed(1.0).await.unwrap();
    engine.decrease_speed().await.unwrap();
    assert!((engine.speed() - 0.75).abs() < f64::EPSILON);
    engine.increase_speed().await.unwrap();
    engine.increase_speed().await.unwrap();
    assert!((engine.speed() - 1.25).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn max_idle_caps_long_gaps() {
    let renderer = MemoryRenderer::new();
    let config = PlaybackConfig::default().max_idle(Some(Duration::from_secs(2)));
    let mut engine = Engine::replay(renderer, MemoryLog::new(), config);
    engine.load(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(60_000, "b"),
    ]);
    engine.play().await.unwrap();
    fire(&mut engine).await;
    assert_eq!(engine.time_to_next_event(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn reset_returns_to_initial_state() {
    let (mut engine, renderer, log) = replay(session());
    play_out(&mut engine).await;
    engine.change_speed(3.0).await.unwrap();

    engine.reset().unwrap();
    assert!(engine.events().is_empty());
    assert_eq!(engine.event_index(), 0);
    assert!(engine.is_paused());
    assert!((engine.speed() - 1.0).abs() < f64::EPSILON);
    assert_eq!(engine.session().client_host, None);
    assert_eq!(renderer.output_string(), "");
    assert_eq!(log.text(), "");
    assert_eq!(renderer.snapshot().geometry(), Some(Geometry::default()));
}

#[tokio::test(start_paused = true)]
async fn live_acknowledges_each_flushed_event() {
    let (mut engine, renderer, acks) = live();
    engine.play().await.unwrap();

    engine.load(vec![SessionEvent::incoming(0, "a")]);
    step_live(&mut engine).await;
    assert_eq!(renderer.output_string(), "a");
    assert_eq!(acks.count(), 1);
    assert!(engine.deadline().is_none());

    engine.load(vec![SessionEvent::incoming(50, "b"), SessionEvent::incoming(80, "c")]);
    step_live(&mut engine).await;
    assert_eq!(acks.count(), 2);
    assert_eq!(engine.time_to_next_event(), Duration::from_millis(30));

    advance(Duration::from_millis(30)).await;
    fire(&mut engine).await;
    assert_eq!(acks.count(), 3);
    assert_eq!(renderer.output_string(), "abc");
}

#[tokio::test(start_paused = true)]
async fn live_without_stop_never_ends() {
    let (mut engine, renderer, _acks) = live();
    engine.play().await.unwrap();
    engine.load(vec![SessionEvent::incoming(0, "a"), SessionEvent::incoming(10, "b")]);
    step_live(&mut engine).await;
    advance(Duration::from_secs(60)).await;
    fire(&mut engine).await;

    assert_eq!(engine.event_index(), 2);
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert!(!engine.is_ended());
    assert_eq!(engine.time_to_next_event(), Duration::ZERO);

    // Caught up: a step with nothing new does nothing.
    engine.process_next_event().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);

    engine.load(vec![SessionEvent::incoming(90_000, "c")]);
    assert!(engine.wants_step());
    step_live(&mut engine).await;
    assert_eq!(renderer.output_string(), "abc");
}

#[tokio::test(start_paused = true)]
async fn paused_live_holds_output_and_acks() {
    let (mut engine, renderer, acks) = live();
    engine.load(vec![SessionEvent::incoming(0, "a"), SessionEvent::incoming(5, "b")]);
    step_live(&mut engine).await;

    assert_eq!(engine.event_index(), 2);
    assert!(renderer.writes().is_empty());
    assert_eq!(acks.count(), 0);
    assert_eq!(engine.pending_acks(), 2);

    engine.play().await.unwrap();
    assert_eq!(renderer.writes(), vec![b"ab".to_vec()]);
    assert_eq!(acks.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn seeks_never_acknowledge() {
    let (mut engine, _renderer, acks) = live();
    engine.load(session());
    engine.move_to_event(7).await.unwrap();
    engine.move_to_event(2).await.unwrap();
    engine.next().await.unwrap();
    engine.prev().await.unwrap();
    assert_eq!(acks.count(), 0);
}

fn numbered(count: usize) -> Vec<SessionEvent> {
    (0..count)
        .map(|i| SessionEvent::incoming(i as i64 * 10, i.to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn live_seeks_acknowledge_each_event_once() {
    let (mut engine, renderer, acks) = live();
    engine.load(numbered(10));
    play_out(&mut engine).await;
    assert_eq!(acks.count(), 10);

    engine.move_to_event(2).await.unwrap();
    assert_eq!(renderer.output_string(), "012");
    // Already seen: the paused engine must not run ahead again.
    assert!(!engine.wants_step());

    engine.move_to_event(8).await.unwrap();
    play_out(&mut engine).await;
    assert_eq!(renderer.output_string(), "0123456789");
    assert_eq!(engine.event_index(), 10);
    assert_eq!(acks.count(), 10);

    engine.load(vec![SessionEvent::incoming(100, "!")]);
    step_live(&mut engine).await;
    assert_eq!(acks.count(), 11);
}

#[tokio::test(start_paused = true)]
async fn live_events_skipped_by_a_seek_are_acknowledged_on_play() {
    let (mut engine, _renderer, acks) = live();
    engine.load(numbered(10));
    engine.move_to_event(6).await.unwrap();
    assert_eq!(engine.pending_acks(), 0);

    // Events past the seek target arrived while paused.
    step_live(&mut engine).await;
    assert_eq!(engine.event_index(), 10);
    assert_eq!(acks.count(), 0);

    engine.play().await.unwrap();
    assert_eq!(acks.count(), 10);
}

#[tokio::test(start_paused = true)]
async fn malformed_live_event_is_still_acknowledged() {
    let (mut engine, renderer, acks) = live();
    engine.play().await.unwrap();
    engine.load(vec![bad_message(0)]);
    step_live(&mut engine).await;
    assert_eq!(engine.event_index(), 1);
    assert_eq!(acks.count(), 1);
    assert!(renderer.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn ack_failure_is_not_fatal() {
    let renderer = MemoryRenderer::new();
    let mut engine = Engine::new(
        renderer.clone(),
        MemoryLog::new(),
        CountingAck::closed(),
        PlaybackConfig::default(),
    );
    engine.set_live();
    engine.play().await.unwrap();
    engine.load(vec![SessionEvent::incoming(0, "a")]);
    step_live(&mut engine).await;
    assert_eq!(renderer.output_string(), "a");
    assert_eq!(engine.pending_acks(), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_idle_ends_playback() {
    let (mut engine, _renderer, _acks) = live();
    engine.play().await.unwrap();
    engine.load(vec![SessionEvent::incoming(0, "a")]);
    step_live(&mut engine).await;

    engine.set_disconnected();
    assert_eq!(engine.session().feed, FeedKind::Old);
    assert_eq!(engine.state(), PlaybackState::Ended);
}

#[tokio::test(start_paused = true)]
async fn disconnect_mid_gap_plays_out_as_replay() {
    let (mut engine, renderer, acks) = live();
    engine.play().await.unwrap();
    engine.load(vec![
        SessionEvent::incoming(0, "a"),
        SessionEvent::incoming(500, "b"),
    ]);
    step_live(&mut engine).await;
    assert!(engine.deadline().is_some());

    engine.set_disconnected();
    assert!(!engine.is_live());
    assert_eq!(engine.state(), PlaybackState::Playing);

    advance(Duration::from_millis(500)).await;
    fire(&mut engine).await;
    assert_eq!(renderer.output_string(), "ab");
    assert_eq!(engine.state(), PlaybackState::Ended);
    assert_eq!(acks.count(), 1);
}
