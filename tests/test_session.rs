//! Session lifecycle tests on a paused clock.

mod common;

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockEvaluator, advance, one_bar_table, settle, spawn_session, spawn_with};
use tokio_util::sync::CancellationToken;
use tranceloop::display::MemoryDisplay;
use tranceloop::error::{ParameterError, SessionError};
use tranceloop::evaluator::SampleMap;
use tranceloop::observability::EventEmitter;
use tranceloop::params::{MAX_TEMPO_BPM, MIN_TEMPO_BPM, Parameters, bar_duration};
use tranceloop::pattern::{self, SILENCE};
use tranceloop::phase::{DEFAULT_PHASES, PhaseTable};
use tranceloop::session::{SessionBuilder, SessionOptions};
use tranceloop::visualizer::{FrameSource, Visualizer};

const WARMUP: Duration = Duration::from_millis(500);

// ============================================================================
// Phase progression
// ============================================================================

#[tokio::test(start_paused = true)]
async fn eight_bars_at_130_bpm_reach_groove() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 130.0);
    session.handle.start().await.unwrap();

    let bar = bar_duration(130.0);
    advance(bar * 8 + Duration::from_millis(1)).await;

    let snapshot = session.handle.snapshot();
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.label, "Groove (Bar 1/16)");
    assert_eq!(snapshot.energy, 60);
    assert_eq!(snapshot.bars_played, 9);

    let labels = session.display.labels();
    assert_eq!(labels.first().map(String::as_str), Some("Initializing..."));
    assert_eq!(labels[1], "Intro (Bar 1/8)");
    assert_eq!(labels[8], "Intro (Bar 8/8)");
    assert_eq!(labels.last().map(String::as_str), Some("Groove (Bar 1/16)"));

    let params = Parameters {
        tempo_bpm: 130.0,
        ..Parameters::default()
    };
    let calls = session.evaluator.calls();
    assert_eq!(
        calls,
        vec![
            pattern::generate(&DEFAULT_PHASES[0], &params),
            pattern::generate(&DEFAULT_PHASES[1], &params),
        ],
        "expected the initial dispatch and one phase-change dispatch"
    );
}

#[tokio::test(start_paused = true)]
async fn start_shows_initializing_then_first_bar() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.start().await.unwrap();
    settle().await;

    let history = session.display.history();
    assert_eq!(history[0].label, "Initializing...");
    assert_eq!(history[0].energy, 0);
    assert_eq!(history[1].label, "Intro (Bar 1/8)");
    assert_eq!(history[1].energy, 20);
    assert_eq!(session.evaluator.resume_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn warmup_delays_initial_dispatch() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    let handle = session.handle.clone();
    let start = tokio::spawn(async move { handle.start().await });

    advance(WARMUP - Duration::from_millis(10)).await;
    assert_eq!(session.evaluator.call_count(), 0);

    advance(Duration::from_millis(20)).await;
    assert_eq!(session.evaluator.call_count(), 1);
    start.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn cycle_wraps_to_intro() {
    let session = spawn_session(MockEvaluator::new(), one_bar_table(), 240.0);
    session.handle.start().await.unwrap();

    advance(bar_duration(240.0) * 6 + Duration::from_millis(1)).await;

    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.phase_index, 0);
    assert_eq!(snapshot.label, "Intro (Bar 1/1)");
    // initial dispatch plus one per transition
    assert_eq!(session.evaluator.call_count(), 7);
}

// ============================================================================
// Start / stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn start_then_immediate_stop_leaves_only_silence() {
    let session = spawn_session(MockEvaluator::new(), one_bar_table(), 138.0);
    session.handle.start().await.unwrap();
    session.handle.stop().await.unwrap();

    advance(Duration::from_secs(60)).await;

    let calls = session.evaluator.calls();
    assert_eq!(calls.len(), 2, "unexpected dispatches: {calls:?}");
    assert_eq!(calls[1], SILENCE);

    let snapshot = session.handle.snapshot();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.label, "Silent");
    assert_eq!(snapshot.energy, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_issued_during_warmup_applies_after_start() {
    let session = spawn_session(MockEvaluator::new(), one_bar_table(), 138.0);
    let handle = session.handle.clone();
    let start = tokio::spawn(async move { handle.start().await });
    settle().await;

    session.handle.stop().await.unwrap();
    start.await.unwrap().unwrap();
    advance(Duration::from_secs(30)).await;

    let calls = session.evaluator.calls();
    assert_eq!(calls.last().map(String::as_str), Some(SILENCE));
    assert!(!session.handle.snapshot().is_playing);
}

#[tokio::test(start_paused = true)]
async fn double_stop_is_idempotent() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.start().await.unwrap();
    advance(Duration::from_secs(3)).await;

    session.handle.stop().await.unwrap();
    let after_first = session.handle.snapshot();
    let updates = session.display.history().len();

    session.handle.stop().await.unwrap();
    settle().await;

    assert_eq!(session.handle.snapshot(), after_first);
    assert_eq!(session.display.history().len(), updates);
    let silences = session
        .evaluator
        .calls()
        .iter()
        .filter(|s| s.as_str() == SILENCE)
        .count();
    assert_eq!(silences, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_when_never_started_is_a_no_op() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.stop().await.unwrap();
    settle().await;

    assert_eq!(session.evaluator.call_count(), 0);
    assert!(session.display.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_start_while_running_is_ignored() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.start().await.unwrap();
    advance(Duration::from_secs(2)).await;
    let bars = session.handle.snapshot().bars_played;

    session.handle.start().await.unwrap();
    settle().await;

    assert_eq!(session.evaluator.call_count(), 1);
    assert_eq!(session.handle.snapshot().bars_played, bars);
}

#[tokio::test(start_paused = true)]
async fn restart_begins_from_first_phase() {
    let session = spawn_session(MockEvaluator::new(), one_bar_table(), 240.0);
    session.handle.start().await.unwrap();
    advance(bar_duration(240.0) * 3 + Duration::from_millis(1)).await;
    assert_eq!(session.handle.snapshot().phase_index, 3);

    session.handle.stop().await.unwrap();
    session.handle.start().await.unwrap();
    settle().await;

    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.phase_index, 0);
    assert_eq!(snapshot.label, "Intro (Bar 1/1)");
    assert_eq!(snapshot.bars_played, 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn dispatch_failure_does_not_delay_next_tick() {
    let evaluator = MockEvaluator::failing_on(&[5]);
    let session = spawn_session(evaluator, one_bar_table(), 120.0);
    session.handle.start().await.unwrap();

    let bar = bar_duration(120.0);
    advance(bar * 4 + Duration::from_millis(1)).await;
    assert_eq!(session.handle.snapshot().label, "Drop (Bar 1/1)");
    assert_eq!(session.evaluator.failure_count(), 1);

    advance(bar).await;
    let snapshot = session.handle.snapshot();
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.bars_played, 6);
    assert_eq!(snapshot.label, "Outro (Bar 1/1)");
    assert_eq!(session.evaluator.call_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn resume_failure_leaves_session_stopped_and_retry_works() {
    let evaluator = MockEvaluator::new();
    evaluator.set_fail_resume(true);
    let session = spawn_session(Arc::clone(&evaluator), PhaseTable::default(), 138.0);

    let err = session.handle.start().await.unwrap_err();
    assert!(matches!(err, SessionError::Initialization(_)), "got {err:?}");

    let snapshot = session.handle.snapshot();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.label, "Error");
    assert_eq!(evaluator.call_count(), 0);

    advance(Duration::from_secs(10)).await;
    assert_eq!(session.handle.snapshot().bars_played, 0);

    evaluator.set_fail_resume(false);
    session.handle.start().await.unwrap();
    settle().await;
    let snapshot = session.handle.snapshot();
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.label, "Intro (Bar 1/8)");
}

#[tokio::test(start_paused = true)]
async fn rejected_initial_script_fails_start() {
    let evaluator = MockEvaluator::failing_on(&[1]);
    let session = spawn_session(Arc::clone(&evaluator), PhaseTable::default(), 138.0);

    let err = session.handle.start().await.unwrap_err();
    assert!(matches!(err, SessionError::Initialization(_)), "got {err:?}");
    assert_eq!(session.display.last().unwrap().label, "Error");
    assert!(!session.handle.snapshot().is_playing);

    session.handle.start().await.unwrap();
    assert_eq!(evaluator.call_count(), 2);
    assert!(session.handle.snapshot().is_playing);
}

#[tokio::test(start_paused = true)]
async fn sample_registration_failure_is_not_fatal() {
    let evaluator = MockEvaluator::new();
    evaluator.set_fail_samples(true);
    let (handle, _task) = SessionBuilder::new(evaluator.clone(), MemoryDisplay::new())
        .samples(SampleMap::default())
        .spawn();

    handle.start().await.unwrap();
    assert!(handle.snapshot().is_playing);
    assert!(evaluator.registered_samples().is_empty());
}

#[tokio::test(start_paused = true)]
async fn samples_are_registered_once() {
    let evaluator = MockEvaluator::new();
    let (handle, _task) = SessionBuilder::new(evaluator.clone(), MemoryDisplay::new())
        .samples(SampleMap::default())
        .spawn();

    handle.start().await.unwrap();
    handle.stop().await.unwrap();
    handle.start().await.unwrap();

    assert_eq!(evaluator.registered_samples(), vec![SampleMap::default()]);
}

// ============================================================================
// Live parameters
// ============================================================================

#[tokio::test(start_paused = true)]
async fn tempo_change_resyncs_current_bar() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 120.0);
    session.handle.start().await.unwrap();

    advance(Duration::from_millis(1000)).await;
    assert_eq!(session.handle.snapshot().bars_played, 1);

    session.handle.set_tempo(240.0).unwrap();
    advance(Duration::from_millis(499)).await;
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.bars_played, 1, "resynced tick fired early");
    assert!((snapshot.bar_duration_ms - 1000.0).abs() < 1e-6);
    assert!((snapshot.tempo_bpm - 240.0).abs() < f64::EPSILON);

    advance(Duration::from_millis(2)).await;
    assert_eq!(session.handle.snapshot().bars_played, 2);

    // subsequent bars run at the new tempo
    advance(Duration::from_millis(1000)).await;
    assert_eq!(session.handle.snapshot().bars_played, 3);
}

#[tokio::test(start_paused = true)]
async fn tempo_change_redispatches_after_debounce() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 120.0);
    session.handle.start().await.unwrap();
    advance(Duration::from_millis(100)).await;

    session.handle.set_tempo(140.0).unwrap();
    advance(Duration::from_millis(149)).await;
    assert_eq!(session.evaluator.call_count(), 1);

    advance(Duration::from_millis(2)).await;
    let calls = session.evaluator.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].contains("setcpm(140/4);"), "got {}", calls[1]);
}

#[tokio::test(start_paused = true)]
async fn parameter_burst_coalesces_into_one_dispatch() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.start().await.unwrap();

    session.handle.set_cutoff(500.0).unwrap();
    advance(Duration::from_millis(50)).await;
    session.handle.set_cutoff(600.0).unwrap();
    advance(Duration::from_millis(50)).await;
    session.handle.set_resonance(12.0).unwrap();
    session.handle.set_cutoff(700.0).unwrap();

    advance(Duration::from_millis(149)).await;
    assert_eq!(session.evaluator.call_count(), 1, "dispatched before quiet period");

    advance(Duration::from_millis(2)).await;
    let calls = session.evaluator.calls();
    assert_eq!(calls.len(), 2, "expected exactly one coalesced dispatch");
    assert!(calls[1].contains(".lpf(700)"));
    assert!(calls[1].contains(".resonance(12)"));

    advance(Duration::from_secs(1)).await;
    assert_eq!(session.evaluator.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_discards_pending_parameter_dispatch() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.start().await.unwrap();

    session.handle.set_cutoff(400.0).unwrap();
    settle().await;
    session.handle.stop().await.unwrap();
    advance(Duration::from_secs(1)).await;

    let calls = session.evaluator.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], SILENCE);
}

#[tokio::test(start_paused = true)]
async fn changes_while_stopped_apply_on_next_start() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.set_tempo(150.0).unwrap();
    session.handle.set_cutoff(800.0).unwrap();
    advance(Duration::from_secs(1)).await;
    assert_eq!(session.evaluator.call_count(), 0);

    session.handle.start().await.unwrap();
    settle().await;
    let calls = session.evaluator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("setcpm(150/4);"));
    assert!(calls[0].contains(".lpf(800)"));
    assert!((session.handle.snapshot().bar_duration_ms - 1600.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn invalid_parameters_are_rejected() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);

    assert!(matches!(
        session.handle.set_tempo(0.0),
        Err(ParameterError::InvalidTempo(_))
    ));
    assert!(matches!(
        session.handle.set_tempo(f64::NAN),
        Err(ParameterError::InvalidTempo(_))
    ));
    assert!(matches!(
        session.handle.set_cutoff(-5.0),
        Err(ParameterError::InvalidCutoff(_))
    ));
    assert!(matches!(
        session.handle.set_resonance(-1.0),
        Err(ParameterError::InvalidResonance(_))
    ));

    assert_eq!(session.handle.parameters(), Parameters {
        tempo_bpm: 138.0,
        ..Parameters::default()
    });
}

#[tokio::test(start_paused = true)]
async fn out_of_range_tempos_are_rejected_while_playing() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 120.0);
    session.handle.start().await.unwrap();
    advance(Duration::from_millis(100)).await;

    for bpm in [1e-20, 0.5, 1000.5, 1e12, f64::INFINITY] {
        assert!(
            matches!(session.handle.set_tempo(bpm), Err(ParameterError::InvalidTempo(_))),
            "accepted {bpm}"
        );
    }
    advance(Duration::from_secs(3)).await;

    let snapshot = session.handle.snapshot();
    assert!((snapshot.tempo_bpm - 120.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.bars_played, 2);
    assert_eq!(session.evaluator.call_count(), 1);

    session.handle.stop().await.unwrap();
    let calls = session.evaluator.calls();
    assert_eq!(calls.last().map(String::as_str), Some(SILENCE));
}

#[tokio::test(start_paused = true)]
async fn fastest_tempo_keeps_clock_advancing() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 120.0);
    session.handle.start().await.unwrap();
    advance(Duration::from_millis(1000)).await;
    assert_eq!(session.handle.snapshot().bars_played, 1);

    // halfway through a 2 s bar, so 120 ms remain at 1000 BPM
    session.handle.set_tempo(MAX_TEMPO_BPM).unwrap();
    advance(Duration::from_millis(119)).await;
    assert_eq!(session.handle.snapshot().bars_played, 1);

    advance(Duration::from_millis(2)).await;
    assert_eq!(session.handle.snapshot().bars_played, 2);

    advance(Duration::from_millis(1000)).await;
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.bars_played, 6);
    assert!((snapshot.bar_duration_ms - 240.0).abs() < 1e-3);

    session.handle.stop().await.unwrap();
    let calls = session.evaluator.calls();
    assert_eq!(calls.last().map(String::as_str), Some(SILENCE));
}

#[tokio::test(start_paused = true)]
async fn slowest_tempo_is_accepted() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 120.0);
    session.handle.start().await.unwrap();
    advance(Duration::from_millis(1000)).await;

    session.handle.set_tempo(MIN_TEMPO_BPM).unwrap();
    settle().await;
    advance(Duration::from_secs(119)).await;
    assert_eq!(session.handle.snapshot().bars_played, 1);

    advance(Duration::from_secs(2)).await;
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.bars_played, 2);
    assert!((snapshot.bar_duration_ms - 240_000.0).abs() < 1e-6);

    session.handle.stop().await.unwrap();
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_silences_and_closes() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    session.handle.start().await.unwrap();
    advance(Duration::from_secs(2)).await;

    session.handle.shutdown();
    session.task.await.unwrap();

    assert_eq!(
        session.evaluator.calls().last().map(String::as_str),
        Some(SILENCE)
    );
    assert!(session.handle.is_closed());
    assert!(matches!(
        session.handle.start().await,
        Err(SessionError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_warmup_reports_closed() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    let handle = session.handle.clone();
    let start = tokio::spawn(async move { handle.start().await });
    settle().await;

    session.handle.shutdown();
    assert!(matches!(start.await.unwrap(), Err(SessionError::Closed)));
    session.task.await.unwrap();
    assert_eq!(session.evaluator.call_count(), 0);
}

// ============================================================================
// Events
// ============================================================================

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn events(&self) -> Vec<serde_json::Value> {
        let raw = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        raw.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn event_stream_records_session_lifecycle() {
    let buffer = SharedBuffer::default();
    let events = Arc::new(EventEmitter::new(Box::new(buffer.clone())));
    let evaluator = MockEvaluator::failing_on(&[2]);
    let session = spawn_with(evaluator, one_bar_table(), 240.0, Arc::clone(&events));

    session.handle.start().await.unwrap();
    advance(bar_duration(240.0) + Duration::from_millis(1)).await;
    session.handle.stop().await.unwrap();
    settle().await;

    let recorded = buffer.events();
    let types: Vec<&str> = recorded
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        [
            "SessionStarted",
            "PhaseEntered",
            "BarStarted",
            "PhaseEntered",
            "BarStarted",
            "DispatchFailed",
            "SessionStopped",
        ]
    );

    let session_id = events.session_id().to_string();
    for (i, event) in recorded.iter().enumerate() {
        assert_eq!(event["sequence"], i);
        assert_eq!(event["session_id"], session_id.as_str());
    }
    assert_eq!(recorded[0]["evaluator"], "mock");
    assert_eq!(recorded[3]["phase_name"], "Groove");
    assert_eq!(recorded[5]["reason"], "phase_change");
    assert_eq!(recorded[6]["bars_played"], 2);
}

// ============================================================================
// Visualizer feed
// ============================================================================

#[tokio::test(start_paused = true)]
async fn visualizer_renders_only_while_playing() {
    let session = spawn_session(MockEvaluator::new(), PhaseTable::default(), 138.0);
    let frames = Arc::new(Mutex::new(Vec::new()));
    let cancel = CancellationToken::new();

    let sink_frames = Arc::clone(&frames);
    let visualizer = tokio::spawn(Visualizer::new(600, 200, None).run(
        session.handle.subscribe(),
        Duration::from_millis(100),
        cancel.clone(),
        move |snapshot, frame| {
            sink_frames
                .lock()
                .unwrap()
                .push((snapshot.energy, frame.source, frame.points.len()));
        },
    ));

    advance(Duration::from_millis(350)).await;
    assert!(frames.lock().unwrap().is_empty(), "rendered while stopped");

    session.handle.start().await.unwrap();
    advance(Duration::from_secs(1)).await;
    session.handle.stop().await.unwrap();
    settle().await;
    let rendered = frames.lock().unwrap().len();
    assert!(rendered >= 9, "only {rendered} frames");

    advance(Duration::from_secs(1)).await;
    assert_eq!(frames.lock().unwrap().len(), rendered);

    cancel.cancel();
    visualizer.await.unwrap();

    for (energy, source, points) in frames.lock().unwrap().iter() {
        assert_eq!(*energy, 20);
        assert_eq!(*source, FrameSource::Synthetic);
        assert!(*points > 0);
    }
}

#[tokio::test(start_paused = true)]
async fn custom_options_shorten_warmup_and_debounce() {
    let evaluator = MockEvaluator::new();
    let (handle, _task) = SessionBuilder::new(evaluator.clone(), MemoryDisplay::new())
        .options(SessionOptions {
            debounce: Duration::from_millis(20),
            warmup: Duration::ZERO,
        })
        .spawn();

    handle.start().await.unwrap();
    handle.set_cutoff(900.0).unwrap();
    advance(Duration::from_millis(25)).await;

    assert_eq!(evaluator.call_count(), 2);
}
